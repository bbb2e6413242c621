// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! String codec.
//!
//! Strings cross the boundary as UTF-8 bytes in linear memory. Encoding
//! returns the pointer and publishes the byte length through the
//! `vector_len` side channel; decoding is strict.

use crate::bridge::abi::ModuleHost;
use crate::bridge::memory::checked_range;
use crate::errors::{BridgeError, BridgeResult};
use crate::observability::messages::bridge::DecoderReset;
use crate::observability::messages::StructuredLog;

/// Pointer and byte length of a string written into module memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRecord {
    pub ptr: u32,
    pub len: u32,
}

/// Strict UTF-8 decoder with a cumulative volume counter.
///
/// Once the counter reaches the threshold the decoder is reinitialized and
/// the counter restarts at the length of the current input.
#[derive(Debug)]
pub struct TextDecoder {
    decoded: u64,
    threshold: u64,
    resets: u64,
}

impl TextDecoder {
    pub fn new(threshold: u64) -> Self {
        Self {
            decoded: 0,
            threshold,
            resets: 0,
        }
    }

    pub fn decode<'a>(&mut self, bytes: &'a [u8]) -> BridgeResult<&'a str> {
        let len = bytes.len() as u64;
        self.decoded = self.decoded.saturating_add(len);
        if self.decoded >= self.threshold {
            DecoderReset {
                decoded_bytes: self.decoded,
                threshold: self.threshold,
            }
            .log();
            self.resets += 1;
            self.decoded = len;
        }
        Ok(std::str::from_utf8(bytes)?)
    }

    pub fn decoded_bytes(&self) -> u64 {
        self.decoded
    }

    pub fn resets(&self) -> u64 {
        self.resets
    }
}

/// Write `text` into freshly allocated module memory.
pub fn encode<H: ModuleHost + ?Sized>(host: &mut H, text: &str) -> BridgeResult<TransferRecord> {
    let max = host.state().max_transfer_bytes;
    if text.len() > max {
        return Err(BridgeError::PayloadTooLarge {
            len: text.len(),
            max,
        });
    }

    let record = if host.supports_realloc() {
        encode_incremental(host, text)?
    } else {
        encode_exact(host, text)?
    };

    host.state().vector_len = record.len;
    Ok(record)
}

fn encode_incremental<H: ModuleHost + ?Sized>(host: &mut H, text: &str) -> BridgeResult<TransferRecord> {
    let bytes = text.as_bytes();
    let units = text.encode_utf16().count() as u32;

    let mut len = units;
    let mut ptr = host.malloc(len, 1)?;

    let offset = bytes.iter().position(|b| *b >= 0x80).unwrap_or(bytes.len());
    write(host, ptr, &bytes[..offset])?;

    if offset != bytes.len() {
        let rest = &text[offset..];
        // At most three UTF-8 bytes per remaining UTF-16 unit.
        let worst_case = (offset + rest.encode_utf16().count() * 3) as u32;
        ptr = host.realloc(ptr, len, worst_case, 1)?;
        len = worst_case;

        write(host, ptr + offset as u32, rest.as_bytes())?;
        let written = bytes.len() as u32;
        ptr = host.realloc(ptr, len, written, 1)?;
        len = written;
    }

    Ok(TransferRecord { ptr, len })
}

fn encode_exact<H: ModuleHost + ?Sized>(host: &mut H, text: &str) -> BridgeResult<TransferRecord> {
    let bytes = text.as_bytes();
    let len = bytes.len() as u32;
    let ptr = host.malloc(len, 1)?;
    write(host, ptr, bytes)?;
    Ok(TransferRecord { ptr, len })
}

fn write<H: ModuleHost + ?Sized>(host: &mut H, ptr: u32, bytes: &[u8]) -> BridgeResult<()> {
    if bytes.is_empty() {
        return Ok(());
    }
    crate::bridge::memory::bytes(host)?.write(ptr, bytes)
}

/// Read `len` bytes at `ptr` as strict UTF-8.
pub fn decode<H: ModuleHost + ?Sized>(host: &mut H, ptr: u32, len: u32) -> BridgeResult<String> {
    let max = host.state().max_transfer_bytes;
    if len as usize > max {
        return Err(BridgeError::PayloadTooLarge {
            len: len as usize,
            max,
        });
    }
    let (memory, state) = host.memory_and_state()?;
    state.views.refresh(memory);
    let range = checked_range(memory.len(), ptr, len)?;
    Ok(state.decoder.decode(&memory[range])?.to_owned())
}

/// Encode `text` and write its `(ptr, len)` into the return slot at `retptr`.
///
/// `None` writes `(0, 0)`, the encoding of an absent string.
pub fn write_to_retptr<H: ModuleHost + ?Sized>(
    host: &mut H,
    retptr: u32,
    text: Option<&str>,
) -> BridgeResult<()> {
    let (ptr, len) = match text {
        Some(text) => {
            let record = encode(host, text)?;
            (record.ptr, record.len)
        }
        None => (0, 0),
    };
    crate::bridge::memory::words(host)?.write_pair(retptr, ptr, len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::testing::FakeModule;

    fn round_trip(module: &mut FakeModule, text: &str) -> String {
        let record = encode(module, text).unwrap();
        assert_eq!(module.state.vector_len, record.len);
        decode(module, record.ptr, record.len).unwrap()
    }

    #[test]
    fn test_ascii_round_trip_uses_single_allocation() {
        let mut module = FakeModule::new();
        assert_eq!(round_trip(&mut module, "hello"), "hello");
        assert!(module.realloc_calls.is_empty());
    }

    #[test]
    fn test_non_ascii_takes_slow_path() {
        let mut module = FakeModule::new();
        let record = encode(&mut module, "héllo").unwrap();

        assert_eq!(record.len, "héllo".len() as u32);
        // grow to 1 + 4 units * 3, then shrink to the bytes written
        assert_eq!(module.realloc_calls, vec![(5, 13), (13, 6)]);
        assert_eq!(decode(&mut module, record.ptr, record.len).unwrap(), "héllo");
    }

    #[test]
    fn test_non_bmp_and_mixed_round_trip() {
        let mut module = FakeModule::new();
        for text in ["", "a", "ü", "日本語テキスト", "emoji 🦀 crab", "𝄞 clef at start", "mixed ascii 🎉 and ü"] {
            assert_eq!(round_trip(&mut module, text), text);
        }
    }

    #[test]
    fn test_round_trip_without_realloc() {
        let mut module = FakeModule::new();
        module.realloc_enabled = false;
        assert_eq!(round_trip(&mut module, "héllo wörld 🦀"), "héllo wörld 🦀");
        assert!(module.realloc_calls.is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_a_hard_failure() {
        let mut module = FakeModule::new();
        let ptr = module.malloc(3, 1).unwrap();
        crate::bridge::memory::bytes(&mut module)
            .unwrap()
            .write(ptr, &[0x61, 0xff, 0x62])
            .unwrap();
        let err = decode(&mut module, ptr, 3).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidUtf8(_)));
    }

    #[test]
    fn test_oversized_payloads_are_rejected() {
        let mut module = FakeModule::new();
        module.state.max_transfer_bytes = 4;

        let err = encode(&mut module, "too long").unwrap_err();
        assert!(matches!(err, BridgeError::PayloadTooLarge { len: 8, max: 4 }));

        let err = decode(&mut module, 0, 5).unwrap_err();
        assert!(matches!(err, BridgeError::PayloadTooLarge { len: 5, max: 4 }));
    }

    #[test]
    fn test_decode_out_of_bounds() {
        let mut module = FakeModule::new();
        let size = crate::bridge::memory::bytes(&mut module).unwrap().len() as u32;
        let err = decode(&mut module, size - 1, 2).unwrap_err();
        assert!(matches!(err, BridgeError::OutOfBounds { .. }));
    }

    #[test]
    fn test_decoder_reset_restarts_counter() {
        let mut decoder = TextDecoder::new(10);
        assert_eq!(decoder.decode(b"abcd").unwrap(), "abcd");
        assert_eq!(decoder.decode(b"efgh").unwrap(), "efgh");
        assert_eq!(decoder.resets(), 0);

        assert_eq!(decoder.decode(b"ijk").unwrap(), "ijk");
        assert_eq!(decoder.resets(), 1);
        assert_eq!(decoder.decoded_bytes(), 3);
    }

    #[test]
    fn test_decoding_is_correct_across_resets() {
        let mut module = FakeModule::new();
        module.state.decoder = TextDecoder::new(16);
        for i in 0..20 {
            let text = format!("message {} ✓", i);
            assert_eq!(round_trip(&mut module, &text), text);
        }
        assert!(module.state.decoder.resets() > 0);
    }

    #[test]
    fn test_decode_after_growth_uses_current_buffer() {
        let mut module = FakeModule::new();
        let record = encode(&mut module, "before growth").unwrap();
        module.grow(2);
        assert_eq!(decode(&mut module, record.ptr, record.len).unwrap(), "before growth");
    }

    #[test]
    fn test_write_to_retptr_encodes_absent_as_zero_pair() {
        let mut module = FakeModule::new();
        let retptr = module.malloc(8, 4).unwrap();

        write_to_retptr(&mut module, retptr, Some("abc")).unwrap();
        let view = crate::bridge::memory::words(&mut module).unwrap();
        let ptr = view.read_i32(retptr).unwrap() as u32;
        let len = view.read_i32(retptr + 4).unwrap() as u32;
        assert_eq!(decode(&mut module, ptr, len).unwrap(), "abc");

        write_to_retptr(&mut module, retptr, None).unwrap();
        let view = crate::bridge::memory::words(&mut module).unwrap();
        assert_eq!(view.read_i32(retptr).unwrap(), 0);
        assert_eq!(view.read_i32(retptr + 4).unwrap(), 0);
    }
}
