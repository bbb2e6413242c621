// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Binary format detection.
//!
//! The bridge drives core modules only. Component-model binaries, and core
//! modules carrying the legacy `component` custom section, are rejected
//! before compilation with a parse done by `wasmparser`.

use wasmparser::{Encoding, Parser, Payload};

use crate::errors::{BridgeError, BridgeResult};

const COMPONENT_UNSUPPORTED: &str =
    "Component-model binaries are not supported; build the validation module as a core module";

/// Confirm `bytes` is a core module, reporting the number of imports it declares.
pub fn ensure_core_module(bytes: &[u8]) -> BridgeResult<usize> {
    let mut encoding = None;
    let mut has_component_section = false;
    let mut imports = 0;

    for payload in Parser::new(0).parse_all(bytes) {
        match payload? {
            Payload::Version { encoding: enc, .. } => encoding = Some(enc),
            Payload::CustomSection(reader) if reader.name() == "component" => {
                has_component_section = true;
            }
            Payload::ImportSection(reader) => imports += reader.count() as usize,
            _ => {}
        }
    }

    match encoding {
        None => Err(BridgeError::InvalidWasmBinary("Invalid WASM binary".to_string())),
        Some(Encoding::Component) => Err(BridgeError::UnsupportedEncoding(COMPONENT_UNSUPPORTED.to_string())),
        Some(Encoding::Module) if has_component_section => {
            Err(BridgeError::UnsupportedEncoding(COMPONENT_UNSUPPORTED.to_string()))
        }
        Some(Encoding::Module) => Ok(imports),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(ensure_core_module(&[]).is_err());
    }

    #[test]
    fn test_invalid_input() {
        assert!(ensure_core_module(b"\x00\x00\x00\x00\x00\x00\x00\x00").is_err());
    }

    #[test]
    fn test_core_module_counts_imports() {
        let wasm = wat::parse_str(
            r#"(module
                (import "wbg" "__wbindgen_throw" (func (param i32 i32)))
                (import "wbg" "__wbg_new_object" (func (result i32))))"#,
        )
        .unwrap();
        assert_eq!(ensure_core_module(&wasm).unwrap(), 2);
    }

    #[test]
    fn test_component_binary_rejected() {
        let wasm = wat::parse_str("(component)").unwrap();
        assert!(matches!(
            ensure_core_module(&wasm),
            Err(BridgeError::UnsupportedEncoding(_))
        ));
    }
}
