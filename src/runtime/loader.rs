// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Module file loading and size validation.
//!
//! This reads the binary from disk and checks its size. Format checks
//! belong to the detector.

use std::path::Path;

use crate::errors::{BridgeError, BridgeResult};
use crate::observability::messages::module::{ModuleLoadFailed, ModuleLoaded};
use crate::observability::messages::StructuredLog;

/// Maximum allowed size for a module binary (16 MB)
pub const MAX_MODULE_SIZE: usize = 16 * 1024 * 1024;

/// Read a module binary, rejecting anything larger than [`MAX_MODULE_SIZE`].
pub fn load_module_bytes<P: AsRef<Path>>(path: P) -> BridgeResult<Vec<u8>> {
    let path = path.as_ref();
    let module_path = path.display().to_string();

    let bytes = std::fs::read(path).map_err(|e| {
        let error = BridgeError::IoError(e);
        ModuleLoadFailed {
            module_path: &module_path,
            error: &error,
        }
        .log();
        error
    })?;

    if bytes.len() > MAX_MODULE_SIZE {
        let error = BridgeError::ValidationError(format!(
            "Module file too large: {} bytes (max: {} bytes)",
            bytes.len(),
            MAX_MODULE_SIZE
        ));
        ModuleLoadFailed {
            module_path: &module_path,
            error: &error,
        }
        .log();
        return Err(error);
    }

    ModuleLoaded {
        module_path: &module_path,
        size_bytes: bytes.len(),
    }
    .log();

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_small_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"\0asm").unwrap();

        let bytes = load_module_bytes(temp_file.path()).unwrap();
        assert_eq!(bytes, b"\0asm");
    }

    #[test]
    fn test_file_too_large() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(&vec![0u8; MAX_MODULE_SIZE + 1]).unwrap();

        match load_module_bytes(temp_file.path()) {
            Err(BridgeError::ValidationError(msg)) => {
                assert!(msg.contains("too large"));
                assert!(msg.contains(&(MAX_MODULE_SIZE + 1).to_string()));
            }
            other => panic!("expected ValidationError, got {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn test_nonexistent_file() {
        assert!(matches!(
            load_module_bytes("/nonexistent/validation_bg.wasm"),
            Err(BridgeError::IoError(_))
        ));
    }
}
