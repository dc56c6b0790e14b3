//! Raw ROM images.
//!
//! A ROM is a headerless sequence of big-endian opcodes that loads at
//! [`PROGRAM_START`]. Anything that does not fit between there and the end
//! of memory is rejected before the interpreter starts.

use crate::cpu::memory::{MEMORY_SIZE, PROGRAM_START};
use log::info;
use std::path::Path;
use thiserror::Error;

/// Largest image that fits in memory.
pub const MAX_ROM_SIZE: usize = MEMORY_SIZE - PROGRAM_START as usize;

/// Load a ROM image from disk.
pub fn load_rom<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, RomError> {
    let path = path.as_ref();
    let bytes = read_image(path)?;

    check_size(bytes.len())?;
    info!("loaded {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}

/// Read a file as raw bytes with no size checks. The disassembler accepts
/// images of any length, including ones that could never be loaded.
pub fn read_image<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, RomError> {
    let path = path.as_ref();
    std::fs::read(path).map_err(|e| RomError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Write a ROM image to disk.
pub fn save_rom<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<(), RomError> {
    let path = path.as_ref();
    std::fs::write(path, bytes).map_err(|e| RomError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Reject images that are empty or too large to load.
pub fn check_size(len: usize) -> Result<(), RomError> {
    if len == 0 {
        return Err(RomError::Empty);
    }
    if len > MAX_ROM_SIZE {
        return Err(RomError::TooLarge { size: len, available: MAX_ROM_SIZE });
    }
    Ok(())
}

/// Errors that can occur while loading a ROM.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RomError {
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("ROM is empty")]
    Empty,

    #[error("ROM size {size} exceeds available space {available}")]
    TooLarge { size: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("chip8-kit-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_rom_roundtrip() {
        let path = temp_path("roundtrip.ch8");
        let rom = vec![0x00, 0xE0, 0x12, 0x00];

        save_rom(&path, &rom).unwrap();
        assert_eq!(load_rom(&path).unwrap(), rom);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file() {
        let err = load_rom(temp_path("does-not-exist.ch8")).unwrap_err();
        assert!(matches!(err, RomError::Io { .. }));
    }

    #[test]
    fn test_read_image_skips_size_checks() {
        let empty = temp_path("empty.ch8");
        save_rom(&empty, &[]).unwrap();
        assert_eq!(read_image(&empty).unwrap(), Vec::<u8>::new());
        assert_eq!(load_rom(&empty), Err(RomError::Empty));
        std::fs::remove_file(&empty).unwrap();

        let full = temp_path("full-memory.ch8");
        save_rom(&full, &vec![0u8; MEMORY_SIZE]).unwrap();
        assert_eq!(read_image(&full).unwrap().len(), 4096);
        assert!(matches!(load_rom(&full), Err(RomError::TooLarge { size: 4096, .. })));
        std::fs::remove_file(&full).unwrap();
    }

    #[test]
    fn test_size_limits() {
        assert_eq!(check_size(0), Err(RomError::Empty));
        assert!(check_size(MAX_ROM_SIZE).is_ok());
        assert_eq!(
            check_size(MAX_ROM_SIZE + 1),
            Err(RomError::TooLarge { size: MAX_ROM_SIZE + 1, available: MAX_ROM_SIZE })
        );
    }
}
