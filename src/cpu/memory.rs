//! Memory subsystem.
//!
//! A flat 4 KiB address space. The low 80 bytes hold the built-in hex
//! digit glyphs, programs load at 0x200, and the top 256 bytes double as
//! the 64x32 monochrome framebuffer (one bit per pixel, MSB first).

/// Size of the address space in bytes.
pub const MEMORY_SIZE: usize = 4096;

/// Mask applied to every address; the space is a 4096-byte ring.
pub const ADDRESS_MASK: u16 = 0x0FFF;

/// Where programs are loaded and where execution starts.
pub const PROGRAM_START: u16 = 0x200;

/// Bytes per built-in glyph.
pub const GLYPH_SIZE: usize = 5;

pub const SCREEN_WIDTH: usize = 64;
pub const SCREEN_HEIGHT: usize = 32;

/// First byte of the framebuffer.
pub const FRAMEBUFFER_START: usize = 0xF00;
pub const FRAMEBUFFER_SIZE: usize = SCREEN_WIDTH * SCREEN_HEIGHT / 8;

/// Glyphs for 0-F, 4 pixels wide and 5 rows tall.
pub const FONT: [u8; 16 * GLYPH_SIZE] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// Main memory.
#[derive(Clone, PartialEq, Eq)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    /// Create memory in its reset state: zeroed, with the font loaded.
    pub fn new() -> Self {
        let mut mem = Self { bytes: vec![0; MEMORY_SIZE] };
        mem.bytes[..FONT.len()].copy_from_slice(&FONT);
        mem
    }

    /// Read a byte. Addresses wrap at 4096.
    #[inline]
    pub fn read(&self, addr: u16) -> u8 {
        self.bytes[(addr & ADDRESS_MASK) as usize]
    }

    /// Write a byte. Addresses wrap at 4096.
    #[inline]
    pub fn write(&mut self, addr: u16, value: u8) {
        self.bytes[(addr & ADDRESS_MASK) as usize] = value;
    }

    /// Read a big-endian word; the second byte wraps independently, so a
    /// fetch at 0xFFF reads 0xFFF and 0x000.
    #[inline]
    pub fn read_word(&self, addr: u16) -> u16 {
        u16::from_be_bytes([self.read(addr), self.read(addr.wrapping_add(1))])
    }

    /// Zero everything and reload the font.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Copy a program into memory starting at `start`.
    pub fn load_program(&mut self, start: u16, program: &[u8]) -> Result<(), MemoryError> {
        let start = (start & ADDRESS_MASK) as usize;
        if start + program.len() > MEMORY_SIZE {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                available: MEMORY_SIZE - start,
            });
        }

        self.bytes[start..start + program.len()].copy_from_slice(program);
        Ok(())
    }

    /// The packed framebuffer.
    pub fn framebuffer(&self) -> &[u8] {
        &self.bytes[FRAMEBUFFER_START..FRAMEBUFFER_START + FRAMEBUFFER_SIZE]
    }

    pub fn clear_framebuffer(&mut self) {
        self.bytes[FRAMEBUFFER_START..].fill(0);
    }

    /// Read a pixel. Coordinates wrap around the screen edges.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        let (byte, mask) = pixel_location(x, y);
        self.bytes[byte] & mask != 0
    }

    /// XOR a pixel on, returning true when it was already set (and is now
    /// cleared).
    pub fn flip_pixel(&mut self, x: usize, y: usize) -> bool {
        let (byte, mask) = pixel_location(x, y);
        let was_set = self.bytes[byte] & mask != 0;
        self.bytes[byte] ^= mask;
        was_set
    }

    /// Dump a range of bytes (for debugging).
    pub fn dump(&self, start: u16, count: usize) -> Vec<(u16, u8)> {
        (0..count)
            .map(|offset| {
                let addr = start.wrapping_add(offset as u16) & ADDRESS_MASK;
                (addr, self.read(addr))
            })
            .collect()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

fn pixel_location(x: usize, y: usize) -> (usize, u8) {
    let bit = (y % SCREEN_HEIGHT) * SCREEN_WIDTH + (x % SCREEN_WIDTH);
    (FRAMEBUFFER_START + bit / 8, 0x80 >> (bit % 8))
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lit = self.framebuffer().iter().map(|b| b.count_ones()).sum::<u32>();
        let program = self.bytes[PROGRAM_START as usize..FRAMEBUFFER_START]
            .iter()
            .filter(|&&b| b != 0)
            .count();

        f.debug_struct("Memory")
            .field("non_zero_program_bytes", &program)
            .field("lit_pixels", &lit)
            .field("total_bytes", &MEMORY_SIZE)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// Program is too large to fit in memory.
    ProgramTooLarge { size: usize, available: usize },
}

impl std::fmt::Display for MemoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryError::ProgramTooLarge { size, available } => {
                write!(f, "program size {} exceeds available space {}", size, available)
            }
        }
    }
}

impl std::error::Error for MemoryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_state() {
        let mem = Memory::new();
        assert_eq!(&mem.as_slice()[..80], &FONT[..]);
        assert!(mem.as_slice()[80..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_read_write_wraps() {
        let mut mem = Memory::new();
        mem.write(0x1234, 0xAB);
        assert_eq!(mem.read(0x0234), 0xAB);
    }

    #[test]
    fn test_word_fetch_wraps() {
        let mut mem = Memory::new();
        mem.write(0xFFF, 0x12);
        mem.write(0x000, 0x34);
        assert_eq!(mem.read_word(0xFFF), 0x1234);
    }

    #[test]
    fn test_load_program() {
        let mut mem = Memory::new();
        mem.load_program(PROGRAM_START, &[1, 2, 3]).unwrap();

        assert_eq!(mem.read(0x200), 1);
        assert_eq!(mem.read(0x201), 2);
        assert_eq!(mem.read(0x202), 3);
    }

    #[test]
    fn test_load_program_too_large() {
        let mut mem = Memory::new();
        let program = vec![0; MEMORY_SIZE - PROGRAM_START as usize + 1];
        assert_eq!(
            mem.load_program(PROGRAM_START, &program),
            Err(MemoryError::ProgramTooLarge { size: 3585, available: 3584 })
        );
    }

    #[test]
    fn test_pixels_are_msb_first_and_wrap() {
        let mut mem = Memory::new();
        assert!(!mem.flip_pixel(0, 0));
        assert_eq!(mem.read(0xF00), 0x80);

        assert!(!mem.flip_pixel(63, 31));
        assert_eq!(mem.read(0xFFF), 0x01);

        assert!(mem.pixel(64, 32));
        assert!(mem.flip_pixel(64 + 63, 32 + 31));
        assert_eq!(mem.read(0xFFF), 0x00);
    }

    #[test]
    fn test_clear_framebuffer_clears_every_byte() {
        let mut mem = Memory::new();
        for addr in FRAMEBUFFER_START..MEMORY_SIZE {
            mem.write(addr as u16, 0xFF);
        }
        mem.clear_framebuffer();
        assert!(mem.framebuffer().iter().all(|&b| b == 0));
        assert_eq!(mem.framebuffer().len(), 256);
    }
}
