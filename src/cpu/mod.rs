//! CPU emulation.
//!
//! - 4 KiB of byte memory with the font at 0x000 and the framebuffer at 0xF00
//! - sixteen 8-bit registers, a 16-bit index, two countdown timers
//! - a bounded return stack
//! - 35 operations dispatched on the opcode's top nibble

pub mod execute;
pub mod memory;
pub mod opcode;
pub mod registers;
pub mod timer;

pub use execute::{Cpu, CpuError, CpuState};
pub use memory::{Memory, MemoryError};
pub use opcode::{DispatchError, Opcode, Operation};
pub use registers::Registers;
pub use timer::TimerClock;
