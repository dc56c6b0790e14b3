//! CPU execution engine.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use crate::asm::codec;
use crate::asm::rom::{self, RomError};
use crate::config::Config;
use crate::cpu::memory::{MemoryError, GLYPH_SIZE, PROGRAM_START};
use crate::cpu::opcode::{DispatchError, Operation};
use crate::cpu::registers::FLAG;
use crate::cpu::timer::TimerClock;
use crate::cpu::{Memory, Registers};
use crate::host::{Input, Peripherals};
use log::{debug, error};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// Stopped by the host.
    Stopped,
    /// A runtime fault ended the run.
    Faulted,
}

/// The interpreter.
#[derive(Debug, Clone)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory, framebuffer included.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count.
    pub cycles: u64,
    stack: Vec<u16>,
    stack_limit: Option<usize>,
    redraw: bool,
    timer: TimerClock,
    rng: StdRng,
}

impl Cpu {
    /// Create a CPU with the default configuration.
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            state: CpuState::Running,
            cycles: 0,
            stack: Vec::new(),
            stack_limit: config.stack_limit,
            redraw: false,
            timer: TimerClock::new(config.timer_hz),
            rng,
        }
    }

    /// Reset registers, memory, stack and timers. The program is gone
    /// afterwards; configuration is kept.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.reset();
        self.stack.clear();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.redraw = false;
        self.timer.restart();
    }

    /// Reset and load a ROM image at 0x200.
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), CpuError> {
        rom::check_size(rom.len())?;
        self.reset();
        self.mem.load_program(PROGRAM_START, rom)?;
        debug!("loaded {} byte program", rom.len());
        Ok(())
    }

    pub fn stack(&self) -> &[u16] {
        &self.stack
    }

    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }

    /// Stop between cycles. `step` refuses to run until `reset`.
    pub fn stop(&mut self) {
        if self.state == CpuState::Running {
            self.state = CpuState::Stopped;
        }
    }

    pub fn framebuffer(&self) -> &[u8] {
        self.mem.framebuffer()
    }

    /// Decode the instruction at PC without executing it.
    pub fn peek_operation(&self) -> Result<Operation, DispatchError> {
        Operation::decode(self.mem.read_word(self.regs.pc))
    }

    /// Execute a single cycle.
    ///
    /// Returns the operation that was executed, or an error.
    pub fn step(&mut self, dev: &mut Peripherals<'_>) -> Result<Operation, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        // Fetch
        let pc = self.regs.pc;
        let opcode = self.mem.read_word(pc);

        // Advance PC before dispatch (jumps and skips work from here)
        self.regs.advance_pc();

        // Decode
        let op = match Operation::decode(opcode) {
            Ok(op) => op,
            Err(DispatchError(opcode)) => return Err(self.fault(CpuError::UnknownOpcode { opcode, pc })),
        };

        // Execute
        if let Err(err) = self.execute(op, pc, &mut *dev.input) {
            return Err(self.fault(err));
        }

        self.cycles += 1;

        if let Some(tracer) = dev.tracer.as_deref_mut() {
            let mnemonic = codec::decode(opcode).ok();
            tracer.on_instruction(pc, opcode, mnemonic.as_deref(), &self.regs);
        }

        if self.redraw {
            dev.display.render(self.mem.framebuffer());
            self.redraw = false;
        }

        if self.timer.tick(dev.clock.now_millis()) {
            self.regs.decay_timers();
        }

        Ok(op)
    }

    /// Run until stopped or faulted.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self, dev: &mut Peripherals<'_>) -> Result<u64, CpuError> {
        self.run_until(dev, |_| false)
    }

    /// Run until `done` returns true (checked before every cycle).
    pub fn run_until<F>(&mut self, dev: &mut Peripherals<'_>, mut done: F) -> Result<u64, CpuError>
    where
        F: FnMut(&Cpu) -> bool,
    {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running && !done(self) {
            self.step(dev)?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, dev: &mut Peripherals<'_>, max_cycles: u64) -> Result<u64, CpuError> {
        let limit = self.cycles + max_cycles;
        self.run_until(dev, |cpu| cpu.cycles >= limit)
    }

    fn fault(&mut self, err: CpuError) -> CpuError {
        error!("{}", err);
        self.state = CpuState::Faulted;
        err
    }

    /// Execute a decoded operation. `pc` is the address it was fetched from.
    fn execute(&mut self, op: Operation, pc: u16, input: &mut dyn Input) -> Result<(), CpuError> {
        let v = &mut self.regs.v;

        match op {
            // ==================== 0x0 ====================
            Operation::ClearScreen => {
                self.mem.clear_framebuffer();
                self.redraw = true;
            }

            Operation::Return => {
                let addr = self.stack.pop().ok_or(CpuError::StackUnderflow { pc })?;
                self.regs.jump(addr);
            }

            Operation::Sys { .. } => {}

            // ==================== Flow ====================
            Operation::Jump { nnn } => self.regs.jump(nnn),

            Operation::Call { nnn } => {
                if let Some(limit) = self.stack_limit {
                    if self.stack.len() >= limit {
                        return Err(CpuError::StackOverflow { pc, depth: limit });
                    }
                }
                self.stack.push(self.regs.pc);
                self.regs.jump(nnn);
            }

            Operation::SkipEqImm { x, kk } => {
                if v[x] == kk {
                    self.regs.skip();
                }
            }

            Operation::SkipNeImm { x, kk } => {
                if v[x] != kk {
                    self.regs.skip();
                }
            }

            Operation::SkipEqReg { x, y } => {
                if v[x] == v[y] {
                    self.regs.skip();
                }
            }

            Operation::SkipNeReg { x, y } => {
                if v[x] != v[y] {
                    self.regs.skip();
                }
            }

            // ==================== Immediate ====================
            Operation::LoadImm { x, kk } => v[x] = kk,

            Operation::AddImm { x, kk } => v[x] = v[x].wrapping_add(kk),

            // ==================== ALU ====================
            Operation::Move { x, y } => v[x] = v[y],
            Operation::Or { x, y } => v[x] |= v[y],
            Operation::And { x, y } => v[x] &= v[y],
            Operation::Xor { x, y } => v[x] ^= v[y],

            // The result lands before the flag, so VF as a destination
            // ends up holding the flag.
            Operation::AddReg { x, y } => {
                let (sum, carry) = v[x].overflowing_add(v[y]);
                v[x] = sum;
                v[FLAG] = carry as u8;
            }

            Operation::SubReg { x, y } => {
                let (vx, vy) = (v[x], v[y]);
                v[x] = vx.wrapping_sub(vy);
                v[FLAG] = (vx > vy) as u8;
            }

            Operation::SubReverse { x, y } => {
                let (vx, vy) = (v[x], v[y]);
                v[x] = vy.wrapping_sub(vx);
                v[FLAG] = (vy > vx) as u8;
            }

            Operation::ShiftRight { x, .. } => {
                let dropped = v[x] & 0x01;
                v[x] >>= 1;
                v[FLAG] = dropped;
            }

            Operation::ShiftLeft { x, .. } => {
                let dropped = v[x] >> 7;
                v[x] <<= 1;
                v[FLAG] = dropped;
            }

            // ==================== Index / misc ====================
            Operation::LoadIndex { nnn } => self.regs.i = nnn,

            Operation::JumpIndexed { nnn } => {
                let target = nnn.wrapping_add(u16::from(v[0]));
                self.regs.jump(target);
            }

            Operation::Random { x, kk } => {
                let byte: u8 = self.rng.gen();
                self.regs.v[x] = byte & kk;
            }

            Operation::Draw { x, y, n } => {
                let (px, py) = (v[x] as usize, v[y] as usize);
                let collision = self.draw_sprite(px, py, n);
                self.regs.set_flag(collision);
                self.redraw = true;
            }

            // ==================== Keys ====================
            Operation::SkipKeyPressed { x } => {
                if input.poll_key() == Some(v[x]) {
                    self.regs.skip();
                }
            }

            Operation::SkipKeyNotPressed { x } => {
                if input.poll_key() != Some(v[x]) {
                    self.regs.skip();
                }
            }

            Operation::WaitKey { x } => {
                let key = loop {
                    if let Some(key) = input.poll_key() {
                        break key;
                    }
                    std::hint::spin_loop();
                };
                self.regs.v[x] = key;
            }

            // ==================== Timers ====================
            Operation::LoadDelay { x } => v[x] = self.regs.dt,
            Operation::SetDelay { x } => self.regs.dt = v[x],
            Operation::SetSound { x } => self.regs.st = v[x],

            // ==================== Index memory ====================
            Operation::AddIndex { x } => {
                self.regs.i = self.regs.i.wrapping_add(u16::from(v[x]));
            }

            Operation::LoadGlyph { x } => {
                self.regs.i = u16::from(v[x]) * GLYPH_SIZE as u16;
            }

            Operation::StoreBcd { x } => {
                let value = v[x];
                let i = self.regs.i;
                self.mem.write(i, value / 100);
                self.mem.write(i.wrapping_add(1), value / 10 % 10);
                self.mem.write(i.wrapping_add(2), value % 10);
            }

            Operation::StoreRegs { x } => {
                let i = self.regs.i;
                for r in 0..=x {
                    self.mem.write(i.wrapping_add(r as u16), self.regs.v[r]);
                }
            }

            Operation::LoadRegs { x } => {
                let i = self.regs.i;
                for r in 0..=x {
                    self.regs.v[r] = self.mem.read(i.wrapping_add(r as u16));
                }
            }
        }

        Ok(())
    }

    /// XOR an 8-pixel-wide, `rows`-tall sprite from [I] onto the screen at
    /// (x, y), wrapping at both edges. Returns true if any lit pixel was
    /// cleared.
    fn draw_sprite(&mut self, x: usize, y: usize, rows: u8) -> bool {
        let mut collision = false;

        for row in 0..rows as usize {
            let sprite = self.mem.read(self.regs.i.wrapping_add(row as u16));
            for col in 0..8 {
                if sprite & (0x80 >> col) != 0 {
                    collision |= self.mem.flip_pixel(x + col, y + row);
                }
            }
        }

        collision
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

/// CPU runtime errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("unknown opcode {opcode:#06X} at {pc:#05X}")]
    UnknownOpcode { opcode: u16, pc: u16 },

    #[error("stack overflow at {pc:#05X} (depth {depth})")]
    StackOverflow { pc: u16, depth: usize },

    #[error("return with empty stack at {pc:#05X}")]
    StackUnderflow { pc: u16 },

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("load error: {0}")]
    Load(#[from] RomError),
}
