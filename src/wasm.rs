//! WebAssembly bindings.
//!
//! This module provides JavaScript-friendly wrappers around the interpreter
//! and the assembler. The page owns the render loop: it calls `run` once
//! per animation frame, then reads `framebuffer` when `frames` changed.

use crate::asm::{assemble, disasm::disassemble_instruction, disassemble_rom};
use crate::config::Config;
use crate::cpu::{Cpu, Operation};
use crate::host::{Clock, FrameRecorder, Input, Peripherals};
use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// `Date.now()` in milliseconds.
struct JsClock;

impl Clock for JsClock {
    fn now_millis(&self) -> u64 {
        js_sys::Date::now() as u64
    }
}

/// The key the page reports as held.
#[derive(Default)]
struct LatchedKey(Option<u8>);

impl Input for LatchedKey {
    fn poll_key(&mut self) -> Option<u8> {
        self.0
    }
}

/// WebAssembly-friendly interpreter wrapper.
#[wasm_bindgen]
pub struct WasmVm {
    cpu: Cpu,
    rom: Vec<u8>,
    screen: FrameRecorder,
    key: LatchedKey,
}

#[wasm_bindgen]
impl WasmVm {
    /// Create an interpreter. `seed` makes RND reproducible.
    #[wasm_bindgen(constructor)]
    pub fn new(seed: Option<u64>) -> Self {
        let config = Config { seed, ..Config::default() };
        Self {
            cpu: Cpu::with_config(&config),
            rom: Vec::new(),
            screen: FrameRecorder::new(),
            key: LatchedKey::default(),
        }
    }

    /// Load a raw ROM image.
    #[wasm_bindgen]
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), JsError> {
        self.cpu.load_rom(rom).map_err(|e| JsError::new(&e.to_string()))?;
        self.rom = rom.to_vec();
        self.screen = FrameRecorder::new();
        Ok(())
    }

    /// Assemble source and load whatever it produced. Returns the assembly
    /// report as JSON: `{"bytes": [...], "diagnostics": [{"line", "message"}]}`.
    /// Fails only when nothing assembled.
    #[wasm_bindgen]
    pub fn load_asm(&mut self, source: &str) -> Result<String, JsError> {
        let report = assemble(source).report();
        self.load_rom(&report.bytes)?;
        serde_json::to_string(&report).map_err(|e| JsError::new(&e.to_string()))
    }

    /// Step one instruction. Returns its mnemonic.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsError> {
        if !self.cpu.is_running() {
            return Err(JsError::new("CPU is not running"));
        }
        if self.waiting_for_key() {
            return Err(JsError::new("waiting for a key"));
        }

        let pc = self.cpu.regs.pc;
        let mut dev = Peripherals::new(&mut self.screen, &mut self.key, &JsClock);
        self.cpu.step(&mut dev).map_err(|e| JsError::new(&e.to_string()))?;

        Ok(disassemble_instruction(self.cpu.mem.read_word(pc)))
    }

    /// Run up to `max_cycles` instructions. Stops early before a key wait
    /// with no key held, so the page never hangs. Returns the total cycle
    /// count.
    #[wasm_bindgen]
    pub fn run(&mut self, max_cycles: u32) -> Result<u64, JsError> {
        let limit = self.cpu.cycles + u64::from(max_cycles);
        let held = self.key.0.is_some();

        let mut dev = Peripherals::new(&mut self.screen, &mut self.key, &JsClock);
        self.cpu
            .run_until(&mut dev, |cpu| {
                cpu.cycles >= limit
                    || (!held && matches!(cpu.peek_operation(), Ok(Operation::WaitKey { .. })))
            })
            .map_err(|e| JsError::new(&e.to_string()))?;

        Ok(self.cpu.cycles)
    }

    /// Reload the current ROM.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.screen = FrameRecorder::new();
        // An empty ROM fails to load and leaves a blank machine.
        if self.cpu.load_rom(&self.rom).is_err() {
            self.cpu.reset();
        }
    }

    /// Report the held key (0-15), or none.
    #[wasm_bindgen]
    pub fn set_key(&mut self, key: Option<u8>) {
        self.key.0 = key.map(|k| k & 0xF);
    }

    /// Map a keyboard character to a keypad key.
    #[wasm_bindgen]
    pub fn key_for(c: char) -> Option<u8> {
        crate::host::logical_key(c)
    }

    /// The 256 framebuffer bytes currently in memory (64x32, MSB first).
    /// Cleared by `reset` and `load_rom` even before the next render.
    #[wasm_bindgen]
    pub fn framebuffer(&self) -> Vec<u8> {
        self.cpu.framebuffer().to_vec()
    }

    /// Number of renders so far.
    #[wasm_bindgen]
    pub fn frames(&self) -> usize {
        self.screen.frames
    }

    #[wasm_bindgen]
    pub fn is_running(&self) -> bool {
        self.cpu.is_running()
    }

    #[wasm_bindgen]
    pub fn waiting_for_key(&self) -> bool {
        self.key.0.is_none() && matches!(self.cpu.peek_operation(), Ok(Operation::WaitKey { .. }))
    }

    /// Get cycle count.
    #[wasm_bindgen]
    pub fn cycles(&self) -> u64 {
        self.cpu.cycles
    }

    /// Get program counter.
    #[wasm_bindgen]
    pub fn pc(&self) -> u16 {
        self.cpu.regs.pc
    }

    /// Sound timer is non-zero.
    #[wasm_bindgen]
    pub fn beeping(&self) -> bool {
        self.cpu.regs.st > 0
    }

    /// Get state as string.
    #[wasm_bindgen]
    pub fn state(&self) -> String {
        format!("{:?}", self.cpu.state)
    }

    /// Get registers as JSON string.
    #[wasm_bindgen]
    pub fn registers_json(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.cpu.regs).map_err(|e| JsError::new(&e.to_string()))
    }
}

impl Default for WasmVm {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Assemble source. Returns the bytes and every diagnostic as JSON, in the
/// same shape as `WasmVm::load_asm`.
#[wasm_bindgen]
pub fn wasm_assemble(source: &str) -> Result<String, JsError> {
    serde_json::to_string(&assemble(source).report()).map_err(|e| JsError::new(&e.to_string()))
}

/// Disassemble ROM bytes loaded at 0x200.
#[wasm_bindgen]
pub fn wasm_disassemble(rom: &[u8]) -> String {
    disassemble_rom(rom).to_string()
}
