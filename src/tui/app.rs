//! Emulator application state and logic.

use super::terminal::{Control, TerminalKeys, TerminalScreen, TraceLog};
use crate::asm::disasm::disassemble_instruction;
use crate::config::Config;
use crate::cpu::{Cpu, CpuError, Operation};
use crate::host::{Peripherals, SystemClock};
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Wall time spent executing per UI frame.
const FRAME: Duration = Duration::from_millis(16);

const TRACE_DEPTH: usize = 64;

/// Emulator application state.
pub struct EmulatorApp {
    /// The CPU being run.
    pub cpu: Cpu,
    /// Loaded ROM, kept for reset.
    pub rom: Vec<u8>,
    pub config: Config,
    pub screen: TerminalScreen,
    pub keys: TerminalKeys,
    pub trace: TraceLog,
    clock: SystemClock,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<u16>,
    /// Show the debug panels.
    pub debug: bool,
    /// Is the program running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
}

impl EmulatorApp {
    /// Create the app with a loaded ROM.
    pub fn new(rom: Vec<u8>, config: Config, debug: bool) -> Result<Self, CpuError> {
        let mut cpu = Cpu::with_config(&config);
        cpu.load_rom(&rom)?;

        let status = if debug {
            "Paused. Space: run, n: step, Esc: quit.".to_string()
        } else {
            "Running.".to_string()
        };

        Ok(Self {
            cpu,
            rom,
            trace: TraceLog::new(TRACE_DEPTH, config.trace),
            config,
            screen: TerminalScreen::new(),
            keys: TerminalKeys::new(),
            clock: SystemClock::new(),
            breakpoints: HashSet::new(),
            debug,
            running: !debug,
            should_quit: false,
            status,
        })
    }

    /// Whether stepping now would block waiting for a key the terminal has
    /// not delivered yet.
    fn would_block(&self) -> bool {
        matches!(self.cpu.peek_operation(), Ok(Operation::WaitKey { .. })) && !self.keys.has_key()
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if !self.cpu.is_running() {
            self.status = format!("CPU stopped: {:?}", self.cpu.state);
            self.running = false;
            return;
        }
        if self.would_block() {
            self.status = "Waiting for a key.".into();
            return;
        }

        let pc = self.cpu.regs.pc;
        let mut dev = Peripherals::new(&mut self.screen, &mut self.keys, &self.clock)
            .with_tracer(&mut self.trace);

        match self.cpu.step(&mut dev) {
            Ok(_) => {
                let opcode = self.cpu.mem.read_word(pc);
                self.status = format!("PC={:03X}: {}", pc, disassemble_instruction(opcode));
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
    }

    /// Resume continuous execution.
    pub fn run(&mut self) {
        // Leave the breakpoint we are parked on.
        if self.breakpoints.contains(&self.cpu.regs.pc) {
            self.step();
        }
        self.running = true;
        self.status = "Running...".into();
    }

    pub fn pause(&mut self) {
        self.running = false;
        self.status = format!("Paused at PC={:03X}.", self.cpu.regs.pc);
    }

    /// Execute one frame's worth of instructions.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        let started = Instant::now();
        while started.elapsed() < FRAME {
            if !self.cpu.is_running() {
                self.running = false;
                self.status = format!("Stopped after {} cycles", self.cpu.cycles);
                return;
            }

            // Check for breakpoint
            let pc = self.cpu.regs.pc;
            if self.breakpoints.contains(&pc) {
                self.running = false;
                self.status = format!("Breakpoint at PC={:03X}", pc);
                return;
            }

            if self.would_block() {
                return;
            }

            let mut dev = Peripherals::new(&mut self.screen, &mut self.keys, &self.clock)
                .with_tracer(&mut self.trace);
            if let Err(e) = self.cpu.step(&mut dev) {
                self.status = format!("Error: {}", e);
                self.running = false;
                return;
            }
        }
    }

    /// Toggle breakpoint at current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.regs.pc;
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={:03X}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={:03X}", pc);
        }
    }

    /// Reload the ROM and start over.
    pub fn reset(&mut self) {
        if let Err(e) = self.cpu.load_rom(&self.rom) {
            self.status = format!("Error: {}", e);
            return;
        }
        self.screen = TerminalScreen::new();
        self.trace.clear();
        self.running = !self.debug;
        self.status = "Reset.".into();
    }

    pub fn handle(&mut self, control: Control) {
        match control {
            Control::Quit => self.should_quit = true,
            Control::TogglePause => {
                if self.running {
                    self.pause();
                } else {
                    self.run();
                }
            }
            Control::Step => {
                self.running = false;
                self.step();
            }
            Control::ToggleBreakpoint => self.toggle_breakpoint(),
            Control::Reset => self.reset(),
        }
    }

    /// Disassembly around the current PC: (address, text, is_current).
    pub fn get_disassembly(&self, lines: usize) -> Vec<(u16, String, bool)> {
        let pc = self.cpu.regs.pc;
        let start = pc.saturating_sub((lines / 2) as u16 * 2);

        (0..lines as u16)
            .map(|i| start.wrapping_add(i * 2) & 0x0FFF)
            .map(|addr| {
                let text = disassemble_instruction(self.cpu.mem.read_word(addr));
                (addr, text, addr == pc)
            })
            .collect()
    }
}

/// Run a ROM in the terminal until the user quits.
pub fn run_tui(rom: Vec<u8>, config: Config, debug: bool, breakpoints: &[u16]) -> std::io::Result<()> {
    use crossterm::{
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;

    let mut app = EmulatorApp::new(rom, config, debug)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
    app.breakpoints.extend(breakpoints.iter().copied());

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = (|| -> std::io::Result<()> {
        loop {
            terminal.draw(|frame| super::ui::draw(frame, &app))?;

            let wait = if app.running { Duration::ZERO } else { Duration::from_millis(50) };
            for control in app.keys.pump(wait)? {
                app.handle(control);
            }

            app.tick();

            if app.should_quit {
                return Ok(());
            }
        }
    })();

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}
