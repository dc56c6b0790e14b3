//! Terminal-backed collaborators.

use crate::cpu::memory::FRAMEBUFFER_SIZE;
use crate::cpu::registers::Registers;
use crate::host::{logical_key, Display, Input, LogTracer, Tracer};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// How long a keypad key counts as held after a press. Terminals only
/// report presses, so a press is latched for a short window.
const KEY_HOLD: Duration = Duration::from_millis(120);

/// Debugger controls, kept off the keypad keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Quit,
    TogglePause,
    Step,
    ToggleBreakpoint,
    Reset,
}

/// Latches keypad presses from crossterm events.
#[derive(Debug, Default)]
pub struct TerminalKeys {
    latched: Option<(u8, Instant)>,
}

impl TerminalKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain pending terminal events, waiting at most `timeout` for the
    /// first. Keypad keys are latched; controls are returned in order.
    pub fn pump(&mut self, timeout: Duration) -> std::io::Result<Vec<Control>> {
        let mut controls = Vec::new();
        let mut wait = timeout;

        while event::poll(wait)? {
            wait = Duration::ZERO;
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }

            match key.code {
                KeyCode::Esc => controls.push(Control::Quit),
                KeyCode::Char(' ') => controls.push(Control::TogglePause),
                KeyCode::Char('n') => controls.push(Control::Step),
                KeyCode::Char('b') => controls.push(Control::ToggleBreakpoint),
                KeyCode::Backspace => controls.push(Control::Reset),
                KeyCode::Char(c) => {
                    if let Some(key) = logical_key(c) {
                        self.latched = Some((key, Instant::now()));
                    }
                }
                _ => {}
            }
        }

        Ok(controls)
    }

    /// Whether a keypad key is currently held.
    pub fn has_key(&self) -> bool {
        self.current().is_some()
    }

    fn current(&self) -> Option<u8> {
        self.latched
            .filter(|(_, at)| at.elapsed() < KEY_HOLD)
            .map(|(key, _)| key)
    }
}

impl Input for TerminalKeys {
    fn poll_key(&mut self) -> Option<u8> {
        self.current()
    }
}

/// Holds the last rendered frame for the UI to draw.
#[derive(Debug, Clone)]
pub struct TerminalScreen {
    pub frame: Vec<u8>,
    pub renders: u64,
}

impl TerminalScreen {
    pub fn new() -> Self {
        Self { frame: vec![0; FRAMEBUFFER_SIZE], renders: 0 }
    }
}

impl Default for TerminalScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TerminalScreen {
    fn render(&mut self, framebuffer: &[u8]) {
        self.frame.clear();
        self.frame.extend_from_slice(framebuffer);
        self.renders += 1;
    }
}

/// Rolling history of executed instructions for the trace panel.
#[derive(Debug, Clone)]
pub struct TraceLog {
    pub history: VecDeque<String>,
    capacity: usize,
    forward: Option<LogTracer>,
}

impl TraceLog {
    pub fn new(capacity: usize, log_records: bool) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            forward: log_records.then_some(LogTracer),
        }
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

impl Tracer for TraceLog {
    fn on_instruction(&mut self, pc: u16, opcode: u16, mnemonic: Option<&str>, regs: &Registers) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history
            .push_back(format!("{:03X}  {:04X}  {}", pc, opcode, mnemonic.unwrap_or("???")));

        if let Some(log) = self.forward.as_mut() {
            log.on_instruction(pc, opcode, mnemonic, regs);
        }
    }
}
