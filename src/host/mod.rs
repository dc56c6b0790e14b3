//! Host collaborators.
//!
//! The interpreter never touches a terminal, a keyboard or the wall clock
//! directly. Everything outside the machine goes through the small traits
//! here, bundled per call into [`Peripherals`]. The headless implementations
//! below back the CLI's `--headless` mode and the test suite; the terminal
//! and browser frontends live in their own feature-gated modules.

use crate::cpu::registers::Registers;
use log::trace;
use std::cell::Cell;
use std::collections::VecDeque;
use std::time::Instant;

/// Receives the framebuffer whenever the program changed it.
pub trait Display {
    /// `framebuffer` is 256 bytes, 8 pixels per byte, MSB first, row-major.
    fn render(&mut self, framebuffer: &[u8]);
}

/// Source of logical key presses (0x0..=0xF).
pub trait Input {
    /// The key currently down, if any. Called once per key instruction and
    /// repeatedly while waiting for a key.
    fn poll_key(&mut self) -> Option<u8>;
}

/// Monotonic milliseconds.
pub trait Clock {
    fn now_millis(&self) -> u64;
}

/// Observer called once per executed instruction.
pub trait Tracer {
    fn on_instruction(&mut self, pc: u16, opcode: u16, mnemonic: Option<&str>, regs: &Registers);
}

impl<F> Tracer for F
where
    F: FnMut(u16, u16, Option<&str>, &Registers),
{
    fn on_instruction(&mut self, pc: u16, opcode: u16, mnemonic: Option<&str>, regs: &Registers) {
        self(pc, opcode, mnemonic, regs)
    }
}

/// The set of collaborators one run borrows.
pub struct Peripherals<'a> {
    pub display: &'a mut dyn Display,
    pub input: &'a mut dyn Input,
    pub clock: &'a dyn Clock,
    pub tracer: Option<&'a mut dyn Tracer>,
}

impl<'a> Peripherals<'a> {
    pub fn new(display: &'a mut dyn Display, input: &'a mut dyn Input, clock: &'a dyn Clock) -> Self {
        Self { display, input, clock, tracer: None }
    }

    /// Attach a per-instruction observer.
    pub fn with_tracer(mut self, tracer: &'a mut dyn Tracer) -> Self {
        self.tracer = Some(tracer);
        self
    }
}

// ==================== Keypad ====================

/// Host keys for logical keys 0x0..=0xF, in order.
///
/// ```text
/// 1 2 3 4      1 2 3 C
/// q w e r  ->  4 5 6 D
/// a s d f      7 8 9 E
/// z x c v      A 0 B F
/// ```
pub const KEYMAP: [char; 16] = [
    'x', '1', '2', '3', 'q', 'w', 'e', 'a', 's', 'd', 'z', 'c', '4', 'r', 'f', 'v',
];

/// Map a host key to a logical key.
pub fn logical_key(c: char) -> Option<u8> {
    let c = c.to_ascii_lowercase();
    KEYMAP.iter().position(|&k| k == c).map(|i| i as u8)
}

// ==================== Headless collaborators ====================

/// Discards every frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl Display for NullDisplay {
    fn render(&mut self, _framebuffer: &[u8]) {}
}

/// Keeps the most recent frame and counts renders.
#[derive(Debug, Default, Clone)]
pub struct FrameRecorder {
    pub frames: usize,
    pub last: Vec<u8>,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether pixel (x, y) was lit in the last frame.
    pub fn pixel(&self, x: usize, y: usize) -> bool {
        use crate::cpu::memory::SCREEN_WIDTH;
        let bit = y * SCREEN_WIDTH + x;
        self.last
            .get(bit / 8)
            .map_or(false, |byte| byte & (0x80 >> (bit % 8)) != 0)
    }
}

impl Display for FrameRecorder {
    fn render(&mut self, framebuffer: &[u8]) {
        self.frames += 1;
        self.last.clear();
        self.last.extend_from_slice(framebuffer);
    }
}

/// No key is ever pressed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInput;

impl Input for NoInput {
    fn poll_key(&mut self) -> Option<u8> {
        None
    }
}

/// Replays a fixed sequence of polls, then reports `idle` forever.
#[derive(Debug, Default, Clone)]
pub struct ScriptedInput {
    script: VecDeque<Option<u8>>,
    idle: Option<u8>,
    polls: usize,
}

impl ScriptedInput {
    pub fn new<I: IntoIterator<Item = Option<u8>>>(script: I) -> Self {
        Self {
            script: script.into_iter().collect(),
            idle: None,
            polls: 0,
        }
    }

    /// A key held down for the whole run.
    pub fn holding(key: u8) -> Self {
        Self { script: VecDeque::new(), idle: Some(key), polls: 0 }
    }

    /// Number of times the interpreter polled.
    pub fn polls(&self) -> usize {
        self.polls
    }
}

impl Input for ScriptedInput {
    fn poll_key(&mut self) -> Option<u8> {
        self.polls += 1;
        self.script.pop_front().unwrap_or(self.idle)
    }
}

/// Wall clock measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// A clock the caller moves by hand.
///
/// With a non-zero `step`, every read returns the current time and then
/// advances it, so one interpreter cycle costs `step` milliseconds.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Cell<u64>,
    step: u64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stepping(step: u64) -> Self {
        Self { now: Cell::new(0), step }
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        let now = self.now.get();
        self.now.set(now + self.step);
        now
    }
}

/// Writes one `trace!` record per instruction.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTracer;

impl Tracer for LogTracer {
    fn on_instruction(&mut self, pc: u16, opcode: u16, mnemonic: Option<&str>, regs: &Registers) {
        trace!(
            "{:03X}: {:04X} {:<18} I={:03X} V={:02X?}",
            pc,
            opcode,
            mnemonic.unwrap_or("???"),
            regs.i,
            regs.v
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keymap_covers_every_key() {
        assert_eq!(logical_key('x'), Some(0x0));
        assert_eq!(logical_key('1'), Some(0x1));
        assert_eq!(logical_key('Q'), Some(0x4));
        assert_eq!(logical_key('4'), Some(0xC));
        assert_eq!(logical_key('v'), Some(0xF));
        assert_eq!(logical_key('p'), None);

        for (key, &c) in KEYMAP.iter().enumerate() {
            assert_eq!(logical_key(c), Some(key as u8));
        }
    }

    #[test]
    fn test_scripted_input() {
        let mut input = ScriptedInput::new([None, Some(3)]);
        assert_eq!(input.poll_key(), None);
        assert_eq!(input.poll_key(), Some(3));
        assert_eq!(input.poll_key(), None);
        assert_eq!(input.polls(), 3);

        let mut held = ScriptedInput::holding(7);
        assert_eq!(held.poll_key(), Some(7));
        assert_eq!(held.poll_key(), Some(7));
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new();
        assert_eq!(clock.now_millis(), 0);
        clock.advance(16);
        assert_eq!(clock.now_millis(), 16);

        let stepping = ManualClock::stepping(1);
        assert_eq!(stepping.now_millis(), 0);
        assert_eq!(stepping.now_millis(), 1);
        assert_eq!(stepping.now_millis(), 2);
    }

    #[test]
    fn test_frame_recorder() {
        let mut recorder = FrameRecorder::new();
        let mut frame = vec![0u8; 256];
        frame[0] = 0x80;
        frame[255] = 0x01;

        recorder.render(&frame);
        assert_eq!(recorder.frames, 1);
        assert!(recorder.pixel(0, 0));
        assert!(recorder.pixel(63, 31));
        assert!(!recorder.pixel(1, 0));
    }

    #[test]
    fn test_closure_tracer() {
        let mut seen = Vec::new();
        {
            let mut tracer = |pc: u16, opcode: u16, _: Option<&str>, _: &Registers| {
                seen.push((pc, opcode));
            };
            tracer.on_instruction(0x200, 0x00E0, Some("CLS"), &Registers::new());
        }
        assert_eq!(seen, vec![(0x200, 0x00E0)]);
    }
}
