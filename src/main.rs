//! chip8-emu - CLI Entry Point
//!
//! Commands:
//! - `chip8-emu run <rom>` - Run a ROM or ASM file (terminal UI or headless)
//! - `chip8-emu asm <source>` - Assemble to a raw ROM
//! - `chip8-emu disasm <rom>` - Disassemble a ROM to text

use chip8::asm::{assemble, disassemble, load_rom, read_image, save_rom};
use chip8::config::Config;
use chip8::cpu::memory::{SCREEN_HEIGHT, SCREEN_WIDTH};
use chip8::cpu::{Cpu, CpuState, Operation};
use chip8::host::{FrameRecorder, LogTracer, NoInput, Peripherals, SystemClock};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "chip8-emu")]
#[command(version)]
#[command(about = "A CHIP-8 style interpreter with a matching assembler and disassembler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program
    Run {
        /// Path to the ROM or ASM file to execute
        rom: PathBuf,
        /// Start paused with the debug panels open
        #[arg(short, long)]
        debug: bool,
        /// Pause when PC reaches this address (hex, repeatable)
        #[arg(short, long, value_parser = parse_address)]
        breakpoint: Vec<u16>,
        /// Timer frequency in Hz
        #[arg(short, long)]
        frequency: Option<u32>,
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Run without a terminal UI and print the final state
        #[arg(long)]
        headless: bool,
        /// Stop a headless run after this many cycles
        #[arg(short, long)]
        max_cycles: Option<u64>,
        /// Log every instruction at trace level
        #[arg(short, long)]
        trace: bool,
    },
    /// Assemble source to a raw ROM
    Asm {
        /// Path to the source file
        input: PathBuf,
        /// Output ROM file (default: input with a .ch8 extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Disassemble a ROM to readable text
    Disasm {
        /// Path to the ROM file
        input: PathBuf,
        /// Output text file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Address the ROM is loaded at (hex)
        #[arg(long, value_parser = parse_address, default_value = "0x200")]
        program_start: u16,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { rom, debug, breakpoint, frequency, config, headless, max_cycles, trace } => {
            let config = build_config(config.as_deref(), frequency, trace);
            let headless = headless || !cfg!(feature = "tui");

            // The terminal UI owns stderr's screen; keep it quiet unless asked.
            init_logging(match (headless, config.trace) {
                (_, true) => "warn,chip8=trace",
                (true, false) => "warn",
                (false, false) => "off",
            });

            let program = load_program(&rom);
            if headless {
                run_headless(program, &config, max_cycles);
            } else {
                run_terminal(program, config, debug, breakpoint);
            }
        }
        Commands::Asm { input, output } => {
            init_logging("warn");
            assemble_file(&input, output);
        }
        Commands::Disasm { input, output, program_start } => {
            init_logging("warn");
            disassemble_file(&input, output, program_start);
        }
    }
}

fn init_logging(default_filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn parse_address(s: &str) -> Result<u16, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    let value = u16::from_str_radix(digits, 16).map_err(|e| format!("invalid address '{}': {}", s, e))?;
    if value > 0x0FFF {
        return Err(format!("address {:#X} is outside memory", value));
    }
    Ok(value)
}

fn build_config(path: Option<&Path>, frequency: Option<u32>, trace: bool) -> Config {
    let mut config = match path {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("❌ Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    if let Some(hz) = frequency {
        config.timer_hz = hz;
    }
    config.trace |= trace;

    if let Err(e) = config.validate() {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }
    config
}

/// Load a ROM, assembling it first when it is a `.asm` file.
fn load_program(path: &Path) -> Vec<u8> {
    let is_source = path.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("asm"));
    if !is_source {
        return match load_rom(path) {
            Ok(bytes) => {
                println!("📂 Loaded {} bytes from {}", bytes.len(), path.display());
                bytes
            }
            Err(e) => {
                eprintln!("❌ Failed to load ROM: {}", e);
                std::process::exit(1);
            }
        };
    }

    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read file: {}", e);
            std::process::exit(1);
        }
    };

    // Bad lines are skipped, as with `asm`; the rest of the program runs.
    let assembly = assemble(&source);
    for diagnostic in &assembly.diagnostics {
        eprintln!("⚠️  {}", diagnostic);
    }

    println!("📝 Assembled {} instructions", assembly.bytes.len() / 2);
    if !assembly.is_clean() {
        println!("⚠️  {} lines skipped", assembly.diagnostics.len());
    }
    assembly.bytes
}

#[cfg(feature = "tui")]
fn run_terminal(program: Vec<u8>, config: Config, debug: bool, breakpoints: Vec<u16>) {
    if let Err(e) = chip8::tui::run_tui(program, config, debug, &breakpoints) {
        eprintln!("❌ Terminal error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "tui"))]
fn run_terminal(program: Vec<u8>, config: Config, _debug: bool, _breakpoints: Vec<u16>) {
    run_headless(program, &config, None);
}

fn run_headless(program: Vec<u8>, config: &Config, max_cycles: Option<u64>) {
    let mut cpu = Cpu::with_config(config);
    if let Err(e) = cpu.load_rom(&program) {
        eprintln!("❌ Failed to load program: {}", e);
        std::process::exit(1);
    }

    let mut screen = FrameRecorder::new();
    let mut input = NoInput;
    let clock = SystemClock::new();
    let mut tracer = LogTracer;

    let mut dev = Peripherals::new(&mut screen, &mut input, &clock);
    if config.trace {
        dev = dev.with_tracer(&mut tracer);
    }

    println!();
    println!("━━━ Execution ━━━");

    // Nothing can ever press a key here, so a key wait ends the run.
    let limit = max_cycles.unwrap_or(u64::MAX);
    let result = cpu.run_until(&mut dev, |cpu| {
        cpu.cycles >= limit || matches!(cpu.peek_operation(), Ok(Operation::WaitKey { .. }))
    });
    drop(dev);

    println!();
    println!("━━━ Result ━━━");
    println!("Cycles: {}", cpu.cycles);
    println!("State: {:?}", cpu.state);
    println!("PC: {:03X}  I: {:03X}  DT: {:02X}  ST: {:02X}", cpu.regs.pc, cpu.regs.i, cpu.regs.dt, cpu.regs.st);
    for (half, values) in cpu.regs.v.chunks(8).enumerate() {
        let text: Vec<String> = values
            .iter()
            .enumerate()
            .map(|(i, v)| format!("V{:X}={:02X}", half * 8 + i, v))
            .collect();
        println!("{}", text.join(" "));
    }

    if screen.frames > 0 {
        println!();
        println!("━━━ Screen ({} frames) ━━━", screen.frames);
        for y in 0..SCREEN_HEIGHT {
            let line: String = (0..SCREEN_WIDTH)
                .map(|x| if screen.pixel(x, y) { '█' } else { '·' })
                .collect();
            println!("{}", line);
        }
    }

    match result {
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
        Ok(_) if cpu.state == CpuState::Running && cpu.cycles >= limit => {
            println!();
            println!("⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.", limit);
        }
        Ok(_) => {
            println!();
            println!("⌨️  Stopped at a key wait (PC={:03X}); no keypad in headless mode.", cpu.regs.pc);
        }
    }
}

fn assemble_file(input: &Path, output: Option<PathBuf>) {
    let out_path = output.unwrap_or_else(|| input.with_extension("ch8"));

    println!("📝 Assembling: {} → {}", input.display(), out_path.display());

    // Read source
    let source = match std::fs::read_to_string(input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read file: {}", e);
            std::process::exit(1);
        }
    };

    let assembly = assemble(&source);
    for diagnostic in &assembly.diagnostics {
        eprintln!("⚠️  {}", diagnostic);
    }

    println!("✓ Assembled {} instructions", assembly.bytes.len() / 2);
    if !assembly.is_clean() {
        println!("⚠️  {} lines skipped", assembly.diagnostics.len());
    }

    if let Err(e) = save_rom(&out_path, &assembly.bytes) {
        eprintln!("❌ Failed to save ROM: {}", e);
        std::process::exit(1);
    }

    println!("✓ Saved to {}", out_path.display());
}

fn disassemble_file(input: &Path, output: Option<PathBuf>, program_start: u16) {
    // Any length disassembles, even images too large to run.
    let rom = match read_image(input) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("❌ Failed to read ROM: {}", e);
            std::process::exit(1);
        }
    };

    let listing = disassemble(&rom, program_start);
    if !listing.invalid.is_empty() {
        eprintln!("⚠️  {} invalid words", listing.invalid.len());
    }

    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, listing.to_string()) {
                eprintln!("❌ Failed to write {}: {}", path.display(), e);
                std::process::exit(1);
            }
            println!("✓ Wrote {} lines to {}", listing.lines.len(), path.display());
        }
        None => print!("{}", listing),
    }
}
