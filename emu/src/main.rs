use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufRead, BufReader, Write},
    num::ParseIntError,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use clap::{Parser, ValueEnum};
use m6502::{
    bus::{Bus, Host},
    cpu::{self, Cpu, Flags},
    mem::Mem,
    sys::{Control, RunMode, System},
};
use memmap2::Mmap;
use signal_hook::{consts, flag};
use termion::color::{Fg, LightBlue, LightMagenta, LightRed, LightYellow, Reset};
use tracing::Level;

/// Flat RAM with an optional console output port and a per-frame IRQ timer.
struct Machine {
    mem: Mem,
    putc: Option<u16>,
    irq: bool,
    frame_limit: Option<(u64, Control)>,
    fps_window: Instant,
    fps_frames: u64,
}

impl Machine {
    fn new(putc: Option<u16>, irq: bool) -> Self {
        Self {
            mem: Mem::new(),
            putc,
            irq,
            frame_limit: None,
            fps_window: Instant::now(),
            fps_frames: 0,
        }
    }
}

impl Bus for Machine {
    fn read(&mut self, addr: u16) -> u8 {
        self.mem.read(addr)
    }

    fn write(&mut self, addr: u16, data: u8) {
        if self.putc == Some(addr) {
            let mut out = io::stdout().lock();
            out.write_all(&[data])
                .and_then(|()| out.flush())
                .map_err(|e| tracing::warn!("console write failed: {e}"))
                .ok();
            return;
        }
        self.mem.write(addr, data)
    }

    fn clear(&mut self) {
        self.mem.clear();
    }
}

impl Host for Machine {
    fn render(&mut self, frame: u64) {
        self.fps_frames += 1;
        let elapsed = self.fps_window.elapsed();
        if elapsed >= Duration::from_secs(1) {
            tracing::debug!(
                "frame {frame}: {:.1} fps",
                self.fps_frames as f64 / elapsed.as_secs_f64()
            );
            self.fps_window = Instant::now();
            self.fps_frames = 0;
        }
        if let Some((limit, control)) = &self.frame_limit {
            if *limit == frame {
                tracing::info!("frame limit reached");
                control.stop();
            }
        }
    }

    fn interrupt(&mut self, cpu: &mut Cpu) {
        if self.irq {
            cpu.irq(self);
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Speed {
    Paused,
    Standard,
    Fast,
    Unrestricted,
}

impl From<Speed> for RunMode {
    fn from(speed: Speed) -> Self {
        match speed {
            Speed::Paused => RunMode::Paused,
            Speed::Standard => RunMode::Standard,
            Speed::Fast => RunMode::Fast,
            Speed::Unrestricted => RunMode::Unrestricted,
        }
    }
}

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to program image
    image: PathBuf,

    /// Address (hex) the image is loaded at
    #[arg(long, value_parser = parse_hex, default_value = "0000")]
    load: u16,

    /// Start address (hex). Defaults to the reset vector
    #[arg(short, long, value_parser = parse_hex)]
    entry: Option<u16>,

    /// Clock speed in MHz
    #[arg(long, default_value_t = cpu::DEFAULT_CLOCK_MHZ)]
    mhz: f64,

    /// Initial run mode
    #[arg(long, value_enum, default_value_t = Speed::Standard)]
    speed: Speed,

    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u64>,

    /// Log every instruction (needs `--log-level TRACE`)
    #[arg(short, long)]
    trace: bool,

    /// Stop when an instruction jumps to itself
    #[arg(long)]
    trap: bool,

    /// Address (hex) of the console output port
    #[arg(long, value_parser = parse_hex)]
    putc: Option<u16>,

    /// Raise an IRQ at the end of every frame
    #[arg(long)]
    irq: bool,

    /// One of `TRACE`, `DEBUG`, `INFO`, `WARN`, or `ERROR`
    #[arg(short, long, default_value_t = Level::INFO)]
    log_level: Level,

    /// Start with debugger enabled
    #[arg(short, long)]
    debug: bool,

    /// Debugger symbol file
    #[arg(short, long)]
    sym: Option<PathBuf>,
}

fn main() -> Result<(), ()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(io::stderr)
        .init();

    let image = File::open(&args.image)
        .map_err(|e| tracing::error!("failed to open image file: {e}"))?;
    let image = (unsafe { Mmap::map(&image) })
        .map_err(|e| tracing::error!("failed to map image file: {e}"))?;
    let room = 0x10000 - args.load as usize;
    if image.len() > room {
        tracing::error!(
            "image is {} bytes, but only {room} bytes fit above {:04X}",
            image.len(),
            args.load
        );
        return Err(());
    }

    let symbols = match &args.sym {
        Some(sym) => load_symbols(sym)?,
        None => HashMap::new(),
    };

    let debug_mode = Arc::new(AtomicBool::new(args.debug));
    flag::register(consts::SIGUSR1, debug_mode.clone())
        .map_err(|e| {
            tracing::warn!("external debugger unavailable: failed to install SIGUSR1 handler: {e}")
        })
        .ok();
    let pause_toggle = Arc::new(AtomicBool::new(false));
    flag::register(consts::SIGUSR2, pause_toggle.clone())
        .map_err(|e| tracing::warn!("failed to install SIGUSR2 handler: {e}"))
        .ok();
    let interrupted = Arc::new(AtomicBool::new(false));
    flag::register(consts::SIGINT, interrupted.clone())
        .map_err(|e| tracing::warn!("failed to install SIGINT handler: {e}"))
        .ok();

    let mut sys = System::new(Machine::new(args.putc, args.irq));
    let control = sys.control();
    sys.reset();
    sys.host_mut().mem.load(args.load, &image);
    match args.entry {
        Some(entry) => sys.cpu_mut().set_pc(entry),
        None => {
            let (cpu, host) = sys.view();
            cpu.jump_to_reset_vector(host);
        }
    }
    sys.set_processor_speed(args.mhz);
    sys.set_trace(args.trace);
    sys.host_mut().frame_limit = args.frames.map(|frames| (frames, control.clone()));
    control.set_mode(args.speed.into());
    tracing::info!("starting at {:04X}", sys.cpu().pc());

    let mut breakpoints = Vec::new();
    let mut resume_mode = RunMode::Standard;
    let stdin = io::stdin();

    'emu: loop {
        if interrupted.swap(false, Ordering::Relaxed) {
            control.stop();
        }
        if pause_toggle.swap(false, Ordering::Relaxed) {
            match control.mode() {
                RunMode::Paused => control.set_mode(resume_mode),
                mode => {
                    resume_mode = mode;
                    control.pause();
                }
            }
        }
        match control.mode() {
            RunMode::Stopped => break,
            RunMode::Paused => {
                sys.idle_frame();
                continue;
            }
            RunMode::Standard | RunMode::Fast | RunMode::Unrestricted => {}
        }

        if breakpoints.contains(&sys.cpu().pc()) {
            debug_mode.store(true, Ordering::Relaxed);
        }
        if debug_mode.load(Ordering::Relaxed) {
            let (cpu, host) = sys.view();
            disassemble(host, cpu, &symbols, None, 1);
            let mut cached_parts = Vec::new();
            loop {
                print!("dbg>");
                io::stdout()
                    .flush()
                    .map_err(|e| tracing::error!("failed to write to stdout: {e}"))?;
                let mut line = String::new();
                let read = stdin
                    .lock()
                    .read_line(&mut line)
                    .map_err(|e| tracing::error!("failed to read debugger input: {e}"))?;
                if read == 0 {
                    break 'emu;
                }

                let parts = line
                    .split_whitespace()
                    .map(String::from)
                    .collect::<Vec<String>>();
                let parts = if parts.is_empty() {
                    cached_parts.clone()
                } else {
                    cached_parts = parts.clone();
                    parts
                };
                if parts.is_empty() {
                    continue;
                }
                let arg = parts.get(1).map(String::as_str);
                match parts[0].as_str() {
                    "c" => break,      // continue emulator
                    "q" => break 'emu, // quit emulator
                    "s" | "n" => {
                        sys.step();
                        let (cpu, host) = sys.view();
                        disassemble(host, cpu, &symbols, None, 1);
                    }
                    "r" => print_cpu_regs(sys.cpu()),
                    "b" => add_breakpoint(sys.cpu(), &mut breakpoints, &symbols, arg),
                    "B" => remove_breakpoint(sys.cpu(), &mut breakpoints, &symbols, arg),
                    "x" => {
                        let (cpu, host) = sys.view();
                        examine(host, cpu, &symbols, arg);
                    }
                    "d" => {
                        let (cpu, host) = sys.view();
                        disassemble(host, cpu, &symbols, arg, 24);
                    }
                    "?" => print_help(),
                    _ => println!("unknown command: `{}`. type `?` for help", parts[0]),
                }
            }
            debug_mode.store(false, Ordering::Relaxed);
        }

        let step = sys.step();
        if args.trap && sys.cpu().pc() == step.pc {
            tracing::info!("trapped at {:04X}", step.pc);
            print_cpu_regs(sys.cpu());
            break;
        }
    }

    tracing::info!("stopped after {} frames", sys.frame());
    Ok(())
}

fn parse_hex(arg: &str) -> Result<u16, ParseIntError> {
    let digits = arg
        .strip_prefix("0x")
        .or_else(|| arg.strip_prefix('$'))
        .unwrap_or(arg);
    u16::from_str_radix(digits, 16)
}

fn load_symbols(path: &Path) -> Result<HashMap<u16, Vec<String>>, ()> {
    let mut symbols = HashMap::<u16, Vec<String>>::new();
    let file = File::open(path).map_err(|e| tracing::error!("failed to open SYM file: {e}"))?;
    for (line_no, line_result) in BufReader::new(file).lines().enumerate() {
        let line = line_result.map_err(|e| tracing::error!("failed to read SYM file: {e}"))?;
        let (label, addr) = line
            .split_once(':')
            .ok_or_else(|| format!("{}:{line_no}: malformed entry", path.display()))
            .map_err(|e| tracing::error!("failed to parse SYM file: {e}"))?;
        let addr = u16::from_str_radix(addr.trim(), 16).map_err(|e| {
            tracing::error!("failed to parse SYM file: {}:{line_no}: {e}", path.display())
        })?;
        symbols.entry(addr).or_default().push(label.to_string());
    }
    Ok(symbols)
}

fn parse_addr(symbols: &HashMap<u16, Vec<String>>, arg: &str) -> Result<u16, ParseIntError> {
    match parse_hex(arg) {
        Ok(addr) => Ok(addr),
        Err(e) => symbols
            .iter()
            .find(|(_, labels)| labels.iter().any(|label| label == arg))
            .map(|(addr, _)| *addr)
            .ok_or(e),
    }
}

fn addr_or_pc(
    cpu: &Cpu,
    symbols: &HashMap<u16, Vec<String>>,
    arg: Option<&str>,
) -> Result<u16, ParseIntError> {
    arg.map_or(Ok(cpu.pc()), |arg| parse_addr(symbols, arg))
}

fn examine<B: Bus>(
    bus: &mut B,
    cpu: &Cpu,
    symbols: &HashMap<u16, Vec<String>>,
    start: Option<&str>,
) {
    let start = match addr_or_pc(cpu, symbols, start) {
        Ok(addr) => addr,
        Err(e) => {
            println!("error parsing start address: {e}");
            return;
        }
    };
    let bytes = (0..16)
        .map(|i| bus.peek(start.wrapping_add(i)))
        .collect::<Vec<u8>>();
    print!("{}{start:04X}{}  ", Fg(LightYellow), Fg(Reset));
    for byte in &bytes {
        print!("{byte:02X} ");
    }
    print!(" |");
    for &c in &bytes {
        if c.is_ascii_graphic() {
            print!("{}", c as char);
        } else {
            print!(".");
        }
    }
    println!("|");
}

fn add_breakpoint(
    cpu: &Cpu,
    breakpoints: &mut Vec<u16>,
    symbols: &HashMap<u16, Vec<String>>,
    arg: Option<&str>,
) {
    let addr = match addr_or_pc(cpu, symbols, arg) {
        Ok(addr) => addr,
        Err(e) => {
            println!("error parsing address: {e}");
            return;
        }
    };
    if breakpoints.contains(&addr) {
        println!("breakpoint already exists");
    } else {
        breakpoints.push(addr);
        println!("breakpoint added at {addr:04X}");
    }
}

fn remove_breakpoint(
    cpu: &Cpu,
    breakpoints: &mut Vec<u16>,
    symbols: &HashMap<u16, Vec<String>>,
    arg: Option<&str>,
) {
    let addr = match addr_or_pc(cpu, symbols, arg) {
        Ok(addr) => addr,
        Err(e) => {
            println!("error parsing address: {e}");
            return;
        }
    };
    if let Some(index) = breakpoints.iter().position(|&a| a == addr) {
        breakpoints.remove(index);
        println!("breakpoint removed at {addr:04X}");
    } else {
        println!("breakpoint does not exist");
    }
}

fn print_help() {
    println!("debugger commands:");
    println!("`c`: continue emulator (exiting debugger)");
    println!("`q`: quit emulator");
    println!("`s` or `n`: single step cpu");
    println!("`r`: print cpu registers");
    println!("`b [addr]`: add breakpoint");
    println!("`B [addr]`: delete breakpoint");
    println!("`x [start]`: examine memory");
    println!("`d [start]`: disassemble memory");
    println!("`?`: show this help info");
}

fn print_cpu_regs(cpu: &Cpu) {
    print!(
        "A={:02X} X={:02X} Y={:02X} PC={:04X} S={:02X} ",
        cpu.a(),
        cpu.x(),
        cpu.y(),
        cpu.pc(),
        cpu.s()
    );
    let p = cpu.p();
    print!("P={:02X} [", p);
    #[rustfmt::skip]
    {
        print!("{}", if (p & Flags::NEGATIVE) == 0 { "-" } else { "N" });
        print!("{}", if (p & Flags::OVERFLOW) == 0 { "-" } else { "V" });
        print!("{}", if (p & Flags::UNUSED) == 0 { "-" } else { "U" });
        print!("{}", if (p & Flags::BREAK) == 0 { "-" } else { "B" });
        print!("{}", if (p & Flags::DECIMAL_MODE) == 0 { "-" } else { "D" });
        print!("{}", if (p & Flags::INTERRUPT_DISABLE) == 0 { "-" } else { "I" });
        print!("{}", if (p & Flags::ZERO) == 0 { "-" } else { "Z" });
        print!("{}", if (p & Flags::CARRY) == 0 { "-" } else { "C" });
    };
    println!("] cycles={}", cpu.cycle_count());
}

fn disassemble<B: Bus>(
    bus: &mut B,
    cpu: &Cpu,
    symbols: &HashMap<u16, Vec<String>>,
    start: Option<&str>,
    count: usize,
) {
    let mut addr = match addr_or_pc(cpu, symbols, start) {
        Ok(addr) => addr,
        Err(e) => {
            println!("error parsing start address: {e}");
            return;
        }
    };
    for _ in 0..count {
        if let Some(labels) = symbols.get(&addr) {
            println!("{};  {}:{}  ", Fg(LightBlue), labels[0], Fg(Reset));
        }
        let (text, next) = cpu::disassemble(bus, addr);
        print!("{}{addr:04X} {}", Fg(LightYellow), Fg(Reset));
        let size = next.wrapping_sub(addr);
        for i in 0..3 {
            if i < size {
                print!(" {:02X}", bus.peek(addr.wrapping_add(i)));
            } else {
                print!("   ");
            }
        }
        let (name, operand) = text.split_once(' ').unwrap_or((text.as_str(), ""));
        print!(
            "   {}{name} {}{operand:<12}{}",
            Fg(LightMagenta),
            Fg(LightRed),
            Fg(Reset)
        );
        if let Some(labels) = operand_target(operand).and_then(|target| symbols.get(&target)) {
            print!("  {}; {}{}", Fg(LightBlue), labels[0], Fg(Reset));
        }
        println!();
        addr = next;
    }
}

// absolute and branch operands name a 16-bit address
fn operand_target(operand: &str) -> Option<u16> {
    let digits = operand
        .trim_start_matches('(')
        .strip_prefix('$')?
        .split(|c: char| !c.is_ascii_hexdigit())
        .next()?;
    if digits.len() != 4 {
        return None;
    }
    u16::from_str_radix(digits, 16).ok()
}
