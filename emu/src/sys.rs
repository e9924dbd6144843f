//! Execution Loop
//!
//! Runs the core in frame-sized cycle budgets. Every time the cycle count
//! reaches `cycles_per_frame` the count is reset, the loop optionally sleeps
//! to hold real-time pacing, then calls the host's render hook followed by
//! its interrupt hook.
//!
//! Run modes:
//!
//! Stopped       loop exits at the next instruction boundary
//! Paused        nothing executes; frames still render at the standard pace
//! Standard      paced at 50 frames per second
//! Fast          paced at 4x standard
//! Unrestricted  no pacing at all
use std::{
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use crate::{
    bus::Host,
    cpu::{disassemble, Cpu, Step},
};

pub const STANDARD_FPS: u32 = 50;

pub const FAST_MULTIPLIER: u32 = 4;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Stopped = 0,
    Paused = 1,
    Standard = 2,
    Fast = 3,
    Unrestricted = 4,
}

impl RunMode {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Paused,
            2 => Self::Standard,
            3 => Self::Fast,
            4 => Self::Unrestricted,
            _ => Self::Stopped,
        }
    }

    /// Wall-clock length of one frame, or `None` when the mode is not paced.
    pub fn frame_interval(self) -> Option<Duration> {
        match self {
            Self::Standard | Self::Paused => Some(Duration::from_secs(1) / STANDARD_FPS),
            Self::Fast => Some(Duration::from_secs(1) / (STANDARD_FPS * FAST_MULTIPLIER)),
            Self::Stopped | Self::Unrestricted => None,
        }
    }

    pub fn is_running(self) -> bool {
        matches!(self, Self::Standard | Self::Fast | Self::Unrestricted)
    }
}

/// Shared handle to a system's run mode.
///
/// Clones refer to the same state, so a UI thread or signal handler can
/// steer a loop running elsewhere. Changes are observed between instructions.
#[derive(Debug, Clone)]
pub struct Control(Arc<AtomicU8>);

impl Control {
    pub fn new(mode: RunMode) -> Self {
        Self(Arc::new(AtomicU8::new(mode as u8)))
    }

    pub fn mode(&self) -> RunMode {
        RunMode::from_u8(self.0.load(Ordering::Relaxed))
    }

    pub fn set_mode(&self, mode: RunMode) {
        let prev = RunMode::from_u8(self.0.swap(mode as u8, Ordering::Relaxed));
        if prev != mode {
            tracing::debug!("run mode {prev:?} -> {mode:?}");
        }
    }

    pub fn pause(&self) {
        self.set_mode(RunMode::Paused);
    }

    pub fn resume(&self) {
        self.set_mode(RunMode::Standard);
    }

    pub fn fast(&self) {
        self.set_mode(RunMode::Fast);
    }

    pub fn unrestricted(&self) {
        self.set_mode(RunMode::Unrestricted);
    }

    pub fn stop(&self) {
        self.set_mode(RunMode::Stopped);
    }
}

pub struct System<H> {
    cpu: Cpu,
    host: H,
    control: Control,
    trace: bool,
    frame: u64,
    frame_started: Instant,
}

impl<H: Host> System<H> {
    pub fn new(host: H) -> Self {
        Self {
            cpu: Cpu::new(),
            host,
            control: Control::new(RunMode::Standard),
            trace: false,
            frame: 0,
            frame_started: Instant::now(),
        }
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn view(&mut self) -> (&'_ mut Cpu, &'_ mut H) {
        (&mut self.cpu, &mut self.host)
    }

    pub fn control(&self) -> Control {
        self.control.clone()
    }

    pub fn mode(&self) -> RunMode {
        self.control.mode()
    }

    /// Frames completed since construction or the last reset.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn set_processor_speed(&mut self, mhz: f64) {
        self.cpu.set_processor_speed(mhz);
        tracing::debug!(
            "processor speed {mhz}MHz, {} cycles per frame",
            self.cpu.cycles_per_frame()
        );
    }

    pub fn set_trace(&mut self, enabled: bool) {
        self.trace = enabled;
    }

    /// Reset the CPU and clear memory. PC is left where it was.
    pub fn reset(&mut self) {
        self.cpu.reset(&mut self.host);
        self.frame = 0;
        self.frame_started = Instant::now();
    }

    /// Execute one instruction plus any frame-boundary work it triggers.
    ///
    /// Runs regardless of the current mode; mode only gates [`System::run`]
    /// and [`System::steps`].
    pub fn step(&mut self) -> Step {
        let System {
            cpu, host, trace, ..
        } = self;
        if *trace {
            let (text, _) = disassemble(host, cpu.pc());
            host.trace(cpu.pc(), &text);
        }
        let step = cpu.step(host);
        if !step.known {
            host.unknown_opcode(step.pc, step.opcode);
        }
        if self.cpu.cycle_count() >= self.cpu.cycles_per_frame() {
            self.end_frame();
        }
        step
    }

    fn end_frame(&mut self) {
        self.cpu.reset_cycle_count();
        self.present_frame();
    }

    /// Pace, render and run the interrupt hook for one frame without
    /// executing any instructions. This is what a paused loop does.
    pub fn idle_frame(&mut self) {
        self.present_frame();
    }

    fn present_frame(&mut self) {
        if let Some(interval) = self.control.mode().frame_interval() {
            let elapsed = self.frame_started.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            }
        }
        self.frame_started = Instant::now();
        self.frame += 1;
        self.host.render(self.frame);
        self.host.interrupt(&mut self.cpu);
    }

    /// Run until the current frame completes. Returns false if the mode
    /// left the running states first.
    pub fn run_frame(&mut self) -> bool {
        let frame = self.frame;
        while self.frame == frame {
            if !self.mode().is_running() {
                return false;
            }
            self.step();
        }
        true
    }

    /// Drive the loop until the mode becomes `Stopped`. While paused, frames
    /// keep rendering but the CPU does not advance.
    pub fn run(&mut self) {
        loop {
            match self.mode() {
                RunMode::Stopped => break,
                RunMode::Paused => self.idle_frame(),
                RunMode::Standard | RunMode::Fast | RunMode::Unrestricted => {
                    self.step();
                }
            }
        }
    }

    /// Cooperative driver yielding after every instruction. Ends as soon as
    /// the mode is paused or stopped.
    pub fn steps(&mut self) -> Steps<'_, H> {
        Steps { sys: self }
    }
}

pub struct Steps<'a, H> {
    sys: &'a mut System<H>,
}

impl<'a, H: Host> Iterator for Steps<'a, H> {
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        if !self.sys.mode().is_running() {
            return None;
        }
        Some(self.sys.step())
    }
}
