//! Tick runner — fixed-interval control loop around the controller.
//!
//! The loop drains queued events, runs one controller tick with a
//! monotonic millisecond timestamp, then sleeps out the remainder of
//! the interval. Overruns are counted and logged, never fatal: a late
//! tick is worth more than a dead loop.
//!
//! With the `rt` feature the hosting binary can additionally lock
//! memory, pin the loop to a core and request FIFO scheduling before
//! entering the loop.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

use shade_common::command::ShadeCommand;
use shade_common::params::Params;
use tracing::{info, warn};

use crate::controller::MotionController;

/// Default control interval.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Events fed into the loop between ticks.
///
/// Transport adapters and the parameter store push these from their
/// own threads; the loop applies them in arrival order before the
/// next tick so a tick never observes a half-applied update.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// External command (decoded at the transport edge).
    Command(ShadeCommand),
    /// Whole-snapshot parameter replacement.
    Params(Params),
    /// Physical limit switch fired.
    EndStop,
    /// Transport session established.
    Online,
    /// Transport session lost.
    Offline,
    /// Identify request.
    Ping,
}

/// Loop timing counters, O(1) per tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickStats {
    /// Ticks executed.
    pub ticks: u64,
    /// Ticks whose work exceeded the interval.
    pub overruns: u64,
    /// Best observed tick execution time.
    pub best_tick: Duration,
    /// Worst observed tick execution time.
    pub worst_tick: Duration,
    /// Total execution time across all ticks.
    pub total: Duration,
}

impl TickStats {
    fn record(&mut self, elapsed: Duration, interval: Duration) {
        if self.ticks == 0 || elapsed < self.best_tick {
            self.best_tick = elapsed;
        }
        self.ticks += 1;
        self.total += elapsed;
        if elapsed > self.worst_tick {
            self.worst_tick = elapsed;
        }
        if elapsed > interval {
            self.overruns += 1;
            warn!(?elapsed, ?interval, "tick overrun");
        }
    }

    /// Mean tick execution time.
    pub fn avg_tick(&self) -> Duration {
        if self.ticks == 0 {
            Duration::ZERO
        } else {
            self.total / self.ticks as u32
        }
    }
}

/// Fixed-interval driver for a [`MotionController`].
pub struct TickRunner {
    controller: MotionController,
    events: Receiver<Event>,
    interval: Duration,
    epoch: Instant,
    stats: TickStats,
}

impl TickRunner {
    pub fn new(controller: MotionController, events: Receiver<Event>, interval: Duration) -> Self {
        Self {
            controller,
            events,
            interval,
            epoch: Instant::now(),
            stats: TickStats::default(),
        }
    }

    pub fn stats(&self) -> TickStats {
        self.stats
    }

    pub fn controller(&self) -> &MotionController {
        &self.controller
    }

    /// Drain queued events and run one tick at the given timestamp.
    ///
    /// Exposed for tests and benches that drive time explicitly.
    pub fn step(&mut self, now_ms: u64) {
        loop {
            match self.events.try_recv() {
                Ok(event) => self.dispatch(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        self.controller.tick(now_ms);
    }

    /// Run until `shutdown` is raised.
    pub fn run(&mut self, shutdown: &Arc<AtomicBool>) {
        info!(interval = ?self.interval, "control loop started");
        while !shutdown.load(Ordering::Relaxed) {
            self.run_one();
        }
        self.finish();
    }

    /// Run at most `ticks` ticks, or until `shutdown` is raised.
    pub fn run_for(&mut self, ticks: u64, shutdown: &Arc<AtomicBool>) {
        info!(interval = ?self.interval, ticks, "control loop started (bounded)");
        for _ in 0..ticks {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            self.run_one();
        }
        self.finish();
    }

    fn run_one(&mut self) {
        let started = Instant::now();
        let now_ms = self.epoch.elapsed().as_millis() as u64;
        self.step(now_ms);
        let elapsed = started.elapsed();
        self.stats.record(elapsed, self.interval);
        if let Some(remaining) = self.interval.checked_sub(elapsed) {
            std::thread::sleep(remaining);
        }
    }

    fn dispatch(&mut self, event: Event) {
        match event {
            Event::Command(command) => self.controller.handle_command(command),
            Event::Params(params) => self.controller.update_params(params),
            Event::EndStop => self.controller.on_end_stop(),
            Event::Online => self.controller.on_online(),
            Event::Offline => self.controller.on_offline(),
            Event::Ping => self.controller.on_ping(),
        }
    }

    fn finish(&mut self) {
        self.controller.on_offline();
        info!(
            ticks = self.stats.ticks,
            overruns = self.stats.overruns,
            best_tick = ?self.stats.best_tick,
            avg_tick = ?self.stats.avg_tick(),
            worst_tick = ?self.stats.worst_tick,
            "control loop stopped"
        );
    }
}

// ─── Real-Time Setup ────────────────────────────────────────────────

/// Real-time setup failure. Each variant names the syscall that failed.
#[derive(Debug)]
pub enum RtError {
    MemoryLock(String),
    CpuAffinity(String),
    Scheduler(String),
}

impl fmt::Display for RtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MemoryLock(e) => write!(f, "mlockall failed: {e}"),
            Self::CpuAffinity(e) => write!(f, "sched_setaffinity failed: {e}"),
            Self::Scheduler(e) => write!(f, "sched_setscheduler failed: {e}"),
        }
    }
}

impl std::error::Error for RtError {}

/// Touch a stack region so the locked pages are resident before the
/// loop starts.
#[cfg(feature = "rt")]
fn prefault_stack() {
    const STACK_PREFAULT: usize = 64 * 1024;
    let mut buf = [0u8; STACK_PREFAULT];
    for i in (0..STACK_PREFAULT).step_by(4096) {
        unsafe { std::ptr::write_volatile(buf.as_mut_ptr().add(i), 0) };
    }
}

/// Lock memory, optionally pin to a core and request FIFO scheduling.
#[cfg(feature = "rt")]
pub fn rt_setup(cpu_core: Option<usize>, priority: Option<i32>) -> Result<(), RtError> {
    use nix::sched::{CpuSet, sched_setaffinity};
    use nix::sys::mman::{MlockAllFlags, mlockall};
    use nix::unistd::Pid;

    mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE)
        .map_err(|e| RtError::MemoryLock(e.to_string()))?;
    prefault_stack();

    if let Some(core) = cpu_core {
        let mut set = CpuSet::new();
        set.set(core)
            .map_err(|e| RtError::CpuAffinity(e.to_string()))?;
        sched_setaffinity(Pid::from_raw(0), &set)
            .map_err(|e| RtError::CpuAffinity(e.to_string()))?;
        info!(core, "pinned control loop");
    }

    if let Some(prio) = priority {
        let param = libc::sched_param {
            sched_priority: prio,
        };
        let rc = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
        if rc != 0 {
            return Err(RtError::Scheduler(
                std::io::Error::last_os_error().to_string(),
            ));
        }
        info!(prio, "SCHED_FIFO enabled");
    }

    Ok(())
}

/// Without the `rt` feature the setup is a logged no-op so the binary
/// runs unprivileged in simulation.
#[cfg(not(feature = "rt"))]
pub fn rt_setup(cpu_core: Option<usize>, priority: Option<i32>) -> Result<(), RtError> {
    if cpu_core.is_some() || priority.is_some() {
        tracing::debug!(?cpu_core, ?priority, "rt feature disabled; ignoring rt options");
    }
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────
