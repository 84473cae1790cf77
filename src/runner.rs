//! Real-time pacing of the instruction engine.
//!
//! The machine lives behind a single mutex which is held for exactly one
//! step at a time, so an operator UI on another thread can read lamps,
//! press buttons and load or save drum images between steps.  Pacing
//! aligns the cycle counter (one microsecond per cycle) with the wall
//! clock against a checkpoint; if the deadline has already passed the
//! checkpoint is resynchronized to the present rather than accumulating
//! lag.  A non-zero acceleration counter skips pacing entirely so queued
//! paste input drains at full speed.

use crate::cpu::{Machine, StepOutcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// A machine shared between the engine loop and an operator UI.
pub type SharedMachine = Arc<Mutex<Machine>>;

/// Wall-clock checkpoint used to slow emulation down to the original
/// machine speed.
pub struct Pacer {
    checkpoint_cycles: u64,
    checkpoint_time: Instant,
}

impl Pacer {
    pub fn new(cycles: u64) -> Pacer {
        Pacer { checkpoint_cycles: cycles, checkpoint_time: Instant::now() }
    }

    /// How long to sleep so that the wall clock catches up with
    /// `cycles`, or `None` when the deadline has already passed (or
    /// `accelerate` is set), in which case the checkpoint snaps to now.
    pub fn pace(&mut self, cycles: u64, accelerate: bool) -> Option<Duration> {
        let target =
            self.checkpoint_time + Duration::from_micros(cycles - self.checkpoint_cycles);
        let now = Instant::now();
        if accelerate || now >= target {
            self.checkpoint_cycles = cycles;
            self.checkpoint_time = now;
            None
        } else {
            Some(target - now)
        }
    }
}

/// Runs the machine until it stops: a halt, an illegal instruction, a
/// spinning program, an operator halt from another thread, or the quit
/// flag.  With `fast` set the real-time pacing is skipped.
pub fn run_until_halt(shared: &SharedMachine, quit: &AtomicBool, fast: bool) -> StepOutcome {
    let mut pacer = {
        let machine = shared.lock().unwrap();
        Pacer::new(machine.cycle_counter())
    };
    loop {
        if quit.load(Ordering::Relaxed) {
            return StepOutcome::Halt;
        }
        let (outcome, cycles, accelerate) = {
            let mut machine = shared.lock().unwrap();
            if machine.is_halted() {
                // Halted from the panel; stale keystrokes do not carry
                // over into the next run.
                machine.devices_mut().discard_pending_input();
                return StepOutcome::Halt;
            }
            let outcome = machine.step();
            machine.update_status_lights();
            (outcome, machine.cycle_counter(), machine.acceleration_counter != 0)
        };
        if outcome != StepOutcome::Ok {
            return outcome;
        }
        if !fast {
            if let Some(delay) = pacer.pace(cycles, accelerate) {
                thread::sleep(delay);
            }
        }
    }
}
