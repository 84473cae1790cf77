//! Core emulation of the Litton 1600, a 1960s serial drum-memory computer
//! with 40-bit words, 8/16-bit variable-length instructions and an
//! operator front panel.
//!
//! The crate provides the cycle-accurate instruction engine with its
//! drum-timing model, the device and parity I/O fabric, the EBS/1231
//! character set codec, the front-panel state machine, drum image loading
//! and saving, and a wall-clock paced run loop.  Presentation layers (a
//! windowed front panel, assembler tooling) sit on top of this crate's
//! control and status surface.

pub mod charset;
pub mod cpu;
pub mod devices;
pub mod drum;
pub mod image;
pub mod instruction;
pub mod panel;
pub mod runner;
pub mod word;

pub use cpu::{Machine, StepOutcome};
pub use panel::{Button, Selector, StatusLights};

/// Result type used by the fallible parts of the emulator.
pub type EmuResult<T> = Result<T, String>;
