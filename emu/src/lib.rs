//! NMOS 6502 core with a frame-budgeted execution loop.
//!
//! * [`bus`] the memory interface and host hooks
//! * [`cpu`] registers, addressing, arithmetic and instruction dispatch
//! * [`mem`] a flat 64KB RAM
//! * [`sys`] the execution loop, pacing and run-mode control

pub mod bus;
pub mod cpu;
pub mod mem;
pub mod sys;
