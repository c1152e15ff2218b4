//! Replay driver for the combined-kernel cache: CLI parsing, a synthetic
//! kernel builder and a seeded frame workload.

pub mod cli;
pub mod replay;
