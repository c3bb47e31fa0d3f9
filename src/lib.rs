//! fluidics-os: a process-control runtime for laboratory fluidic systems.
//!
//! This crate is the core execution engine described in the project
//! specification: a multi-station phase-driven process runner, a
//! closed-loop control subsystem (PID and rule-based), a watchdog/alarm
//! framework, and a trailing-data cache shared by both.
//!
//! Device drivers, the operator-facing host, concrete protocol scripts,
//! and the physical-process simulator's chemistry are out of scope; this
//! crate defines the narrow interfaces they sit behind ([`devices`],
//! [`host`]) and drives them.

pub mod alarms;
pub mod clock;
pub mod config;
pub mod control;
pub mod csv_import;
pub mod data;
pub mod devices;
pub mod host;
pub mod process;
pub mod station;
pub mod types;

pub use clock::Clock;
pub use process::{Process, ProcessRunner};
