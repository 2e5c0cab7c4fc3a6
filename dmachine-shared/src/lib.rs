//! Types shared between the dmachine library and its front ends.

pub mod errors;

pub use errors::{MachineError, MachineResult};
