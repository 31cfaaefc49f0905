//! Probe execution machinery: result recording, HTTP transport, worker pool
//! and the fault-isolating run loop.

pub mod pool;
pub mod recorder;
pub mod runner;
pub mod transport;
