//! Backend implementations shipped with the client.

pub mod loopback;

pub use loopback::{LoopbackBackend, LoopbackConfig};
