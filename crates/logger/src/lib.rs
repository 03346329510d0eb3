//! Tracing subscriber setup shared by the binaries.

mod subscriber;

pub use subscriber::{LogFormat, init, init_with};
