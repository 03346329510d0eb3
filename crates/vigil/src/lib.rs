//! Uptime monitoring engine.
//!
//! Targets are probed on independent fixed-rate schedules (HTTP, TCP or
//! ping), their last status is kept for polling readers, and state changes
//! are turned into rate-limited alerts delivered in-app or by email.

pub mod alert;
pub mod duration;
pub mod engine;
pub mod error;
pub mod gate;
pub mod probe;
pub mod registry;
pub mod scheduler;
pub mod settings;
pub mod status;
pub mod store;
pub mod target;
pub mod validation;

pub use alert::{Alert, AlertChannel, AlertDispatcher};
pub use engine::{Engine, EngineBuilder, EngineOptions};
pub use error::{DispatchError, Result, SmtpError, VigilError};
pub use probe::{Probe, ProbeExecutor, ProbeOutcome};
pub use settings::{NotificationMode, Settings, SmtpConfig, SmtpProvider, Theme};
pub use status::{Status, TargetWithStatus};
pub use store::{JsonFileStore, MemoryStore, Store};
pub use target::{ProbeType, Target, TargetConfig, TargetId};
