//! Repeat-Viewer Library
//!
//! Opens a video URL in a browser over and over, and after each interval
//! terminates exactly the browser processes that run started. Processes that
//! existed before the run, including the user's own incognito windows, are
//! never touched.

pub mod browser;
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod logging;
pub mod platform;
pub mod probe;
pub mod scheduler;
pub mod signal;
pub mod supervisor;
pub mod terminator;

// Re-export commonly used types for convenience
pub use crate::core::models::*;
pub use crate::core::ownership::{Ownership, OwnershipClassifier};
pub use crate::core::process_tree::ProcessSnapshot;
pub use error::{ConfigError, ErrorCategory, LaunchError, RepeaterError, RepeaterResult};
pub use events::{event_channel, EventSender, RunEvent, RunSummary, StopReason};
pub use scheduler::{RepeatScheduler, RunHandle};
pub use signal::CancellationToken;
pub use supervisor::{
    IterationOutcome, LaunchSupervisor, RunContext, SupervisorState, TerminationPolicy, VideoInfo,
    VideoInfoSource,
};
pub use terminator::{ProcessControl, ProcessTerminator, SystemProcessControl, TerminationReport};
