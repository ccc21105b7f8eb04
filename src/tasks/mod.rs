//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Cache cleanup: removes expired cache entries
//! - Rate limit sweep: removes ended rate-limit windows

mod cleanup;

pub use cleanup::{spawn_cleanup_task, spawn_rate_limit_sweep_task, BackgroundTasks};
