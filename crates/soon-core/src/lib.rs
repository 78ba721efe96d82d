//! soonsite/crates/soon-core/src/lib.rs
//!
//! The central domain logic and interface definitions for SoonSite.

pub mod error;
pub mod lifecycle;
pub mod models;
pub mod notifier;
pub mod scheduler;
pub mod traits;

#[cfg(any(test, feature = "testing"))]
pub mod memory;

// Re-exporting for easier access in other crates
pub use error::*;
pub use lifecycle::ReleaseService;
pub use models::*;
pub use notifier::{Notifier, NotifierConfig, NotifyReport};
pub use scheduler::DailyScheduler;
pub use traits::*;
