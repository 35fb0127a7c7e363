//! Application layer logic for tasklane.
//!
//! This crate orchestrates the pure decisions of `tasklane-core` over an
//! abstract task store: the maintenance scheduler, the reorder coordinator,
//! task and category mutations, and the shared confirmed task list.

pub mod config;
pub mod maintenance;
pub mod notify;
pub mod reorder;
pub mod service;
pub mod session;
pub mod store;
pub mod task_list;

// Re-exports for convenience
pub use config::AppConfig;
pub use maintenance::{
    MAX_INTERVAL, MaintenanceConfig, MaintenanceReport, MaintenanceScheduler, MaintenanceTrigger,
    SkipReason,
};
pub use notify::{Level, Notification, Notifier, RecordingNotifier, TracingNotifier};
pub use reorder::{ReorderCoordinator, ReorderError, ReorderOutcome};
pub use service::{ServiceError, TaskService};
pub use session::SessionProvider;
pub use store::TaskStore;
pub use task_list::{Snapshot, TaskList};
