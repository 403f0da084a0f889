//! Daemon orchestration — spec.md §4.11. Builds the [`ResourceContainer`]
//! and drives the unified background-task loop in [`Daemon::run`].

mod approval;
mod context_tracker;
mod daemon;
mod preference_model;
mod resources;
mod secure_storage;

pub use approval::ApprovalGate;
pub use context_tracker::ContextTracker;
pub use daemon::{Collector, Daemon, NullCollector};
pub use preference_model::PreferenceModel;
pub use resources::ResourceContainer;
pub use secure_storage::SecureStorage;
