//! External profile storage

pub mod profile;

// Re-exports for convenience
pub use profile::{PlanDuration, ProfileClient, ProfileError, ProfileStore, UserRecord};
