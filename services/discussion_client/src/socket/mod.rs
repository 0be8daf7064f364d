pub mod backoff;
pub mod listeners;
pub mod packet;
pub mod service;

// Re-export the service so the binary and callers can reach it directly.
pub use service::{DiscussionSocketService, ThreadMembership};
