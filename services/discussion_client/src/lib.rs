pub mod adapters;
pub mod config;
pub mod error;
pub mod socket;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use socket::{DiscussionSocketService, ThreadMembership};
