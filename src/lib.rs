pub mod core;
pub mod error;
pub mod hosts;
pub mod models;
pub mod node;
pub mod notify;
pub mod prune;
pub mod settings;
pub mod subscription;
pub mod utils;
#[cfg(feature = "web-api")]
pub mod web;
pub mod xray;

// Re-export the types most callers reach for
pub use models::{InboundHost, Protocol, User, UserStatus};
pub use settings::Settings;
pub use subscription::SubscriptionFormat;
pub use xray::XrayConfig;
