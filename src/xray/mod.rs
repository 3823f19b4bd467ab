pub mod config;
pub mod inbound;

pub use config::{strip_json_comments, XrayConfig};
pub use inbound::{InboundDescriptor, FALLBACK_JOIN};
