pub mod schema;

pub use schema::{ChannelEntry, ChannelMonitorConfig, Config, resolve_channels};
