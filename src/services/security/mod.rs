pub mod allowlist;
pub mod client_ip;
pub mod events;

pub use allowlist::{AllowListError, IpAllowList};
pub use events::{SecurityEvent, SecurityEventSink, SecurityEventType, TracingEventSink};
