pub mod backend;
pub mod body;
pub mod forwarder;
pub mod headers;

pub use backend::{BackendCandidates, BackendUrl};
pub use forwarder::{ForwardError, ForwardRequest, ForwardSettings, Forwarder};
