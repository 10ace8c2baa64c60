//! porthole-core: discovery of services listening on the local
//! machine.
//!
//! The pipeline enumerates locally-bound TCP listeners (OS connection
//! table first, `lsof` fallback when that is denied), probes each port
//! for an HTTP(S) answer with certificate-trust classification, pulls
//! lightweight page metadata from whatever responds, and labels every
//! record for display.

pub mod discover;
pub mod enumerate;
pub mod error;
pub mod lsof;
pub mod meta;
pub mod probe;
pub mod resolve;
pub mod types;

pub use discover::ServiceDiscovery;
pub use error::{DiscoverError, Result};
pub use types::{DiscoveryResult, Protocol, ServiceRecord, WebService};
