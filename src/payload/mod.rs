//! Request payloads
//!
//! Filter specifications, the endpoints they are sent to, and the codec that
//! turns a filter plus a pagination cursor into a request body.

mod codec;
mod endpoint;
mod filter;
mod implicit;

pub use codec::{encode, PAGINATION_KEY};
pub use endpoint::{Endpoint, Query};
pub use filter::{FilterField, FilterList, FilterSpec, FilterSpecBuilder};
pub use implicit::GEOGRAPHIC_FIELDS;
