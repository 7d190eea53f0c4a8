//! HTTP boundary to the remote modeling backend.
//!
//! `types` holds the wire schemas (validated on decode); `client` issues the
//! blocking calls. Nothing here touches UI state: results travel back to the
//! interactive thread through `crate::jobs`.

pub mod client;
pub mod types;

pub use client::BackendClient;
pub use types::{ApiError, Dataset, Task};
