//! Sync layer: the hosted backend's table interface exposed as a `Storage`.

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{RemoteStore, SyncError};
