//! HTTP request handlers.

pub mod blobs;
pub mod common;
pub mod manifests;
pub mod tags;

pub use blobs::*;
pub use manifests::*;
pub use tags::*;
