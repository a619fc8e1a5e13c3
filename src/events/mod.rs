//! Events Module
//!
//! Lifecycle events emitted by the registries and the synchronous
//! dispatcher that delivers them to listeners.

pub mod dispatcher;
pub mod types;

pub use dispatcher::*;
pub use types::*;
