//! Fetch-strategy implementations.
//!
//! Escalation order is fixed: remote render, then browser automation,
//! then document extraction. Each later strategy costs more than the
//! one before it.

pub mod browser;
pub mod document;
pub mod remote;

pub use browser::BrowserStrategy;
pub use document::DocumentStrategy;
pub use remote::RemoteRenderStrategy;
