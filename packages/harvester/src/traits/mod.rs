//! Core trait abstractions.
//!
//! Every external collaborator sits behind one of these seams so the
//! pipeline can be exercised end-to-end with the mocks in
//! [`crate::testing`].

pub mod browser;
pub mod extractor;
pub mod fetch;
pub mod ledger;
pub mod model;
pub mod render;
pub mod store;
