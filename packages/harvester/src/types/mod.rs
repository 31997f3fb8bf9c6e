//! Core data types for the harvest pipeline.

pub mod config;
pub mod job;
pub mod payload;
pub mod record;
pub mod target;
