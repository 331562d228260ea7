//! MOR Explorer Gateway Library
//!
//! This library exposes the core modules for use in the server binary, benchmarks and tests.

pub mod api;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
