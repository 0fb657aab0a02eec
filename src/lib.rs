// ABOUTME: Library root for harbor - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod context;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod hooks;
pub mod output;
pub mod runtime;
pub mod selector;
pub mod service;
pub mod types;
