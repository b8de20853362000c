// ABOUTME: Library root for hoist - streaming image pulls against container engines.
// ABOUTME: The CLI binary is in main.rs.

pub mod config;
pub mod engine;
pub mod error;
pub mod output;
pub mod pull;
pub mod types;
