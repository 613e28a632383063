//! Remote query gateway: trait, HTTP client, and mock
//!
//! Architecture follows the project pattern (trait + impl + mock):
//! - `QueryGateway` trait: every remote operation the orchestrator consumes
//! - `HttpGateway`: reqwest client against the analytics service
//! - `MockGateway`: scripted in-memory gateway for tests

pub mod client;
pub mod mock;
pub mod models;
pub mod traits;

pub use client::HttpGateway;
pub use mock::MockGateway;
pub use models::*;
pub use traits::QueryGateway;
