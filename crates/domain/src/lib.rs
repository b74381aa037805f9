//! # Sunga Domain
//!
//! Domain types shared by every Sunga crate.
//!
//! This crate contains:
//! - The account model (`UserProfile`, `UserRole`, `NewAccount`)
//! - Domain error types and Result definitions
//! - Client configuration structures
//! - Storage identifiers and other constants
//!
//! ## Architecture
//! - No dependencies on other Sunga crates
//! - Only external dependencies allowed
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
