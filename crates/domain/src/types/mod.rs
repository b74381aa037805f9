//! Domain types

pub mod user;

pub use user::{AccountUpdate, NewAccount, UserProfile, UserRole};
