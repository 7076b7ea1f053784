//! Leaf primitives: password hashing, domain allow-lists and the OS random source.

pub mod domain;
pub mod password;
pub mod random;

pub use password::{PasswordError, PasswordHasher};
