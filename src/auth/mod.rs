//! Authentication module for groupvault.
//!
//! This module provides password hashing and the access policy.

mod password;
pub mod policy;

pub use password::{
    hash_password, hash_password_blocking, validate_password, verify_password,
    verify_password_blocking, PasswordError, MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH,
};
pub use policy::{Actor, FileAction, PolicyError};
