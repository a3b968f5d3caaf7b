//! groupvault - multi-user file storage with group quotas.
//!
//! Users upload files into groups they belong to. Uploads pass an extension
//! denylist (applied recursively inside ZIP archives), a per-file size
//! limit, and a storage quota resolved from the user, the group, and a
//! global default. Administrators manage users, groups, settings, and file
//! approval through the REST API in [`web`].

pub mod auth;
pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod file;
pub mod logging;
pub mod settings;
pub mod web;

pub use auth::{hash_password, verify_password, PasswordError};
pub use config::Config;
pub use db::{Database, NewUser, Role, User, UserRepository};
pub use error::{Result, VaultError};
pub use web::{AppState, WebServer};
