//! Shared domain types for wasihash.
//!
//! This crate contains the types passed between the resolver, the output
//! channel watcher and the sandbox driver: the mount table, the per-request
//! virtualization config, the hasher configuration, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, uuid, thiserror.

pub mod config;
pub mod error;
pub mod mount;
pub mod request;
