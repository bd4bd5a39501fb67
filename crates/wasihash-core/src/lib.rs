//! Coordination logic for wasihash.
//!
//! This crate defines the "ports" the infrastructure layer implements
//! ([`sandbox::SandboxDriver`]) together with the pieces that need no IO
//! beyond existence checks: the path virtualization resolver and the one-shot
//! settlement used to race the output watcher against the sandbox. It never
//! depends on `wasihash-infra`, Wasmtime or notify.

pub mod resolver;
pub mod sandbox;
pub mod settle;
