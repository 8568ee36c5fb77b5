//! Shared error type and collaborator contracts for the redislist workspace.
//!
//! This crate has no storage or list logic of its own. It exists so that
//! `redislist-storage`, `redislist-list`, and `redislist-limiter` can agree
//! on one error type and on the seams for the external collaborators the
//! list engine consumes (the versioning layer, table counters, expiration
//! cleanup, and metrics).

#![warn(missing_docs)]

pub mod contract;
pub mod error;

pub use contract::{
    CollectionHooks, ExpireVerdict, HeaderEnvelope, KeyInfo, NoopHooks, PlainVersioning, TypeTag,
    VersioningLayer,
};
pub use error::{Error, Result};
