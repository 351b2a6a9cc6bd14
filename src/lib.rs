//! aerodb-access - Access composition for AeroDB
//!
//! Turns declarative permission grants into storage-agnostic query
//! constraints and coalesces per-request lookups.
//!
//! - [`fields`]: field visibility sets
//! - [`filter`]: query filter trees and their algebra
//! - [`access`]: access values, permissions and authorization
//! - [`batch`]: storage interface and the request-scoped batching cache

pub mod access;
pub mod batch;
pub mod cli;
pub mod config;
pub mod fields;
pub mod filter;
mod json;
pub mod observability;
