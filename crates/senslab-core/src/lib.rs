//! Core types and operations for Senslab sensory-evaluation sessions.
//!
//! This crate is free of HTTP and database dependencies. Storage backends
//! implement [`gateway::DocumentStore`]; everything else is built on
//! [`repository::Repository`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod aggregate;
pub mod catalog;
pub mod error;
pub mod export;
pub mod gateway;
pub mod ids;
pub mod invite;
pub mod repository;
pub mod response;
pub mod sample;
pub mod session;
pub mod submission;
pub mod timestamp;
pub mod triangle;

pub use error::{Error, Result};
pub use repository::Repository;

#[cfg(test)]
mod tests;
