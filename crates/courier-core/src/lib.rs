//! Core types and rules for the courier console.
//!
//! Owns the two pieces of cross-cutting logic every screen depends on: the
//! authenticated session and the parcel status lifecycle. Transport lives in
//! `courier-client`; this crate only defines the backend traits it needs.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod backend;
pub mod credential;
pub mod error;
pub mod lifecycle;
pub mod parcel;
pub mod report;
pub mod role;
pub mod session;
pub mod workflow;

pub use error::{Error, Result};
