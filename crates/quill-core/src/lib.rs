//! Core types and trait definitions for the Quill recording substrate.
//!
//! This crate has no database dependency. Storage
//! backends implement [`store::RecordingStore`]; outer layers depend on that
//! trait and on the capability registry in [`capability`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod access;
pub mod broadcast;
pub mod capability;
pub mod context;
pub mod error;
pub mod event;
pub mod recording;
pub mod store;
pub mod subject;

pub use error::{Error, Result};
