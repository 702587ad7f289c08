//! mbinbridge Host - Runtime Host Boundary and Session State
//!
//! This crate handles:
//! - The [`RuntimeHost`] trait, the only surface through which the hosted
//!   object model is reached
//! - Opening a [`HostSession`]: loading the asset assembly and resolving the
//!   root template class and the file-IO entry point
//! - Reporting host exceptions with their full inner chain
//! - An in-memory [`mock::MockHost`] used by tests across the workspace
//!
//! # Architecture
//!
//! A session is created once via [`HostSession::open`] and passed explicitly
//! to everything that touches host objects. There is no global runtime
//! state, so independent sessions (one mock per test, say) coexist freely.
//!
//! # Thread Safety
//!
//! Host calls are synchronous and single-threaded. The class cache is a
//! `DashMap` only so that sessions can be shared behind `&` without a lock.

pub mod error;
pub mod hash;
pub mod mock;
pub mod runtime;
pub mod session;

pub use error::HostError;
pub use runtime::RuntimeHost;
pub use session::{HostSession, SessionLayout};
