//! Filter plugins invoked around job execution.
//!
//! ## Contents
//! - [`Filter`] — the opaque plugin object, polymorphic over optional
//!   hook capabilities (before/after and exception, sync and async)
//! - capability traits: [`PerformFilter`], [`AsyncPerformFilter`],
//!   [`ExceptionFilter`], [`AsyncExceptionFilter`]
//! - [`FilterProvider`], [`StaticFilterProvider`] — ordered filter lists
//!   per job descriptor
//! - `Cursor` / `Hook` (crate-internal) — the bidirectional traversal used
//!   by the pipeline state machines

mod cursor;
mod filter;
mod provider;

pub(crate) use cursor::{Cursor, ExceptionHook, Hook, PerformHook};
pub use filter::{
    AsyncExceptionFilter, AsyncPerformFilter, ExceptionFilter, Filter, FilterRef, PerformFilter,
};
pub use provider::{FilterProvider, StaticFilterProvider};
