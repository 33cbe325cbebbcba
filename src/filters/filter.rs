//! # Filter capabilities and the opaque filter object.
//!
//! A [`Filter`] is a plugin invoked around job execution. It may implement
//! any combination of six hook capabilities: before/after hooks in
//! synchronous ([`PerformFilter`]) or suspending ([`AsyncPerformFilter`])
//! form, and exception hooks ([`ExceptionFilter`], [`AsyncExceptionFilter`]).
//!
//! Capabilities are resolved once, through the accessor methods on
//! [`Filter`], not re-checked per traversal step. When a filter exposes
//! both the sync and async variant of the same hook pair, the async
//! variant wins and the sync one is ignored.
//!
//! Hooks return `Result<(), PerformError>`: a failing hook unwinds the
//! pipeline and becomes visible to exception filters (unless it is one of
//! the distinguished conditions, which bypass them).

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PerformError;
use crate::perform::{ExceptionContext, PerformedContext, PerformingContext};

/// Synchronous before/after hooks. Runs inline on the worker; must not block.
pub trait PerformFilter: Send + Sync + 'static {
    /// Called before the job is performed. May cancel the performance by
    /// calling [`PerformingContext::cancel`].
    fn on_performing(&self, ctx: &mut PerformingContext) -> Result<(), PerformError>;

    /// Called after the job is performed (or after a cancel-rollback).
    /// May mark an exception as handled.
    fn on_performed(&self, ctx: &mut PerformedContext) -> Result<(), PerformError>;
}

/// Suspending before/after hooks. The pipeline yields while a hook is
/// pending; no job-level work proceeds until it settles.
#[async_trait]
pub trait AsyncPerformFilter: Send + Sync + 'static {
    /// Called before the job is performed.
    async fn on_performing(&self, ctx: &mut PerformingContext) -> Result<(), PerformError>;

    /// Called after the job is performed (or after a cancel-rollback).
    async fn on_performed(&self, ctx: &mut PerformedContext) -> Result<(), PerformError>;
}

/// Synchronous exception hook, called when the job performance raised an
/// exception no after-hook handled.
pub trait ExceptionFilter: Send + Sync + 'static {
    /// Inspects (and may handle) the unhandled exception.
    fn on_exception(&self, ctx: &mut ExceptionContext) -> Result<(), PerformError>;
}

/// Suspending exception hook.
#[async_trait]
pub trait AsyncExceptionFilter: Send + Sync + 'static {
    /// Inspects (and may handle) the unhandled exception.
    async fn on_exception(&self, ctx: &mut ExceptionContext) -> Result<(), PerformError>;
}

/// # An opaque filter plugin.
///
/// Override the accessors for the capabilities the filter implements;
/// the defaults advertise nothing. A single filter may implement several
/// capabilities (typically by returning `Some(self)`).
///
/// ## Precedence
/// If both the sync and async variant of the same hook pair are exposed,
/// only the async variant is invoked.
///
/// ## Example
/// ```rust
/// use jobvisor::{Filter, PerformError, PerformFilter, PerformedContext, PerformingContext};
///
/// struct Mute;
///
/// impl PerformFilter for Mute {
///     fn on_performing(&self, ctx: &mut PerformingContext) -> Result<(), PerformError> {
///         ctx.cancel();
///         Ok(())
///     }
///     fn on_performed(&self, _ctx: &mut PerformedContext) -> Result<(), PerformError> {
///         Ok(())
///     }
/// }
///
/// impl Filter for Mute {
///     fn perform_sync(&self) -> Option<&dyn PerformFilter> {
///         Some(self)
///     }
/// }
/// ```
pub trait Filter: Send + Sync + 'static {
    /// Human-readable name for logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// The synchronous before/after capability, if implemented.
    fn perform_sync(&self) -> Option<&dyn PerformFilter> {
        None
    }

    /// The suspending before/after capability, if implemented.
    fn perform_async(&self) -> Option<&dyn AsyncPerformFilter> {
        None
    }

    /// The synchronous exception capability, if implemented.
    fn exception_sync(&self) -> Option<&dyn ExceptionFilter> {
        None
    }

    /// The suspending exception capability, if implemented.
    fn exception_async(&self) -> Option<&dyn AsyncExceptionFilter> {
        None
    }
}

/// Shared handle to a filter.
pub type FilterRef = Arc<dyn Filter>;
