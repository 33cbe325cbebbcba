//! Job performance: contexts, the core invoker, and the filter pipeline.
//!
//! ## Contents
//! - [`Performer`] — the composable execution seam; the pipeline wraps an
//!   inner performer, the invoker is the innermost one
//! - [`PerformContext`], [`PerformingContext`], [`PerformedContext`],
//!   [`ExceptionContext`] — per-phase views handed to filters
//! - [`CancellationHandle`] — per-job cooperative cancellation (abort
//!   detection + shutdown signal)
//! - [`CoreInvoker`] — activation, argument binding, and invocation
//! - [`JobPerformer`] — the resumable filter pipeline around an inner
//!   performer

mod context;
mod invoker;
mod pipeline;

use async_trait::async_trait;

pub use context::{
    CancellationHandle, ExceptionContext, PerformContext, PerformedContext, PerformingContext,
};
pub use invoker::CoreInvoker;
pub use pipeline::JobPerformer;

use crate::error::PerformError;

/// # One layer of job execution.
///
/// Implementations compose: [`JobPerformer`] wraps an inner performer with
/// the filter pipeline, and [`CoreInvoker`] sits at the center performing
/// the actual call. `Ok` carries the job's optional result string.
#[async_trait]
pub trait Performer: Send + Sync + 'static {
    /// Performs the job described by `context` once.
    async fn perform(&self, context: &PerformContext) -> Result<Option<String>, PerformError>;
}
