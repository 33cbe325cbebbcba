//! # The resumable filter pipeline.
//!
//! [`JobPerformer`] wraps an inner [`Performer`] with two explicit state
//! machines driven by one loop each:
//!
//! ```text
//!  primary    Begin → PerformingNext → Performing ─→ CheckCancel ─┐
//!                        │ (none left)                            │
//!                        ▼                              canceled? │
//!                      Invoke ──→ PerformedNext ⇄ Performed       ▼
//!                        │            │ (none left)     CancelPrev ⇄ Cancel
//!                        ▼            ▼                     │ (none left)
//!                  (distinguished)   End ◀─────────────────┘
//!
//!  secondary  Begin → Next ⇄ Call → End   (exception filters, forward only)
//! ```
//!
//! ## Rules
//! - Before-hooks run strictly forward; after-hooks (and cancel rollback)
//!   strictly backward over the hooks that actually ran.
//! - A before-hook that cancels is itself excluded from the rollback.
//! - Distinguished conditions (`Aborted`, `ShutdownCanceled`) propagate
//!   immediately and are never shown to any filter.
//! - An unhandled exception from the body or any hook enters the secondary
//!   machine once, with its original cause; a filter marking it handled
//!   makes the whole attempt return `Ok(None)`.
//! - Cancellation checkpoints run at the start of every traversal state,
//!   never mid-hook.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::PerformError;
use crate::filters::{Cursor, ExceptionHook, FilterProvider, Hook, PerformHook};
use crate::perform::{
    ExceptionContext, PerformContext, PerformedContext, PerformingContext, Performer,
};

/// Performs jobs through the filter pipeline around an inner performer.
pub struct JobPerformer {
    provider: Arc<dyn FilterProvider>,
    inner: Arc<dyn Performer>,
}

impl JobPerformer {
    /// Creates a pipeline resolving filters from `provider` and delegating
    /// the invocation itself to `inner`.
    pub fn new(provider: Arc<dyn FilterProvider>, inner: Arc<dyn Performer>) -> Self {
        Self { provider, inner }
    }
}

#[async_trait]
impl Performer for JobPerformer {
    async fn perform(&self, context: &PerformContext) -> Result<Option<String>, PerformError> {
        let filters = self.provider.filters_for(context.job().descriptor());
        let mut cursor = Cursor::new(&filters);
        let performance = Performance {
            context,
            inner: self.inner.as_ref(),
        };

        let mut performed = match performance.job_filters(&mut cursor).await {
            Ok(performed) => performed,
            Err(err) if err.is_distinguished() => return Err(err),
            // A before/after hook failed; the secondary machine still sees it.
            Err(err) => return performance.exception_filters(&mut cursor, err).await,
        };

        match performed.take_exception() {
            Some(err) if !performed.is_exception_handled() => {
                performance.exception_filters(&mut cursor, err).await
            }
            _ => Ok(performed.into_result()),
        }
    }
}

/// Primary machine states. Traversal states own the in-flight
/// [`PerformedContext`] so it moves through the machine without sharing.
enum Step<'a> {
    Begin,
    PerformingNext,
    Performing(PerformHook<'a>),
    CheckCancel,
    CancelPrev(PerformedContext),
    Cancel(PerformHook<'a>, PerformedContext),
    Invoke,
    PerformedNext(PerformedContext),
    Performed(PerformHook<'a>, PerformedContext),
    End(PerformedContext),
}

/// Secondary machine states.
enum ExceptionStep<'a> {
    Begin,
    Next,
    Call(ExceptionHook<'a>),
    End,
}

struct Performance<'a> {
    context: &'a PerformContext,
    inner: &'a dyn Performer,
}

impl<'a> Performance<'a> {
    /// Drives the primary machine to completion.
    ///
    /// Distinguished conditions and hook failures come back as `Err`; a
    /// failing job body is captured inside the returned context so the
    /// after-hooks still observe it.
    async fn job_filters(
        &self,
        cursor: &mut Cursor<'a>,
    ) -> Result<PerformedContext, PerformError> {
        let mut performing = PerformingContext::new(self.context);
        let mut step = Step::Begin;

        loop {
            step = match step {
                Step::Begin => {
                    cursor.reset();
                    Step::PerformingNext
                }

                Step::PerformingNext => {
                    self.context.cancellation().checkpoint().await?;
                    match cursor.next(PerformHook::perform) {
                        Some(hook) => Step::Performing(hook),
                        None => Step::Invoke,
                    }
                }

                Step::Performing(hook) => {
                    match hook {
                        Hook::Sync(name, filter) => {
                            debug!(filter = name, "enter 'on_performing'");
                            filter.on_performing(&mut performing)?;
                            debug!(filter = name, "leave 'on_performing'");
                        }
                        Hook::Async(name, filter) => {
                            debug!(filter = name, "enter 'on_performing'");
                            filter.on_performing(&mut performing).await?;
                            debug!(filter = name, "leave 'on_performing'");
                        }
                    }
                    Step::CheckCancel
                }

                Step::CheckCancel => {
                    if performing.is_canceled() {
                        // The canceling filter keeps the cursor one past
                        // itself, so the rollback starts at the filter
                        // before it.
                        Step::CancelPrev(PerformedContext::canceled(self.context.job().clone()))
                    } else {
                        Step::PerformingNext
                    }
                }

                Step::CancelPrev(performed) => {
                    self.context.cancellation().checkpoint().await?;
                    match cursor.prev(PerformHook::perform) {
                        Some(hook) => Step::Cancel(hook, performed),
                        None => Step::End(performed),
                    }
                }

                Step::Cancel(hook, mut performed) => {
                    self.call_performed(hook, &mut performed).await?;
                    Step::CancelPrev(performed)
                }

                Step::Invoke => {
                    let descriptor = self.context.job().descriptor();
                    debug!(job = %descriptor, "enter");
                    let performed = match self.inner.perform(self.context).await {
                        Ok(result) => {
                            PerformedContext::completed(self.context.job().clone(), result)
                        }
                        Err(err) if err.is_distinguished() => return Err(err),
                        Err(err) => PerformedContext::faulted(self.context.job().clone(), err),
                    };
                    debug!(job = %descriptor, "leave");

                    cursor.reset_to_end();
                    Step::PerformedNext(performed)
                }

                Step::PerformedNext(performed) => {
                    self.context.cancellation().checkpoint().await?;
                    match cursor.prev(PerformHook::perform) {
                        Some(hook) => Step::Performed(hook, performed),
                        None => Step::End(performed),
                    }
                }

                Step::Performed(hook, mut performed) => {
                    self.call_performed(hook, &mut performed).await?;
                    Step::PerformedNext(performed)
                }

                Step::End(performed) => return Ok(performed),
            };
        }
    }

    async fn call_performed(
        &self,
        hook: PerformHook<'a>,
        performed: &mut PerformedContext,
    ) -> Result<(), PerformError> {
        match hook {
            Hook::Sync(name, filter) => {
                debug!(filter = name, "enter 'on_performed'");
                filter.on_performed(performed)?;
                debug!(filter = name, "leave 'on_performed'");
            }
            Hook::Async(name, filter) => {
                debug!(filter = name, "enter 'on_performed'");
                filter.on_performed(performed).await?;
                debug!(filter = name, "leave 'on_performed'");
            }
        }
        Ok(())
    }

    /// Drives the secondary machine over `err`. `Ok(None)` when a filter
    /// marked it handled, the original error otherwise.
    async fn exception_filters(
        &self,
        cursor: &mut Cursor<'a>,
        err: PerformError,
    ) -> Result<Option<String>, PerformError> {
        let mut exception = ExceptionContext::new(self.context.job().clone(), err);
        let mut step = ExceptionStep::Begin;

        loop {
            step = match step {
                ExceptionStep::Begin => {
                    cursor.reset();
                    ExceptionStep::Next
                }

                ExceptionStep::Next => {
                    self.context.cancellation().checkpoint().await?;
                    match cursor.next(ExceptionHook::exception) {
                        Some(hook) => ExceptionStep::Call(hook),
                        None => ExceptionStep::End,
                    }
                }

                ExceptionStep::Call(hook) => {
                    match hook {
                        Hook::Sync(name, filter) => {
                            debug!(filter = name, "enter 'on_exception'");
                            filter.on_exception(&mut exception)?;
                            debug!(filter = name, "leave 'on_exception'");
                        }
                        Hook::Async(name, filter) => {
                            debug!(filter = name, "enter 'on_exception'");
                            filter.on_exception(&mut exception).await?;
                            debug!(filter = name, "leave 'on_exception'");
                        }
                    }
                    ExceptionStep::Next
                }

                ExceptionStep::End => {
                    if exception.is_exception_handled() {
                        return Ok(None);
                    }
                    return Err(exception.into_error());
                }
            };
        }
    }
}
