//! # The innermost performer: activation, binding, invocation.
//!
//! [`CoreInvoker`] performs a job without any filters involved:
//!
//! 1. open an activation scope and resolve the target callable
//! 2. bind the recorded arguments onto the declared parameters,
//!    substituting the well-known kinds from the context
//! 3. await the call and classify its error
//!
//! The scope is dropped on every exit path. Classification maps
//! [`CallError`] onto [`PerformError`]: `Aborted` stays distinguished,
//! `Canceled` becomes [`PerformError::ShutdownCanceled`] only when
//! shutdown is actually in progress (otherwise it is an ordinary
//! failure), and `Failed` surfaces its cause unwrapped.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{CallError, PerformError};
use crate::jobs::{Argument, Parameter};
use crate::perform::{PerformContext, Performer};
use crate::storage::Activator;

/// Performs the actual target invocation for a job.
pub struct CoreInvoker {
    activator: Arc<dyn Activator>,
}

impl CoreInvoker {
    /// Creates an invoker resolving targets through `activator`.
    pub fn new(activator: Arc<dyn Activator>) -> Self {
        Self { activator }
    }

    fn bind_arguments(
        parameters: &[Parameter],
        context: &PerformContext,
    ) -> Result<Vec<Argument>, PerformError> {
        let descriptor = context.job().descriptor();
        let recorded = descriptor.args();
        let expected = parameters
            .iter()
            .filter(|p| matches!(p, Parameter::Recorded))
            .count();
        if recorded.len() != expected {
            return Err(PerformError::perform(format!(
                "argument count mismatch for '{descriptor}': {expected} recorded parameters, {} recorded arguments",
                recorded.len()
            )));
        }

        let mut next_recorded = recorded.iter();
        let args = parameters
            .iter()
            .map(|parameter| match parameter {
                Parameter::Recorded => {
                    // Length checked above, one recorded value per slot.
                    let value = next_recorded.next().cloned().unwrap_or_default();
                    Argument::Recorded(value)
                }
                Parameter::Cancellation => Argument::Cancellation(context.cancellation().clone()),
                Parameter::Shutdown => {
                    Argument::Shutdown(context.cancellation().shutdown_token().clone())
                }
                Parameter::Context => Argument::Context(context.job().clone()),
            })
            .collect();
        Ok(args)
    }

    fn classify(err: CallError, context: &PerformContext) -> PerformError {
        match err {
            CallError::Aborted => PerformError::Aborted,
            CallError::Canceled => {
                if context.cancellation().is_shutdown_requested() {
                    PerformError::ShutdownCanceled
                } else {
                    PerformError::perform(CallError::Canceled)
                }
            }
            CallError::Failed { cause } => PerformError::Perform { cause },
        }
    }
}

#[async_trait]
impl Performer for CoreInvoker {
    async fn perform(&self, context: &PerformContext) -> Result<Option<String>, PerformError> {
        let descriptor = context.job().descriptor();
        let scope = self.activator.begin_scope(context);
        let callable = scope.resolve(descriptor).ok_or_else(|| {
            PerformError::perform(format!("activator returned no instance of '{descriptor}'"))
        })?;

        let args = Self::bind_arguments(&callable.parameters(), context)?;
        let outcome = callable.call(args).await;
        drop(scope);

        outcome.map_err(|err| Self::classify(err, context))
    }
}
