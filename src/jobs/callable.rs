//! # Job target callables.
//!
//! [`JobCallable`] is the contract for a job's target method: it declares
//! its parameters and performs the work. [`JobFn`] wraps a closure
//! `F: Fn(Vec<Argument>) -> Fut`, producing a fresh future per invocation,
//! so no shared mutable state is required between attempts.
//!
//! [`JobRegistry`] is a simple activator backed by a map from
//! `(type, method)` to callable. It stands in for a DI container: resolving
//! a callable through a registry scope is the engine's equivalent of
//! activating a target instance.
//!
//! ## Example
//! ```rust
//! use jobvisor::{Argument, CallError, JobCallable, JobFn, Parameter};
//!
//! let send = JobFn::arc(vec![Parameter::Recorded], |args: Vec<Argument>| async move {
//!     let to = args[0].as_recorded().unwrap_or_default().to_string();
//!     println!("sending to {to}");
//!     Ok::<_, CallError>(None)
//! });
//! assert_eq!(send.parameters().len(), 1);
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CallError;
use crate::jobs::descriptor::{Argument, JobDescriptor, Parameter};
use crate::perform::PerformContext;
use crate::storage::{Activator, ActivatorScope};

/// # The target callable of a job.
///
/// Declares its positional parameters and performs the work. Both
/// immediate and suspending implementations look the same to the invoker:
/// the returned future is awaited until it settles.
#[async_trait]
pub trait JobCallable: Send + Sync + 'static {
    /// Declared parameters, in order. The recorded argument count must
    /// match this length; well-known kinds are substituted from context.
    fn parameters(&self) -> Vec<Parameter>;

    /// Performs the job with the bound arguments.
    async fn call(&self, args: Vec<Argument>) -> Result<Option<String>, CallError>;
}

/// Function-backed job callable.
///
/// Wraps a closure that creates a new future per invocation.
pub struct JobFn<F> {
    parameters: Vec<Parameter>,
    f: F,
}

impl<F> JobFn<F> {
    /// Creates a new function-backed callable with the given parameter
    /// declaration.
    pub fn new(parameters: Vec<Parameter>, f: F) -> Self {
        Self { parameters, f }
    }

    /// Creates the callable and returns it as a shared handle.
    pub fn arc(parameters: Vec<Parameter>, f: F) -> Arc<Self> {
        Arc::new(Self::new(parameters, f))
    }
}

#[async_trait]
impl<F, Fut> JobCallable for JobFn<F>
where
    F: Fn(Vec<Argument>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<String>, CallError>> + Send + 'static,
{
    fn parameters(&self) -> Vec<Parameter> {
        self.parameters.clone()
    }

    async fn call(&self, args: Vec<Argument>) -> Result<Option<String>, CallError> {
        (self.f)(args).await
    }
}

/// # Registry of job callables, keyed by target type and method.
///
/// Implements [`Activator`]: each invocation opens a scope over the
/// registered callables. Unknown targets resolve to `None`, which the
/// invoker reports as an activation failure.
#[derive(Default)]
pub struct JobRegistry {
    targets: HashMap<(String, String), Arc<dyn JobCallable>>,
}

impl JobRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callable for the given target type and method.
    ///
    /// Re-registering the same target replaces the previous callable.
    pub fn register(
        &mut self,
        type_name: impl Into<String>,
        method: impl Into<String>,
        callable: Arc<dyn JobCallable>,
    ) {
        self.targets
            .insert((type_name.into(), method.into()), callable);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(
        mut self,
        type_name: impl Into<String>,
        method: impl Into<String>,
        callable: Arc<dyn JobCallable>,
    ) -> Self {
        self.register(type_name, method, callable);
        self
    }
}

impl Activator for JobRegistry {
    fn begin_scope(&self, _context: &PerformContext) -> Box<dyn ActivatorScope> {
        Box::new(RegistryScope {
            targets: self.targets.clone(),
        })
    }
}

struct RegistryScope {
    targets: HashMap<(String, String), Arc<dyn JobCallable>>,
}

impl ActivatorScope for RegistryScope {
    fn resolve(&self, descriptor: &JobDescriptor) -> Option<Arc<dyn JobCallable>> {
        self.targets
            .get(&(
                descriptor.type_name().to_string(),
                descriptor.method().to_string(),
            ))
            .cloned()
    }
}
