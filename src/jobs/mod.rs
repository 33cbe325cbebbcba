//! Job data model: descriptors, instances, callables, and states.
//!
//! ## Contents
//! - [`JobDescriptor`], [`JobInstance`] — what a job is (target + arguments)
//! - [`Parameter`], [`Argument`] — declared parameters and bound arguments
//! - [`JobCallable`], [`JobFn`], [`JobRegistry`] — target callables
//! - [`JobState`] — named job states with associated data

mod callable;
mod descriptor;
mod state;

pub use callable::{JobCallable, JobFn, JobRegistry};
pub use descriptor::{Argument, JobDescriptor, JobInstance, Parameter};
pub use state::JobState;
