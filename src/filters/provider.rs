//! # Filter resolution per job.
//!
//! A [`FilterProvider`] maps a [`JobDescriptor`] to the ordered filter
//! list the pipeline runs around it. [`StaticFilterProvider`] is the
//! common case: one fixed, globally ordered list for every job.

use crate::filters::filter::FilterRef;
use crate::jobs::JobDescriptor;

/// Resolves the ordered filter list for a given job.
///
/// The returned order is the registration order; the pipeline runs
/// before-hooks front to back and after-hooks back to front.
pub trait FilterProvider: Send + Sync + 'static {
    /// Returns the filters applicable to `descriptor`, in order.
    fn filters_for(&self, descriptor: &JobDescriptor) -> Vec<FilterRef>;
}

/// A provider that returns the same fixed filter list for every job.
pub struct StaticFilterProvider {
    filters: Vec<FilterRef>,
}

impl StaticFilterProvider {
    /// Creates a provider over a fixed, ordered list.
    pub fn new(filters: Vec<FilterRef>) -> Self {
        Self { filters }
    }

    /// Creates a provider that resolves no filters.
    pub fn empty() -> Self {
        Self { filters: Vec::new() }
    }
}

impl FilterProvider for StaticFilterProvider {
    fn filters_for(&self, _descriptor: &JobDescriptor) -> Vec<FilterRef> {
        self.filters.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use crate::error::PerformError;
    use crate::filters::filter::{Filter, PerformFilter};
    use crate::perform::{PerformedContext, PerformingContext};

    struct Noop;
    impl PerformFilter for Noop {
        fn on_performing(&self, _ctx: &mut PerformingContext) -> Result<(), PerformError> {
            Ok(())
        }
        fn on_performed(&self, _ctx: &mut PerformedContext) -> Result<(), PerformError> {
            Ok(())
        }
    }
    impl Filter for Noop {
        fn perform_sync(&self) -> Option<&dyn PerformFilter> {
            Some(self)
        }
    }

    #[test]
    fn test_static_provider_returns_registration_order() {
        let a: FilterRef = Arc::new(Noop);
        let b: FilterRef = Arc::new(Noop);
        let provider = StaticFilterProvider::new(vec![a.clone(), b.clone()]);

        let descriptor = JobDescriptor::new("App.Mailer", "send", Vec::new());
        let resolved = provider.filters_for(&descriptor);

        assert_eq!(resolved.len(), 2);
        assert!(Arc::ptr_eq(&resolved[0], &a));
        assert!(Arc::ptr_eq(&resolved[1], &b));
    }

    #[test]
    fn test_empty_provider_resolves_nothing() {
        let provider = StaticFilterProvider::empty();
        let descriptor = JobDescriptor::new("App.Mailer", "send", Vec::new());
        assert!(provider.filters_for(&descriptor).is_empty());
    }
}
