//! # Bidirectional cursor over an ordered filter list.
//!
//! [`Cursor`] is a lightweight position over `&[FilterRef]` that the
//! pipeline state machines traverse in both directions. `next` advances
//! forward and returns the first filter matching either of the two
//! requested capability shapes; `prev` scans backward with the same rule.
//! Entries matching neither shape are skipped.
//!
//! The index arithmetic makes forward and backward traversal symmetric:
//! after `next` returns the filter at position `i`, the index is `i + 1`,
//! so a subsequent `prev` inspects position `i - 1`, the filter *before*
//! the one that just ran. `reset_to_end` parks the index one past the last
//! element so that the first `prev` inspects the last filter.
//!
//! The cursor has no side effects beyond its position. It is reused by
//! both pipelines sequentially, never concurrently.

use crate::filters::filter::{
    AsyncExceptionFilter, AsyncPerformFilter, ExceptionFilter, Filter, FilterRef, PerformFilter,
};

/// Either the sync or the async implementation of a hook pair, as found
/// at a cursor position, tagged with the filter's name for logging.
pub(crate) enum Hook<'a, S: ?Sized, A: ?Sized> {
    /// The filter implements the synchronous variant.
    Sync(&'static str, &'a S),
    /// The filter implements the suspending variant (wins over sync).
    Async(&'static str, &'a A),
}

/// Before/after hook pair of a filter.
pub(crate) type PerformHook<'a> = Hook<'a, dyn PerformFilter, dyn AsyncPerformFilter>;

/// Exception hook pair of a filter.
pub(crate) type ExceptionHook<'a> = Hook<'a, dyn ExceptionFilter, dyn AsyncExceptionFilter>;

impl<'a> PerformHook<'a> {
    /// Selects the before/after capability of `filter`, async first.
    pub(crate) fn perform(filter: &'a dyn Filter) -> Option<Self> {
        let name = filter.name();
        if let Some(hook) = filter.perform_async() {
            return Some(Hook::Async(name, hook));
        }
        filter.perform_sync().map(|hook| Hook::Sync(name, hook))
    }
}

impl<'a> ExceptionHook<'a> {
    /// Selects the exception capability of `filter`, async first.
    pub(crate) fn exception(filter: &'a dyn Filter) -> Option<Self> {
        let name = filter.name();
        if let Some(hook) = filter.exception_async() {
            return Some(Hook::Async(name, hook));
        }
        filter.exception_sync().map(|hook| Hook::Sync(name, hook))
    }
}

/// Bidirectional position over an ordered filter list.
pub(crate) struct Cursor<'a> {
    index: usize,
    filters: &'a [FilterRef],
}

impl<'a> Cursor<'a> {
    /// Creates a cursor positioned at the start of the list.
    pub(crate) fn new(filters: &'a [FilterRef]) -> Self {
        Self { index: 0, filters }
    }

    /// Returns the position to the start.
    pub(crate) fn reset(&mut self) {
        self.index = 0;
    }

    /// Moves the position one past the last element, so a subsequent
    /// `prev` immediately inspects the last filter.
    pub(crate) fn reset_to_end(&mut self) {
        self.index = self.filters.len() + 1;
    }

    /// Advances forward and returns the next filter matching the selector,
    /// or `None` at end of list.
    pub(crate) fn next<S: ?Sized, A: ?Sized>(
        &mut self,
        select: impl Fn(&'a dyn Filter) -> Option<Hook<'a, S, A>>,
    ) -> Option<Hook<'a, S, A>> {
        while self.index < self.filters.len() {
            let filter: &'a dyn Filter = self.filters[self.index].as_ref();
            self.index += 1;
            if let Some(hook) = select(filter) {
                return Some(hook);
            }
        }
        None
    }

    /// Moves backward and returns the previous filter matching the
    /// selector, or `None` at the start of the list. A failed backward
    /// scan parks the position at the start.
    pub(crate) fn prev<S: ?Sized, A: ?Sized>(
        &mut self,
        select: impl Fn(&'a dyn Filter) -> Option<Hook<'a, S, A>>,
    ) -> Option<Hook<'a, S, A>> {
        while self.index > 1 {
            self.index -= 1;
            let filter: &'a dyn Filter = self.filters[self.index - 1].as_ref();
            if let Some(hook) = select(filter) {
                return Some(hook);
            }
        }
        self.index = 0;
        None
    }
}
