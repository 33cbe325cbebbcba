//! # Infinite repetition wrapper.
//!
//! [`RepeatForever`] re-invokes its inner task in a tight loop until
//! shutdown is observed. It catches nothing itself; the
//! [`Retry`](crate::Retry) layer beneath it owns failure handling, so any
//! error reaching this wrapper ends the loop.

use async_trait::async_trait;

use crate::error::TaskError;
use crate::server::{ServerContext, ServerTask, ServerTaskRef};

/// Loops the inner task until shutdown.
pub struct RepeatForever {
    inner: ServerTaskRef,
}

impl RepeatForever {
    /// Wraps `inner`, usually an already retry-wrapped task.
    pub fn new(inner: ServerTaskRef) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ServerTask for RepeatForever {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn execute(&self, ctx: &ServerContext) -> Result<(), TaskError> {
        while !ctx.is_shutdown_requested() {
            self.inner.execute(ctx).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use tokio_util::sync::CancellationToken;

    use crate::storage::MemoryStorage;

    struct Counting {
        calls: AtomicU32,
        stop_after: u32,
        shutdown: CancellationToken,
    }

    #[async_trait]
    impl ServerTask for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn execute(&self, _ctx: &ServerContext) -> Result<(), TaskError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) + 1 >= self.stop_after {
                self.shutdown.cancel();
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_repeats_until_shutdown() {
        let token = CancellationToken::new();
        let inner = Arc::new(Counting {
            calls: AtomicU32::new(0),
            stop_after: 5,
            shutdown: token.clone(),
        });
        let repeat = RepeatForever::new(inner.clone());
        let ctx = ServerContext::new("server-1", Arc::new(MemoryStorage::new()), token);

        repeat.execute(&ctx).await.expect("stops cleanly");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_propagates_inner_errors() {
        struct Failing;

        #[async_trait]
        impl ServerTask for Failing {
            fn name(&self) -> &str {
                "failing"
            }
            async fn execute(&self, _ctx: &ServerContext) -> Result<(), TaskError> {
                Err(TaskError::Other("broken".into()))
            }
        }

        let repeat = RepeatForever::new(Arc::new(Failing));
        let ctx = ServerContext::new(
            "server-1",
            Arc::new(MemoryStorage::new()),
            CancellationToken::new(),
        );
        assert!(repeat.execute(&ctx).await.is_err());
    }
}
