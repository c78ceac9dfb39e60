use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, PartialEq, Eq)]
pub struct Cancelled;

/// A spawned background loop that can be stopped from any clone.
#[derive(Clone)]
pub struct Task<T> {
    handle: Arc<JoinHandle<Result<T, Cancelled>>>,
    cancellation_token: CancellationToken,
}

impl<T> Task<T>
where
    T: Send + 'static,
{
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self::spawn_with_token(CancellationToken::new(), future)
    }

    /// Spawns under an existing token so the caller can tie several tasks together.
    pub fn spawn_with_token<F>(cancellation_token: CancellationToken, future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        let cancellation_token_clone = cancellation_token.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                result = future => Ok(result),
                _ = cancellation_token_clone.cancelled() => Err(Cancelled)
            }
        });

        Self {
            handle: Arc::new(handle),
            cancellation_token,
        }
    }

    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_cancel_stops_pending_future() {
        let task = Task::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        assert!(!task.is_finished());

        task.cancel();
        tokio::time::timeout(Duration::from_secs(1), async {
            while !task.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("Task did not stop after cancel.");
        assert!(task.is_cancelled());
    }
}
