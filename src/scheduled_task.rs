use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use rocket::futures::future::{self, FutureExt};
use rocket::tokio::{
    self,
    sync::Notify,
    task::{JoinError, JoinHandle},
    time::Duration,
};

/// A task that runs after a delay.
/// It can be triggered early or cancelled before it starts.
pub struct ScheduledTask<T> {
    handle: JoinHandle<T>,
    trigger: Arc<Notify>,
}

impl<T> ScheduledTask<T>
where
    T: Send + 'static,
{
    /// Schedule `task` to run once `delay` has elapsed.
    pub fn after<Fut>(delay: Duration, task: Fut) -> Self
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        let trigger = Arc::new(Notify::new());
        let early = trigger.clone();
        let handle = tokio::spawn(async move {
            // Whichever comes first: the delay, or an explicit trigger.
            let sleep = tokio::time::sleep(delay).boxed();
            let notified = early.notified().boxed();
            future::select(sleep, notified).await;
            task.await
        });
        Self { handle, trigger }
    }

    /// Run the task now instead of waiting for the delay.
    /// Has no effect if the task has already started.
    pub fn trigger_now(&self) {
        // `notify_one` stores a permit, so this works even before the task first polls.
        self.trigger.notify_one();
    }

    /// Cancel the task. Returns true iff it had already completed before we could cancel it.
    pub async fn cancel(self) -> bool {
        self.handle.abort();
        self.handle.await.is_ok()
    }
}

/// Implement `Future` for `ScheduledTask` so we can directly `await` it.
impl<T> Future for ScheduledTask<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx)
    }
}
