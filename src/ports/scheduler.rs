use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use tokio_util::sync::CancellationToken;

/// Callback run on every scheduler tick.
pub type TickFn = Box<dyn FnMut() -> BoxFuture<'static, ()> + Send>;

/// Wall clock port.
pub trait Clock: Send + Sync {
    /// Current wall-clock time in epoch milliseconds.
    fn now_millis(&self) -> i64;
}

/// Port for timed callbacks.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Run `callback` every `period`, first after one full period.
    ///
    /// The callback stops running as soon as the returned handle is
    /// cancelled or dropped. A tick already in progress completes.
    fn every(&self, period: Duration, callback: TickFn) -> TaskHandle;

    /// Wait once for `delay`.
    async fn delay(&self, delay: Duration);
}

/// Cancelable handle to a scheduled callback. Cancels on drop.
#[derive(Debug)]
pub struct TaskHandle {
    token: CancellationToken,
}

impl TaskHandle {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
