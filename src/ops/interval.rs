use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;

use crate::channel::Channel;
use crate::node::{linear_node, WorkerFn};

impl<T: Send + 'static> Channel<T> {
    /// Paces the stream: after emitting a value `v`, at least `pause(&v)`
    /// must elapse before the next value is emitted. There is no trailing
    /// delay after the last value.
    ///
    /// Values arriving faster than the pace accumulate as backpressure, so
    /// consider a [`buffer`](Channel::buffer) in front of this operator.
    pub fn interval<F>(self, pause: F) -> Channel<T>
    where
        F: FnMut(&T) -> Duration + Send + 'static,
    {
        let mut pause = pause;
        let worker: WorkerFn<T, T> = Box::new(move |ctx| {
            async move {
                let mut ready_at = Instant::now();
                while let Some(value) = ctx.recv(0).await {
                    tokio::select! {
                        biased;
                        _ = ctx.quit().cancelled() => return,
                        _ = tokio::time::sleep_until(ready_at) => {}
                    }
                    let wait = pause(&value);
                    if !ctx.send(value).await {
                        return;
                    }
                    ready_at = Instant::now() + wait;
                }
            }
            .boxed()
        });
        linear_node(self, 0, worker)
    }
}
