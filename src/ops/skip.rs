use futures::FutureExt;

use crate::channel::Channel;
use crate::node::{linear_node, WorkerFn};

impl<T: Send + 'static> Channel<T> {
    /// Drops the first `count` values and forwards the rest.
    pub fn skip(self, count: u64) -> Channel<T> {
        let worker: WorkerFn<T, T> = Box::new(move |ctx| {
            async move {
                let mut skipped = 0u64;
                while let Some(value) = ctx.recv(0).await {
                    if skipped < count {
                        skipped += 1;
                        continue;
                    }
                    if !ctx.send(value).await {
                        return;
                    }
                }
            }
            .boxed()
        });
        linear_node(self, 0, worker)
    }
}
