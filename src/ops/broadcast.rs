use futures::FutureExt;

use crate::channel::Channel;
use crate::node::{fanout_node, WorkerFn};

impl<T: Clone + Send + 'static> Channel<T> {
    /// Copies every value to all `consumers` output channels. The next input
    /// value is not read until every live output accepted the current one, so
    /// one slow consumer throttles the rest; per-output queues of capacity
    /// `buffer` loosen that coupling.
    ///
    /// Outputs whose consumer unsubscribed are skipped; once every consumer
    /// is gone, the node stops and releases the upstream.
    ///
    /// # Example
    /// ```rust
    /// use manifold::Pipeline;
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let pipeline = Pipeline::new();
    /// let copies = pipeline.from_iter(vec![1, 2, 3]).broadcast(2, 0);
    /// let sinks: Vec<_> = copies.into_iter().map(|copy| copy.to_vec()).collect();
    ///
    /// for sink in sinks {
    ///     assert_eq!(sink.await.unwrap(), vec![1, 2, 3]);
    /// }
    /// # });
    /// ```
    pub fn broadcast(self, consumers: usize, buffer: usize) -> Vec<Channel<T>> {
        let worker: WorkerFn<T, T> = Box::new(move |ctx| {
            async move {
                while let Some(value) = ctx.recv(0).await {
                    if !ctx.send_to_each(value).await {
                        return;
                    }
                }
            }
            .boxed()
        });
        fanout_node(self, consumers, buffer, worker)
    }
}

#[cfg(test)]
mod tests {
    use crate::Pipeline;

    #[tokio::test]
    async fn every_output_sees_the_full_stream_in_order() {
        let pipeline = Pipeline::new();
        let copies = pipeline.from_range(1..=20).broadcast(3, 4);
        let sinks: Vec<_> = copies.into_iter().map(|copy| copy.to_vec()).collect();

        for sink in sinks {
            assert_eq!(sink.await.unwrap(), (1..=20).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn an_unsubscribed_output_is_skipped() {
        let pipeline = Pipeline::new();
        let mut copies = pipeline.from_iter(vec![1, 2, 3]).broadcast(2, 0);
        let kept = copies.pop().unwrap();
        drop(copies);

        assert_eq!(kept.to_vec().await.unwrap(), vec![1, 2, 3]);
        pipeline.done().await;
        assert_eq!(pipeline.error(), None);
    }
}
