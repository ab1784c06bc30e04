use futures::FutureExt;

use crate::channel::Channel;
use crate::node::{shared_fanout_node, WorkerFn};

impl<T: Send + 'static> Channel<T> {
    /// Load-balances the stream over `consumers` output channels: each value
    /// is delivered to exactly one output, whichever live consumer is first
    /// to take it. The outputs share a single queue of capacity `buffer`.
    ///
    /// A consumer that unsubscribes (or drops its channel) simply stops
    /// competing for values; the remaining consumers take over. Once every
    /// consumer is gone, the node stops and releases the upstream.
    ///
    /// # Example
    /// ```rust
    /// use manifold::Pipeline;
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let pipeline = Pipeline::new();
    /// let halves = pipeline.from_iter(0..100).split(2, 4);
    /// let sinks: Vec<_> = halves.into_iter().map(|half| half.to_vec()).collect();
    ///
    /// let mut all = Vec::new();
    /// for sink in sinks {
    ///     all.extend(sink.await.unwrap());
    /// }
    /// all.sort();
    /// assert_eq!(all, (0..100).collect::<Vec<_>>());
    /// # });
    /// ```
    pub fn split(self, consumers: usize, buffer: usize) -> Vec<Channel<T>> {
        let worker: WorkerFn<T, T> = Box::new(move |ctx| {
            async move {
                while let Some(value) = ctx.recv(0).await {
                    if !ctx.send(value).await {
                        return;
                    }
                }
            }
            .boxed()
        });
        shared_fanout_node(self, consumers, buffer, worker)
    }
}

#[cfg(test)]
mod tests {
    use crate::Pipeline;

    #[tokio::test]
    async fn outputs_partition_the_input() {
        let pipeline = Pipeline::new();
        let outputs = pipeline.from_range(0..=99).split(3, 2);
        let sinks: Vec<_> = outputs.into_iter().map(|out| out.to_vec()).collect();

        let mut all = Vec::new();
        for sink in sinks {
            all.extend(sink.await.unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (0..=99).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn a_dropped_consumer_leaves_the_rest_whole() {
        let pipeline = Pipeline::new();
        let mut outputs = pipeline.from_range(0..=49).split(2, 0);
        let survivor = outputs.pop().unwrap();
        drop(outputs);

        let values = survivor.to_vec().await.unwrap();
        assert_eq!(values, (0..=49).collect::<Vec<_>>());
        pipeline.done().await;
        assert_eq!(pipeline.error(), None);
    }

    #[tokio::test]
    async fn dropping_every_consumer_stops_the_source() {
        let pipeline = Pipeline::new();
        let outputs = pipeline.from_generator(|i| i).split(2, 0);
        drop(outputs);

        pipeline.start();
        pipeline.done().await;
        assert_eq!(pipeline.error(), None);
    }
}
