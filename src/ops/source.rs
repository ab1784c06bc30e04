use std::ops::RangeInclusive;

use futures::{FutureExt, Stream, StreamExt};

use crate::channel::Channel;
use crate::node::{source_node, WorkerFn};
use crate::pipeline::Pipeline;
use crate::worker::recv_from;

impl Pipeline {
    /// A source emitting every value of `values` in order.
    ///
    /// # Example
    /// ```rust
    /// use manifold::Pipeline;
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let pipeline = Pipeline::new();
    /// let result = pipeline.from_iter(vec!["a", "b"]).to_vec();
    /// assert_eq!(result.await.unwrap(), vec!["a", "b"]);
    /// # });
    /// ```
    pub fn from_iter<T, I>(&self, values: I) -> Channel<T>
    where
        T: Send + 'static,
        I: IntoIterator<Item = T> + Send + 'static,
        I::IntoIter: Send,
    {
        let worker: WorkerFn<(), T> = Box::new(move |ctx| {
            async move {
                for value in values {
                    if !ctx.send(value).await {
                        return;
                    }
                }
            }
            .boxed()
        });
        source_node(self, 0, worker)
    }

    /// A source emitting every integer of an inclusive range in order.
    pub fn from_range<T>(&self, range: RangeInclusive<T>) -> Channel<T>
    where
        T: Send + 'static,
        RangeInclusive<T>: Iterator<Item = T> + Send + 'static,
    {
        self.from_iter(range)
    }

    /// An endless source calling `generate(0), generate(1), …` until the
    /// pipeline ends or every consumer unsubscribes.
    pub fn from_generator<T, F>(&self, mut generate: F) -> Channel<T>
    where
        T: Send + 'static,
        F: FnMut(u64) -> T + Send + 'static,
    {
        let worker: WorkerFn<(), T> = Box::new(move |ctx| {
            async move {
                for index in 0u64.. {
                    if !ctx.send(generate(index)).await {
                        return;
                    }
                }
            }
            .boxed()
        });
        source_node(self, 0, worker)
    }

    /// Bridges a raw channel into the pipeline: values received on `source`
    /// flow out of the returned [`Channel`] until `source` closes.
    pub fn from_channel<T>(&self, source: flume::Receiver<T>) -> Channel<T>
    where
        T: Send + 'static,
    {
        let worker: WorkerFn<(), T> = Box::new(move |ctx| {
            async move {
                while let Some(value) = recv_from(ctx.quit(), &source).await {
                    if !ctx.send(value).await {
                        return;
                    }
                }
            }
            .boxed()
        });
        source_node(self, 0, worker)
    }

    /// A source draining a [`Stream`].
    pub fn from_stream<T, S>(&self, stream: S) -> Channel<T>
    where
        T: Send + 'static,
        S: Stream<Item = T> + Send + 'static,
    {
        let worker: WorkerFn<(), T> = Box::new(move |ctx| {
            async move {
                tokio::pin!(stream);
                loop {
                    if ctx.quit().is_cancelled() {
                        return;
                    }
                    let next = tokio::select! {
                        biased;
                        _ = ctx.quit().cancelled() => return,
                        next = stream.next() => next,
                    };
                    match next {
                        Some(value) => {
                            if !ctx.send(value).await {
                                return;
                            }
                        }
                        None => return,
                    }
                }
            }
            .boxed()
        });
        source_node(self, 0, worker)
    }
}
