use crate::channel::Channel;
use crate::node::linear_node;
use crate::options::Concurrency;
use crate::worker::processor_worker;

impl<T: Send + 'static> Channel<T> {
    /// Passes values through unchanged over an output queue of `capacity`,
    /// decoupling the upstream pace from a slow consumer: the producer does
    /// not block until `capacity` unread values are already waiting.
    pub fn buffer(self, capacity: usize) -> Channel<T> {
        let worker = processor_worker(Some, Concurrency::serial());
        linear_node(self, capacity, worker)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::{Concurrency, Pipeline};

    #[tokio::test]
    async fn buffer_is_transparent() {
        let pipeline = Pipeline::new();
        let result = pipeline.from_iter(vec![1, 2, 3]).buffer(2).to_vec();
        assert_eq!(result.await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn buffer_absorbs_upstream_progress() {
        let emitted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&emitted);

        let pipeline = Pipeline::new();
        let unread = pipeline
            .from_iter(0..100)
            .tap(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }, Concurrency::serial())
            .buffer(5)
            .to_channel();

        tokio::time::sleep(Duration::from_millis(80)).await;

        // Nobody reads the sink output, so progress is the buffer capacity
        // plus the handful of values parked in the rendezvous hand-offs.
        let progressed = emitted.load(Ordering::SeqCst);
        assert!(progressed >= 5, "buffer did not absorb anything: {progressed}");
        assert!(progressed <= 10, "buffer absorbed too much: {progressed}");

        drop(unread);
        pipeline.done().await;
    }
}
