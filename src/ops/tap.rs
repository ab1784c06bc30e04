use crate::channel::Channel;
use crate::node::linear_node;
use crate::options::Concurrency;
use crate::worker::processor_worker;

impl<T: Send + 'static> Channel<T> {
    /// Runs `action` as a side effect for every value, then forwards the
    /// value unchanged. Logging is the typical use.
    ///
    /// Accepts the same [`Concurrency`] settings as [`map`](Channel::map).
    /// With concurrent workers the side effects run in processing order, not
    /// necessarily input order, even when the output is ordered.
    pub fn tap<F>(self, action: F, concurrency: Concurrency) -> Channel<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let worker = processor_worker(
            move |value| {
                action(&value);
                Some(value)
            },
            concurrency,
        );
        linear_node(self, concurrency.output_buffer, worker)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use crate::{Concurrency, Pipeline};

    #[tokio::test]
    async fn tap_observes_every_value_and_passes_it_through() {
        let seen = Arc::new(AtomicU32::new(0));
        let sum = Arc::clone(&seen);

        let pipeline = Pipeline::new();
        let result = pipeline
            .from_iter(vec![1u32, 2, 3])
            .tap(move |x| {
                sum.fetch_add(*x, Ordering::SeqCst);
            }, Concurrency::serial())
            .to_vec();

        assert_eq!(result.await.unwrap(), vec![1, 2, 3]);
        assert_eq!(seen.load(Ordering::SeqCst), 6);
    }
}
