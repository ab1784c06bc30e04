use crate::channel::Channel;
use crate::node::linear_node;
use crate::options::Concurrency;
use crate::worker::processor_worker;

impl<T: Send + 'static> Channel<T> {
    /// Forwards only the values satisfying `predicate`.
    ///
    /// Accepts the same [`Concurrency`] settings as
    /// [`map`](Channel::map); with `concurrent_ordered` the output is exactly
    /// the input-ordered subsequence of matching values.
    ///
    /// # Example
    /// ```rust
    /// use manifold::{Pipeline, Concurrency};
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let pipeline = Pipeline::new();
    /// let result = pipeline
    ///     .from_iter(vec![1, 2, 3])
    ///     .filter(|x| x % 2 == 1, Concurrency::serial())
    ///     .to_vec();
    ///
    /// assert_eq!(result.await.unwrap(), vec![1, 3]);
    /// # });
    /// ```
    pub fn filter<F>(self, predicate: F, concurrency: Concurrency) -> Channel<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let worker = processor_worker(
            move |value| predicate(&value).then_some(value),
            concurrency,
        );
        linear_node(self, concurrency.output_buffer, worker)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Concurrency, Pipeline};

    #[tokio::test]
    async fn filter_drops_non_matching_values() {
        let pipeline = Pipeline::new();
        let result = pipeline
            .from_iter(vec![1, 2, 3])
            .filter(|x| x % 2 == 1, Concurrency::serial())
            .to_vec();
        assert_eq!(result.await.unwrap(), vec![1, 3]);
    }

    #[tokio::test]
    async fn concurrent_filter_keeps_the_matching_bag() {
        let pipeline = Pipeline::new();
        let result = pipeline
            .from_range(0..=99)
            .filter(|x| x % 5 == 0, Concurrency::concurrent(8))
            .to_vec();

        let mut values = result.await.unwrap();
        values.sort_unstable();
        assert_eq!(values, (0..=99).filter(|x| x % 5 == 0).collect::<Vec<_>>());
    }
}
