use crate::channel::Channel;
use crate::node::linear_node;
use crate::options::Concurrency;
use crate::worker::processor_worker;

impl<T: Send + 'static> Channel<T> {
    /// Transforms every value with `mapper`.
    ///
    /// With [`Concurrency::serial`] values are mapped one at a time in input
    /// order. With [`Concurrency::concurrent`] several workers map values in
    /// parallel and the output order is unspecified;
    /// [`Concurrency::concurrent_ordered`] restores input order on the output.
    ///
    /// # Example
    /// ```rust
    /// use manifold::{Pipeline, Concurrency};
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let pipeline = Pipeline::new();
    /// let result = pipeline
    ///     .from_iter(vec![0, 1, 2])
    ///     .map(|x| x + 10, Concurrency::concurrent_ordered(8))
    ///     .to_vec();
    ///
    /// assert_eq!(result.await.unwrap(), vec![10, 11, 12]);
    /// # });
    /// ```
    pub fn map<R, F>(self, mapper: F, concurrency: Concurrency) -> Channel<R>
    where
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        let worker = processor_worker(move |value| Some(mapper(value)), concurrency);
        linear_node(self, concurrency.output_buffer, worker)
    }
}
