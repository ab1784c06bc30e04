use std::sync::Arc;

use futures::FutureExt;

use crate::channel::Channel;
use crate::node::{linear_node, WorkerCtx, WorkerFn};
use crate::worker::{recv_from, run_pool};

impl<T: Send + 'static> Channel<T> {
    /// Maps every value to a child [`Channel`] of the same pipeline and
    /// forwards all of the child's values before taking the next input.
    ///
    /// Child channels are created while the pipeline is already running; the
    /// pipeline starts such late nodes immediately. With `workers > 1`,
    /// several inputs are expanded concurrently (each child still drained
    /// sequentially by its worker) and the overall output order is
    /// unspecified.
    ///
    /// # Example
    /// ```rust
    /// use manifold::Pipeline;
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let pipeline = Pipeline::new();
    /// let child_of = pipeline.clone();
    /// let result = pipeline
    ///     .from_iter(vec![0, 10])
    ///     .flat_map(move |x| child_of.from_iter(vec![x + 1, x + 2]), 1)
    ///     .to_vec();
    ///
    /// assert_eq!(result.await.unwrap(), vec![1, 2, 11, 12]);
    /// # });
    /// ```
    pub fn flat_map<R, F>(self, mapper: F, workers: usize) -> Channel<R>
    where
        R: Send + 'static,
        F: Fn(T) -> Channel<R> + Send + Sync + 'static,
    {
        assert!(workers >= 1, "flat_map requires at least one worker");
        let mapper = Arc::new(mapper);
        let worker: WorkerFn<T, R> = Box::new(move |ctx| {
            async move {
                if workers == 1 {
                    expand_loop(ctx, mapper).await;
                } else {
                    run_pool(&ctx, workers, move |worker_ctx| {
                        expand_loop(worker_ctx, Arc::clone(&mapper)).boxed()
                    })
                    .await;
                }
            }
            .boxed()
        });
        linear_node(self, 0, worker)
    }
}

async fn expand_loop<T, R, F>(ctx: WorkerCtx<T, R>, mapper: Arc<F>)
where
    R: Send + 'static,
    F: Fn(T) -> Channel<R> + Send + Sync + 'static,
{
    while let Some(value) = ctx.recv(0).await {
        let child = mapper(value);
        let (_, child_receiver, child_hook) = child.claim();
        loop {
            match recv_from(ctx.quit(), &child_receiver).await {
                Some(output) => {
                    if !ctx.send(output).await {
                        child_hook.unsubscribe();
                        return;
                    }
                }
                None => {
                    // On quit the child may still be mid-stream; release it so
                    // it stops producing rather than blocking until the
                    // pipeline tears down.
                    if ctx.quit().is_cancelled() {
                        child_hook.unsubscribe();
                        return;
                    }
                    break;
                }
            }
        }
        child_hook.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use crate::Pipeline;

    #[tokio::test]
    async fn children_are_drained_in_input_order() {
        let pipeline = Pipeline::new();
        let child_of = pipeline.clone();
        let result = pipeline
            .from_iter(vec![0, 10, 20])
            .flat_map(move |x| child_of.from_iter(vec![x, x + 1]), 1)
            .to_vec();

        assert_eq!(result.await.unwrap(), vec![0, 1, 10, 11, 20, 21]);
    }

    #[tokio::test]
    async fn concurrent_expansion_emits_the_union() {
        let pipeline = Pipeline::new();
        let child_of = pipeline.clone();
        let result = pipeline
            .from_range(0..=9)
            .flat_map(move |x| child_of.from_iter(vec![x * 2, x * 2 + 1]), 4)
            .to_vec();

        let mut values = result.await.unwrap();
        values.sort_unstable();
        assert_eq!(values, (0..=19).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn downstream_limit_unsubscribes_running_children() {
        let pipeline = Pipeline::new();
        let child_of = pipeline.clone();
        let result = pipeline
            .from_iter(vec![1, 2, 3])
            .flat_map(move |x| child_of.from_generator(move |i| (x, i)), 1)
            .take(5)
            .to_vec();

        // The first endless child supplies everything; take(5) then cuts the
        // whole chain down.
        let values = result.await.unwrap();
        assert_eq!(values.len(), 5);
        assert!(values.iter().all(|(x, _)| *x == 1));
        pipeline.done().await;
        assert_eq!(pipeline.error(), None);
    }
}
