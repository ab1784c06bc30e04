use futures::FutureExt;

use crate::channel::Channel;
use crate::node::{combine_node, WorkerFn};

/// Concatenates several channels of the same pipeline: inputs are consumed
/// one at a time in argument order, each drained completely before the next
/// one is touched.
///
/// # Example
/// ```rust
/// use manifold::{concat, Pipeline};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let pipeline = Pipeline::new();
/// let first = pipeline.from_iter(vec![1, 2, 3]);
/// let second = pipeline.from_iter(vec![4, 5, 6]);
/// let result = concat(vec![first, second]).to_vec();
///
/// assert_eq!(result.await.unwrap(), vec![1, 2, 3, 4, 5, 6]);
/// # });
/// ```
pub fn concat<T: Send + 'static>(inputs: Vec<Channel<T>>) -> Channel<T> {
    let worker: WorkerFn<T, T> = Box::new(move |ctx| {
        async move {
            for index in 0..ctx.inputs().len() {
                while let Some(value) = ctx.recv(index).await {
                    if !ctx.send(value).await {
                        return;
                    }
                }
                if ctx.quit().is_cancelled() {
                    return;
                }
            }
        }
        .boxed()
    });
    combine_node(inputs, 0, worker)
}
