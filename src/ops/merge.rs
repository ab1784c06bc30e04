use futures::FutureExt;

use crate::channel::Channel;
use crate::node::{combine_node, WorkerFn};
use crate::worker::spawn_supervised;

/// Merges several channels of the same pipeline into one: values are
/// forwarded as they arrive on any input, with no priority between inputs.
///
/// # Example
/// ```rust
/// use manifold::{merge, Pipeline};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let pipeline = Pipeline::new();
/// let left = pipeline.from_iter(vec![1, 2, 5]);
/// let right = pipeline.from_iter(vec![3, 4, 6]);
/// let result = merge(vec![left, right]).to_vec();
///
/// let mut values = result.await.unwrap();
/// values.sort();
/// assert_eq!(values, vec![1, 2, 3, 4, 5, 6]);
/// # });
/// ```
pub fn merge<T: Send + 'static>(inputs: Vec<Channel<T>>) -> Channel<T> {
    let worker: WorkerFn<T, T> = Box::new(move |ctx| {
        async move {
            let handles: Vec<_> = (0..ctx.inputs().len())
                .map(|index| {
                    let input_ctx = ctx.clone();
                    let task = async move {
                        while let Some(value) = input_ctx.recv(index).await {
                            if !input_ctx.send(value).await {
                                return;
                            }
                        }
                    };
                    spawn_supervised(&ctx, task.boxed())
                })
                .collect();
            for handle in handles {
                let _ = handle.await;
            }
        }
        .boxed()
    });
    combine_node(inputs, 0, worker)
}
