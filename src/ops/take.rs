use futures::FutureExt;

use crate::channel::Channel;
use crate::node::{linear_node, WorkerFn};

impl<T: Send + 'static> Channel<T> {
    /// Forwards the first `count` values, then ends the stream and releases
    /// the upstream.
    pub fn take(self, count: u64) -> Channel<T> {
        let worker: WorkerFn<T, T> = Box::new(move |ctx| {
            async move {
                let mut taken = 0u64;
                while taken < count {
                    let Some(value) = ctx.recv(0).await else {
                        return;
                    };
                    if !ctx.send(value).await {
                        return;
                    }
                    taken += 1;
                }
            }
            .boxed()
        });
        linear_node(self, 0, worker)
    }
}

#[cfg(test)]
mod tests {
    use crate::Pipeline;

    #[tokio::test]
    async fn take_truncates_the_stream() {
        let pipeline = Pipeline::new();
        let result = pipeline.from_iter(vec![1, 2, 3, 4]).take(2).to_vec();
        assert_eq!(result.await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn take_more_than_available_yields_everything() {
        let pipeline = Pipeline::new();
        let result = pipeline.from_iter(vec![1, 2]).take(10).to_vec();
        assert_eq!(result.await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn take_zero_closes_immediately() {
        let pipeline = Pipeline::new();
        let result = pipeline.from_generator(|i| i).take(0).to_vec();
        assert_eq!(result.await.unwrap(), Vec::<u64>::new());
        pipeline.done().await;
    }
}
