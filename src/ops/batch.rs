use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;

use crate::channel::Channel;
use crate::node::{linear_node, WorkerCtx, WorkerFn};

impl<T: Send + 'static> Channel<T> {
    /// Groups values into `Vec`s of at most `size`, flushing a batch when it
    /// is full, when `timeout` has passed since the batch started
    /// accumulating, and when the input closes (a final partial batch).
    ///
    /// A `size` of zero disables the size bound; a zero `timeout` disables
    /// the timer. Empty batches are never emitted.
    ///
    /// # Example
    /// ```rust
    /// use std::time::Duration;
    /// use manifold::Pipeline;
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let pipeline = Pipeline::new();
    /// let result = pipeline
    ///     .from_iter(1..=10)
    ///     .batch(3, Duration::ZERO)
    ///     .to_vec();
    ///
    /// assert_eq!(
    ///     result.await.unwrap(),
    ///     vec![vec![1, 2, 3], vec![4, 5, 6], vec![7, 8, 9], vec![10]],
    /// );
    /// # });
    /// ```
    pub fn batch(self, size: usize, timeout: Duration) -> Channel<Vec<T>> {
        let worker: WorkerFn<T, Vec<T>> =
            Box::new(move |ctx| batch_loop(ctx, size, timeout).boxed());
        linear_node(self, 0, worker)
    }
}

async fn batch_loop<T: Send + 'static>(ctx: WorkerCtx<T, Vec<T>>, size: usize, timeout: Duration) {
    let input = ctx.input(0).clone();
    let mut batch: Vec<T> = Vec::new();
    // Armed when a batch starts accumulating, cleared on flush.
    let mut deadline: Option<Instant> = None;

    loop {
        if ctx.quit().is_cancelled() {
            return;
        }
        let mut flush = false;
        let mut finished = false;
        tokio::select! {
            biased;
            _ = ctx.quit().cancelled() => {
                flush = true;
                finished = true;
            }
            received = input.recv_async() => match received {
                Ok(value) => {
                    batch.push(value);
                    if deadline.is_none() && !timeout.is_zero() {
                        deadline = Some(Instant::now() + timeout);
                    }
                    if size > 0 && batch.len() >= size {
                        flush = true;
                    }
                }
                Err(_) => {
                    flush = true;
                    finished = true;
                }
            },
            _ = expiry(deadline), if deadline.is_some() => {
                flush = true;
            }
        }

        if flush && !batch.is_empty() {
            let full = std::mem::take(&mut batch);
            if !ctx.send(full).await {
                return;
            }
            deadline = None;
        }
        if finished {
            return;
        }
    }
}

async fn expiry(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
