use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::oneshot;

use crate::channel::Channel;
use crate::node::{sink_node, WorkerFn};
use crate::options::Keep;
use crate::worker::run_pool;

/// Sinks terminate a chain. Each returns a single-shot result receiver that
/// resolves when the node finishes, whether the input was exhausted or the
/// pipeline was cancelled mid-stream; in the latter case the result reflects
/// the partial work, and `pipeline.error()` tells the two apart. Attaching a
/// sink is what triggers the pipeline's automatic start.
impl<T: Send + 'static> Channel<T> {
    /// Calls `action` for every value. The returned receiver resolves once
    /// all input has been processed or the pipeline ended. With `workers > 1`
    /// values are processed concurrently in no particular order.
    ///
    /// # Example
    /// ```rust
    /// use manifold::Pipeline;
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let pipeline = Pipeline::new();
    /// let done = pipeline
    ///     .from_iter(vec![1, 2, 3])
    ///     .for_each(|x| println!("{x}"), 1);
    ///
    /// done.await.unwrap();
    /// # });
    /// ```
    pub fn for_each<F>(self, action: F, workers: usize) -> oneshot::Receiver<()>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        assert!(workers >= 1, "for_each requires at least one worker");
        let (result, receiver) = oneshot::channel();
        let action = Arc::new(action);
        let worker: WorkerFn<T, ()> = Box::new(move |ctx| {
            async move {
                if workers == 1 {
                    while let Some(value) = ctx.recv(0).await {
                        action(value);
                    }
                } else {
                    run_pool(&ctx, workers, move |worker_ctx| {
                        let action = Arc::clone(&action);
                        async move {
                            while let Some(value) = worker_ctx.recv(0).await {
                                action(value);
                            }
                        }
                        .boxed()
                    })
                    .await;
                }
                let _ = result.send(());
            }
            .boxed()
        });
        sink_node(self, worker);
        receiver
    }

    /// Collects every value into a `Vec`.
    pub fn to_vec(self) -> oneshot::Receiver<Vec<T>> {
        let (result, receiver) = oneshot::channel();
        let worker: WorkerFn<T, ()> = Box::new(move |ctx| {
            async move {
                let mut collected = Vec::new();
                while let Some(value) = ctx.recv(0).await {
                    collected.push(value);
                }
                let _ = result.send(collected);
            }
            .boxed()
        });
        sink_node(self, worker);
        receiver
    }

    /// Collects values into a map keyed by `to_key`. [`Keep::First`] ignores
    /// later values with an existing key, [`Keep::Last`] overwrites.
    ///
    /// # Example
    /// ```rust
    /// use manifold::{Keep, Pipeline};
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let pipeline = Pipeline::new();
    /// let result = pipeline
    ///     .from_iter(vec![11, 42, 31, 22, 73])
    ///     .to_map(|x| x % 10, Keep::First);
    ///
    /// let mapping = result.await.unwrap();
    /// assert_eq!(mapping[&1], 11);
    /// assert_eq!(mapping[&2], 42);
    /// assert_eq!(mapping[&3], 73);
    /// # });
    /// ```
    pub fn to_map<K, F>(self, to_key: F, keep: Keep) -> oneshot::Receiver<HashMap<K, T>>
    where
        K: Eq + Hash + Send + 'static,
        F: FnMut(&T) -> K + Send + 'static,
    {
        let mut to_key = to_key;
        let (result, receiver) = oneshot::channel();
        let worker: WorkerFn<T, ()> = Box::new(move |ctx| {
            async move {
                let mut mapping = HashMap::new();
                while let Some(value) = ctx.recv(0).await {
                    let key = to_key(&value);
                    match keep {
                        Keep::First => {
                            mapping.entry(key).or_insert(value);
                        }
                        Keep::Last => {
                            mapping.insert(key, value);
                        }
                    }
                }
                let _ = result.send(mapping);
            }
            .boxed()
        });
        sink_node(self, worker);
        receiver
    }

    /// Bridges the stream out of the pipeline: values are forwarded to the
    /// returned raw channel, which closes when the input closes or the
    /// pipeline ends.
    pub fn to_channel(self) -> flume::Receiver<T> {
        let (sender, receiver) = flume::bounded(0);
        let worker: WorkerFn<T, ()> = Box::new(move |ctx| {
            async move {
                while let Some(value) = ctx.recv(0).await {
                    if ctx.quit().is_cancelled() {
                        return;
                    }
                    tokio::select! {
                        biased;
                        _ = ctx.quit().cancelled() => return,
                        sent = sender.send_async(value) => {
                            if sent.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
            .boxed()
        });
        sink_node(self, worker);
        receiver
    }

    /// Resolves to the last value of the stream. When the stream ends without
    /// a value, the result channel closes without one and awaiting it fails.
    pub fn last(self) -> oneshot::Receiver<T> {
        let (result, receiver) = oneshot::channel();
        let worker: WorkerFn<T, ()> = Box::new(move |ctx| {
            async move {
                let mut last = None;
                while let Some(value) = ctx.recv(0).await {
                    last = Some(value);
                }
                if let Some(value) = last {
                    let _ = result.send(value);
                }
            }
            .boxed()
        });
        sink_node(self, worker);
        receiver
    }

    /// Counts the values of the stream.
    pub fn count(self) -> oneshot::Receiver<u64> {
        let (result, receiver) = oneshot::channel();
        let worker: WorkerFn<T, ()> = Box::new(move |ctx| {
            async move {
                let mut count = 0u64;
                while let Some(_value) = ctx.recv(0).await {
                    count += 1;
                }
                let _ = result.send(count);
            }
            .boxed()
        });
        sink_node(self, worker);
        receiver
    }

    /// Resolves to true as soon as some value satisfies `predicate`, reading
    /// no further input; false once the stream ends without a match.
    pub fn any<F>(self, predicate: F) -> oneshot::Receiver<bool>
    where
        F: FnMut(&T) -> bool + Send + 'static,
    {
        let mut predicate = predicate;
        let (result, receiver) = oneshot::channel();
        let worker: WorkerFn<T, ()> = Box::new(move |ctx| {
            async move {
                let mut found = false;
                while let Some(value) = ctx.recv(0).await {
                    if predicate(&value) {
                        found = true;
                        break;
                    }
                }
                let _ = result.send(found);
            }
            .boxed()
        });
        sink_node(self, worker);
        receiver
    }

    /// Resolves to false as soon as some value fails `predicate`, reading no
    /// further input; true once the stream ends with every value matching.
    pub fn all<F>(self, predicate: F) -> oneshot::Receiver<bool>
    where
        F: FnMut(&T) -> bool + Send + 'static,
    {
        let mut predicate = predicate;
        let (result, receiver) = oneshot::channel();
        let worker: WorkerFn<T, ()> = Box::new(move |ctx| {
            async move {
                let mut holds = true;
                while let Some(value) = ctx.recv(0).await {
                    if !predicate(&value) {
                        holds = false;
                        break;
                    }
                }
                let _ = result.send(holds);
            }
            .boxed()
        });
        sink_node(self, worker);
        receiver
    }

    /// Resolves to false as soon as some value satisfies `predicate`, reading
    /// no further input; true once the stream ends without a match.
    pub fn none<F>(self, predicate: F) -> oneshot::Receiver<bool>
    where
        F: FnMut(&T) -> bool + Send + 'static,
    {
        let mut predicate = predicate;
        let (result, receiver) = oneshot::channel();
        let worker: WorkerFn<T, ()> = Box::new(move |ctx| {
            async move {
                let mut clear = true;
                while let Some(value) = ctx.recv(0).await {
                    if predicate(&value) {
                        clear = false;
                        break;
                    }
                }
                let _ = result.send(clear);
            }
            .boxed()
        });
        sink_node(self, worker);
        receiver
    }

    /// Folds the stream into a single value; the result resolves once the
    /// input ends, and reflects the values folded so far when the pipeline is
    /// cancelled mid-stream.
    pub fn reduce<S, F>(self, initial: S, step: F) -> oneshot::Receiver<S>
    where
        S: Send + 'static,
        F: FnMut(S, T) -> S + Send + 'static,
    {
        let mut step = step;
        let (result, receiver) = oneshot::channel();
        let worker: WorkerFn<T, ()> = Box::new(move |ctx| {
            async move {
                let mut state = initial;
                while let Some(value) = ctx.recv(0).await {
                    state = step(state, value);
                }
                let _ = result.send(state);
            }
            .boxed()
        });
        sink_node(self, worker);
        receiver
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::test_utils::drain;
    use crate::{Keep, Pipeline, PipelineError};

    #[tokio::test]
    async fn for_each_visits_every_value() {
        let visited = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&visited);

        let pipeline = Pipeline::new();
        let done = pipeline
            .from_iter(vec![1, 2, 3])
            .for_each(move |x| log.lock().unwrap().push(x), 1);

        done.await.unwrap();
        assert_eq!(*visited.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn for_each_short_circuits_on_cancellation() {
        let (sender, receiver) = flume::bounded(0);
        let visited = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&visited);

        let pipeline = Pipeline::new();
        let cancel_from = pipeline.clone();
        let done = pipeline.from_channel(receiver).for_each(
            move |x| {
                log.lock().unwrap().push(x);
                if x == 2 {
                    cancel_from.cancel(Some(PipelineError::canceled("seen enough")));
                }
            },
            1,
        );

        sender.send_async(1).await.unwrap();
        sender.send_async(2).await.unwrap();

        done.await.unwrap();
        pipeline.done().await;
        assert_eq!(*visited.lock().unwrap(), vec![1, 2]);
        assert_eq!(pipeline.error(), Some(PipelineError::canceled("seen enough")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_for_each_covers_the_whole_stream() {
        let visits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&visits);

        let pipeline = Pipeline::new();
        let done = pipeline.from_range(0..=99).for_each(
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            8,
        );

        done.await.unwrap();
        assert_eq!(visits.load(Ordering::SeqCst), 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn a_panicking_action_cancels_the_pipeline() {
        let pipeline = Pipeline::new();
        let done = pipeline.from_range(0..=999).for_each(
            |x| {
                if x == 500 {
                    panic!("bad input");
                }
            },
            4,
        );

        let _ = done.await;
        pipeline.done().await;
        assert!(matches!(
            pipeline.error(),
            Some(PipelineError::WorkerPanic(message)) if message.contains("bad input")
        ));
    }

    #[tokio::test]
    async fn to_map_keeps_first_or_last() {
        let pipeline = Pipeline::new();
        let first = pipeline
            .from_iter(vec![11, 42, 31, 22, 73])
            .to_map(|x| x % 10, Keep::First)
            .await
            .unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first[&1], 11);
        assert_eq!(first[&2], 42);
        assert_eq!(first[&3], 73);

        let pipeline = Pipeline::new();
        let last = pipeline
            .from_iter(vec![11, 42, 31, 22, 73])
            .to_map(|x| x % 10, Keep::Last)
            .await
            .unwrap();
        assert_eq!(last[&1], 31);
        assert_eq!(last[&2], 22);
        assert_eq!(last[&3], 73);
    }

    #[tokio::test]
    async fn to_channel_streams_values_out() {
        let pipeline = Pipeline::new();
        let raw = pipeline.from_iter(vec![1, 2, 3]).to_channel();
        assert_eq!(drain(raw).await, vec![1, 2, 3]);
        pipeline.done().await;
    }

    #[tokio::test]
    async fn last_of_a_stream() {
        let pipeline = Pipeline::new();
        let result = pipeline.from_iter(vec![1, 2, 3]).last();
        assert_eq!(result.await.unwrap(), 3);
    }

    #[tokio::test]
    async fn last_of_an_empty_stream_closes_without_a_value() {
        let pipeline = Pipeline::new();
        let result = pipeline.from_iter(Vec::<i32>::new()).last();
        assert!(result.await.is_err());
    }

    #[tokio::test]
    async fn count_counts() {
        let pipeline = Pipeline::new();
        let result = pipeline.from_iter(vec![9, 8, 7, 6]).count();
        assert_eq!(result.await.unwrap(), 4);
    }

    #[tokio::test]
    async fn any_short_circuits_on_an_infinite_stream() {
        let pipeline = Pipeline::new();
        let result = pipeline.from_generator(|i| i).any(|x| *x >= 10);
        assert!(result.await.unwrap());
        pipeline.done().await;
        assert_eq!(pipeline.error(), None);
    }

    #[tokio::test]
    async fn any_is_false_when_nothing_matches() {
        let pipeline = Pipeline::new();
        let result = pipeline.from_iter(vec![0, 1, 2, 3]).any(|x| *x > 3);
        assert!(!result.await.unwrap());
    }

    #[tokio::test]
    async fn all_judges_the_whole_stream() {
        let pipeline = Pipeline::new();
        let result = pipeline.from_iter(vec![0, 1, 2, 3]).all(|x| *x < 4);
        assert!(result.await.unwrap());

        let pipeline = Pipeline::new();
        let result = pipeline.from_generator(|i| i).all(|x| *x < 2);
        assert!(!result.await.unwrap());
        pipeline.done().await;
    }

    #[tokio::test]
    async fn none_judges_the_whole_stream() {
        let pipeline = Pipeline::new();
        let result = pipeline.from_iter(vec![0, 1, 2, 3]).none(|x| *x > 3);
        assert!(result.await.unwrap());

        let pipeline = Pipeline::new();
        let result = pipeline.from_generator(|i| i).none(|x| *x >= 2);
        assert!(!result.await.unwrap());
        pipeline.done().await;
    }

    #[tokio::test]
    async fn reduce_folds_the_stream() {
        let pipeline = Pipeline::new();
        let result = pipeline.from_iter(vec![1, 2, 3]).reduce(0, |sum, x| sum + x);
        assert_eq!(result.await.unwrap(), 6);
    }

    #[tokio::test]
    async fn reduce_delivers_partial_state_on_cancellation() {
        let (sender, receiver) = flume::bounded(0);
        let pipeline = Pipeline::new();
        let result = pipeline
            .from_channel(receiver)
            .reduce(0, |sum, x| sum + x);

        sender.send_async(1).await.unwrap();
        sender.send_async(2).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        pipeline.cancel(Some(PipelineError::canceled("abort")));

        assert_eq!(result.await.unwrap(), 3);
        assert_eq!(pipeline.error(), Some(PipelineError::canceled("abort")));
    }
}
