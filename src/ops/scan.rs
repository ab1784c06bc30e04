use futures::FutureExt;

use crate::channel::Channel;
use crate::node::{linear_node, WorkerFn};
use crate::options::Keep;

impl<T: Send + 'static> Channel<T> {
    /// A stateful, emitting reduction: for every input value, `step` receives
    /// the accumulated state and the value and returns the new state plus the
    /// value to emit.
    ///
    /// Separating state from emission allows things a plain fold cannot
    /// express, like a moving average; the constructors in
    /// [`reducers`](crate::reducers) cover the common folds.
    ///
    /// # Example
    /// ```rust
    /// use manifold::Pipeline;
    ///
    /// # tokio::runtime::Runtime::new().unwrap().block_on(async {
    /// let pipeline = Pipeline::new();
    /// let result = pipeline
    ///     .from_iter(vec![1, 2, 3])
    ///     .scan(0, |sum, x| (sum + x, sum + x))
    ///     .to_vec();
    ///
    /// assert_eq!(result.await.unwrap(), vec![1, 3, 6]);
    /// # });
    /// ```
    pub fn scan<S, R, F>(self, initial: S, step: F) -> Channel<R>
    where
        S: Send + 'static,
        R: Send + 'static,
        F: FnMut(S, T) -> (S, R) + Send + 'static,
    {
        let mut step = step;
        let worker: WorkerFn<T, R> = Box::new(move |ctx| {
            async move {
                let mut state = initial;
                while let Some(value) = ctx.recv(0).await {
                    let (next, output) = step(state, value);
                    state = next;
                    if !ctx.send(output).await {
                        return;
                    }
                }
            }
            .boxed()
        });
        linear_node(self, 0, worker)
    }

    /// Emits how many values have been seen so far, once per input value.
    pub fn running_count(self) -> Channel<u64> {
        self.scan(0u64, |count, _value| (count + 1, count + 1))
    }

    /// For every input value, emits the smallest value seen so far, where
    /// values are ordered by the key `to_key` derives. `keep` decides whether
    /// a key-equal newcomer replaces the current minimum.
    pub fn min_by<K, F>(self, to_key: F, keep: Keep) -> Channel<T>
    where
        T: Clone,
        K: PartialOrd + Send + 'static,
        F: FnMut(&T) -> K + Send + 'static,
    {
        self.running_extreme(to_key, keep, |candidate, best| candidate < best)
    }

    /// For every input value, emits the largest value seen so far, where
    /// values are ordered by the key `to_key` derives. `keep` decides whether
    /// a key-equal newcomer replaces the current maximum.
    pub fn max_by<K, F>(self, to_key: F, keep: Keep) -> Channel<T>
    where
        T: Clone,
        K: PartialOrd + Send + 'static,
        F: FnMut(&T) -> K + Send + 'static,
    {
        self.running_extreme(to_key, keep, |candidate, best| candidate > best)
    }

    fn running_extreme<K, F, B>(self, to_key: F, keep: Keep, beats: B) -> Channel<T>
    where
        T: Clone,
        K: PartialOrd + Send + 'static,
        F: FnMut(&T) -> K + Send + 'static,
        B: Fn(&K, &K) -> bool + Send + 'static,
    {
        let mut to_key = to_key;
        let worker: WorkerFn<T, T> = Box::new(move |ctx| {
            async move {
                let mut best: Option<(K, T)> = None;
                while let Some(value) = ctx.recv(0).await {
                    let key = to_key(&value);
                    let winner = match best.take() {
                        None => (key, value),
                        Some((best_key, best_value)) => {
                            if beats(&key, &best_key)
                                || (keep == Keep::Last && key == best_key)
                            {
                                (key, value)
                            } else {
                                (best_key, best_value)
                            }
                        }
                    };
                    let current = winner.1.clone();
                    best = Some(winner);
                    if !ctx.send(current).await {
                        return;
                    }
                }
            }
            .boxed()
        });
        linear_node(self, 0, worker)
    }
}
