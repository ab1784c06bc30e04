use std::collections::HashSet;
use std::hash::Hash;

use futures::FutureExt;

use crate::channel::Channel;
use crate::node::{linear_node, WorkerFn};

impl<T: Send + 'static> Channel<T> {
    /// Forwards only the first value seen for each key; later values with an
    /// already-seen key are dropped.
    ///
    /// Every distinct key is remembered for the lifetime of the node, so an
    /// unbounded key space means unbounded memory.
    pub fn distinct<K, F>(self, key: F) -> Channel<T>
    where
        K: Eq + Hash + Send + 'static,
        F: FnMut(&T) -> K + Send + 'static,
    {
        let mut key = key;
        let worker: WorkerFn<T, T> = Box::new(move |ctx| {
            async move {
                let mut seen = HashSet::new();
                while let Some(value) = ctx.recv(0).await {
                    if seen.insert(key(&value)) {
                        if !ctx.send(value).await {
                            return;
                        }
                    }
                }
            }
            .boxed()
        });
        linear_node(self, 0, worker)
    }
}
