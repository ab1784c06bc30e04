use crate::node::Unsubscriber;
use crate::pipeline::Pipeline;

/// A typed stream of values flowing out of one node, to be consumed by
/// exactly one downstream node.
///
/// A `Channel` is obtained from one of the [`Pipeline`] source methods and is
/// extended by chaining operator methods, each of which consumes the channel
/// and returns a new one:
///
/// ```rust
/// use manifold::{Pipeline, Concurrency};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let pipeline = Pipeline::new();
/// let result = pipeline
///     .from_iter(1..=10)
///     .map(|x| x * x, Concurrency::concurrent_ordered(4))
///     .take(3)
///     .to_vec();
///
/// assert_eq!(result.await.unwrap(), vec![1, 4, 9]);
/// # });
/// ```
///
/// Ownership enforces the single-consumer contract: a channel that has been
/// passed to an operator cannot be attached anywhere else. Dropping an
/// unconsumed `Channel` unsubscribes it, telling the producing node that this
/// output has no reader; when all outputs of a node are unsubscribed the node
/// stops and releases its own inputs.
pub struct Channel<T> {
    pipeline: Pipeline,
    receiver: flume::Receiver<T>,
    unsubscriber: Unsubscriber,
    claimed: bool,
}

impl<T> Channel<T> {
    pub(crate) fn new(
        pipeline: Pipeline,
        receiver: flume::Receiver<T>,
        unsubscriber: Unsubscriber,
    ) -> Self {
        Channel {
            pipeline,
            receiver,
            unsubscriber,
            claimed: false,
        }
    }

    /// The pipeline this channel belongs to.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Signals the producing node that this channel has no further reader.
    /// Idempotent. The channel is not drained or closed; values already in
    /// flight stay where they are.
    pub fn unsubscribe(&self) {
        self.unsubscriber.unsubscribe();
    }

    /// Takes the wiring out of the channel so a node constructor can own it.
    /// The drop-time unsubscribe is defused; the consuming node takes over
    /// responsibility for unsubscribing on exit.
    pub(crate) fn claim(mut self) -> (Pipeline, flume::Receiver<T>, Unsubscriber) {
        self.claimed = true;
        (
            self.pipeline.clone(),
            self.receiver.clone(),
            self.unsubscriber.clone(),
        )
    }
}

impl<T> Drop for Channel<T> {
    fn drop(&mut self) {
        if !self.claimed {
            self.unsubscriber.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Concurrency, Pipeline};

    #[tokio::test]
    async fn dropping_a_channel_unsubscribes_it() {
        let pipeline = Pipeline::new();
        let unread = pipeline.from_generator(|i| i).map(|x| x, Concurrency::serial());
        drop(unread);

        // With no reader anywhere, unsubscription cascades back to the
        // infinite source and the pipeline drains to completion.
        pipeline.start();
        pipeline.done().await;
        assert_eq!(pipeline.error(), None);
    }

    #[tokio::test]
    async fn explicit_unsubscribe_stops_the_producer() {
        let pipeline = Pipeline::new();
        let output = pipeline.from_generator(|i| i);
        output.unsubscribe();
        drop(output);

        pipeline.start();
        pipeline.done().await;
        assert_eq!(pipeline.error(), None);
    }
}
