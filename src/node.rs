use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::channel::Channel;
use crate::error::PipelineError;
use crate::pipeline::{Pipeline, PipelineNode, WeakPipeline};
use crate::worker::recv_from;

/// The body of a node: a one-shot async function run against the node's
/// [`WorkerCtx`] on the node's own task.
pub(crate) type WorkerFn<T, R> =
    Box<dyn FnOnce(WorkerCtx<T, R>) -> BoxFuture<'static, ()> + Send>;

/// Per-output subscription flags of one node, plus the aggregate
/// all-unsubscribed signal. Closing a subscription is idempotent; the
/// aggregate closes once when the last subscription does.
pub(crate) struct SubscriptionSet {
    closed: Mutex<Vec<bool>>,
    tokens: Vec<CancellationToken>,
    all_unsubscribed: CancellationToken,
}

impl SubscriptionSet {
    pub(crate) fn new(outputs: usize) -> Arc<Self> {
        Arc::new(SubscriptionSet {
            closed: Mutex::new(vec![false; outputs]),
            tokens: (0..outputs).map(|_| CancellationToken::new()).collect(),
            all_unsubscribed: CancellationToken::new(),
        })
    }

    fn unsubscribe(&self, index: usize) {
        let mut closed = self.closed.lock().unwrap();
        if closed[index] {
            return;
        }
        closed[index] = true;
        self.tokens[index].cancel();
        if closed.iter().all(|flag| *flag) {
            self.all_unsubscribed.cancel();
        }
    }

    pub(crate) fn token(&self, index: usize) -> &CancellationToken {
        &self.tokens[index]
    }

    pub(crate) fn all_unsubscribed(&self) -> &CancellationToken {
        &self.all_unsubscribed
    }
}

/// Handle through which a consumer tells a producing node that one of its
/// outputs lost its reader.
#[derive(Clone)]
pub(crate) struct Unsubscriber {
    set: Arc<SubscriptionSet>,
    index: usize,
}

impl Unsubscriber {
    pub(crate) fn new(set: &Arc<SubscriptionSet>, index: usize) -> Self {
        Unsubscriber {
            set: Arc::clone(set),
            index,
        }
    }

    pub(crate) fn unsubscribe(&self) {
        self.set.unsubscribe(self.index);
    }
}

/// The capabilities a worker body gets: its input receivers, its output
/// senders, the node's quit signal, and panic reporting. Cloneable so a
/// worker body can fan itself out over several tasks that share the node.
pub(crate) struct WorkerCtx<T, R> {
    inputs: Vec<flume::Receiver<T>>,
    outputs: Vec<flume::Sender<R>>,
    subscriptions: Arc<SubscriptionSet>,
    quit: CancellationToken,
    pipeline: WeakPipeline,
}

impl<T, R> Clone for WorkerCtx<T, R> {
    fn clone(&self) -> Self {
        WorkerCtx {
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            subscriptions: Arc::clone(&self.subscriptions),
            quit: self.quit.clone(),
            pipeline: self.pipeline.clone(),
        }
    }
}

impl<T, R> WorkerCtx<T, R> {
    /// Receives the next value from input `index`. Returns `None` when the
    /// input closed or the quit signal fired; quit wins over a ready value.
    pub(crate) async fn recv(&self, index: usize) -> Option<T> {
        recv_from(&self.quit, &self.inputs[index]).await
    }

    /// Delivers `value` on the node's output. Returns false when the quit
    /// signal fired, when every output lost its subscriber, or when the
    /// output closed; the worker should stop then. A node without outputs
    /// accepts every value trivially.
    pub(crate) async fn send(&self, value: R) -> bool {
        let Some(output) = self.outputs.first() else {
            return true;
        };
        debug_assert_eq!(self.outputs.len(), 1, "fan-out nodes deliver with send_to_each");
        if self.quit.is_cancelled() {
            return false;
        }
        tokio::select! {
            biased;
            _ = self.quit.cancelled() => false,
            _ = self.subscriptions.all_unsubscribed().cancelled() => false,
            sent = output.send_async(value) => sent.is_ok(),
        }
    }

    pub(crate) fn inputs(&self) -> &[flume::Receiver<T>] {
        &self.inputs
    }

    pub(crate) fn input(&self, index: usize) -> &flume::Receiver<T> {
        &self.inputs[index]
    }

    pub(crate) fn quit(&self) -> &CancellationToken {
        &self.quit
    }

    /// Converts a caught panic payload into a pipeline cancellation.
    pub(crate) fn report_panic(&self, payload: Box<dyn std::any::Any + Send>) {
        let panic = PipelineError::from_panic(payload);
        error!(%panic, "worker task panicked");
        self.pipeline.cancel(Some(panic));
    }
}

impl<T, R: Clone> WorkerCtx<T, R> {
    /// Delivers `value` to every output in registration order, skipping
    /// outputs whose subscription closed. Returns true when at least one
    /// output accepted the value; false as soon as the quit signal fires or
    /// when no live subscriber is left.
    pub(crate) async fn send_to_each(&self, value: R) -> bool {
        let mut delivered = false;
        for (index, output) in self.outputs.iter().enumerate() {
            if self.quit.is_cancelled() {
                return false;
            }
            let subscription = self.subscriptions.token(index);
            if subscription.is_cancelled() {
                continue;
            }
            tokio::select! {
                biased;
                _ = self.quit.cancelled() => return false,
                _ = subscription.cancelled() => {}
                sent = output.send_async(value.clone()) => {
                    if sent.is_ok() {
                        delivered = true;
                    }
                }
            }
        }
        delivered
    }
}

struct NodePayload<T, R> {
    worker: WorkerFn<T, R>,
    ctx: WorkerCtx<T, R>,
}

/// A single execution unit: a worker body plus its wiring. Registered with a
/// pipeline, started once, and reporting completion through its done token.
pub(crate) struct Node<T, R> {
    payload: Mutex<Option<NodePayload<T, R>>>,
    quit: CancellationToken,
    done: CancellationToken,
    pipeline_done: CancellationToken,
    pipeline: WeakPipeline,
    subscriptions: Arc<SubscriptionSet>,
    input_hooks: Vec<Unsubscriber>,
    sink: bool,
}

impl<T, R> PipelineNode for Node<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    fn start(&self) {
        let Some(NodePayload { worker, ctx }) = self.payload.lock().unwrap().take() else {
            return;
        };

        // Supervisor: whichever of pipeline completion and loss of the last
        // subscriber happens first closes the quit signal. Losing the last
        // subscriber also releases the upstream inputs right away.
        let quit = self.quit.clone();
        let pipeline_done = self.pipeline_done.clone();
        let all_unsubscribed = self.subscriptions.all_unsubscribed().clone();
        let hooks = self.input_hooks.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = pipeline_done.cancelled() => {}
                _ = all_unsubscribed.cancelled() => {
                    for hook in &hooks {
                        hook.unsubscribe();
                    }
                }
            }
            quit.cancel();
        });

        // The worker runs on a task of its own so a panic inside it unwinds
        // that task only; the join error carries the payload out.
        let running = tokio::spawn(worker(ctx));
        let pipeline = self.pipeline.clone();
        let done = self.done.clone();
        let hooks = self.input_hooks.clone();
        tokio::spawn(async move {
            if let Err(join_error) = running.await {
                if join_error.is_panic() {
                    let panic = PipelineError::from_panic(join_error.into_panic());
                    error!(%panic, "node worker panicked");
                    pipeline.cancel(Some(panic));
                }
            }
            // Output senders died with the worker task, closing the outputs.
            for hook in &hooks {
                hook.unsubscribe();
            }
            done.cancel();
        });
    }

    fn done_token(&self) -> CancellationToken {
        self.done.clone()
    }

    fn is_sink(&self) -> bool {
        self.sink
    }
}

fn assemble<T, R>(
    pipeline: &Pipeline,
    inputs: Vec<(flume::Receiver<T>, Unsubscriber)>,
    outputs: Vec<flume::Sender<R>>,
    subscriptions: Arc<SubscriptionSet>,
    worker: WorkerFn<T, R>,
) where
    T: Send + 'static,
    R: Send + 'static,
{
    let sink = outputs.is_empty();
    let (input_receivers, input_hooks): (Vec<_>, Vec<_>) = inputs.into_iter().unzip();
    let quit = CancellationToken::new();
    let ctx = WorkerCtx {
        inputs: input_receivers,
        outputs,
        subscriptions: Arc::clone(&subscriptions),
        quit: quit.clone(),
        pipeline: pipeline.downgrade(),
    };
    let node = Arc::new(Node {
        payload: Mutex::new(Some(NodePayload { worker, ctx })),
        quit,
        done: CancellationToken::new(),
        pipeline_done: pipeline.done_token(),
        pipeline: pipeline.downgrade(),
        subscriptions,
        input_hooks,
        sink,
    });
    pipeline.add_node(node);
}

/// A node with no inputs and one output.
pub(crate) fn source_node<R>(
    pipeline: &Pipeline,
    output_buffer: usize,
    worker: WorkerFn<(), R>,
) -> Channel<R>
where
    R: Send + 'static,
{
    let subscriptions = SubscriptionSet::new(1);
    let (sender, receiver) = flume::bounded(output_buffer);
    assemble(pipeline, Vec::new(), vec![sender], Arc::clone(&subscriptions), worker);
    Channel::new(
        pipeline.clone(),
        receiver,
        Unsubscriber::new(&subscriptions, 0),
    )
}

/// A node with one input and one output.
pub(crate) fn linear_node<T, R>(
    input: Channel<T>,
    output_buffer: usize,
    worker: WorkerFn<T, R>,
) -> Channel<R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    let (pipeline, receiver, hook) = input.claim();
    let subscriptions = SubscriptionSet::new(1);
    let (sender, out_receiver) = flume::bounded(output_buffer);
    assemble(
        &pipeline,
        vec![(receiver, hook)],
        vec![sender],
        Arc::clone(&subscriptions),
        worker,
    );
    Channel::new(pipeline, out_receiver, Unsubscriber::new(&subscriptions, 0))
}

/// A node with several inputs of the same type and one output.
pub(crate) fn combine_node<T>(
    inputs: Vec<Channel<T>>,
    output_buffer: usize,
    worker: WorkerFn<T, T>,
) -> Channel<T>
where
    T: Send + 'static,
{
    assert!(!inputs.is_empty(), "a combining node needs at least one input");
    let parts: Vec<_> = inputs.into_iter().map(Channel::claim).collect();
    let pipeline = parts[0].0.clone();
    let inputs = parts
        .into_iter()
        .map(|(_, receiver, hook)| (receiver, hook))
        .collect();
    let subscriptions = SubscriptionSet::new(1);
    let (sender, out_receiver) = flume::bounded(output_buffer);
    assemble(
        &pipeline,
        inputs,
        vec![sender],
        Arc::clone(&subscriptions),
        worker,
    );
    Channel::new(pipeline, out_receiver, Unsubscriber::new(&subscriptions, 0))
}

/// A node with one input and `consumers` distinct output channels, each with
/// its own queue of capacity `buffer`. The worker delivers to every live
/// output via [`WorkerCtx::send_to_each`].
pub(crate) fn fanout_node<T>(
    input: Channel<T>,
    consumers: usize,
    buffer: usize,
    worker: WorkerFn<T, T>,
) -> Vec<Channel<T>>
where
    T: Send + 'static,
{
    assert!(consumers >= 1, "a fan-out node needs at least one output");
    let (pipeline, receiver, hook) = input.claim();
    let subscriptions = SubscriptionSet::new(consumers);
    let mut senders = Vec::with_capacity(consumers);
    let mut channels = Vec::with_capacity(consumers);
    for index in 0..consumers {
        let (sender, out_receiver) = flume::bounded(buffer);
        senders.push(sender);
        channels.push(Channel::new(
            pipeline.clone(),
            out_receiver,
            Unsubscriber::new(&subscriptions, index),
        ));
    }
    assemble(
        &pipeline,
        vec![(receiver, hook)],
        senders,
        subscriptions,
        worker,
    );
    channels
}

/// A node with one input and `consumers` output channels all backed by one
/// shared queue of capacity `buffer`: each value goes to whichever live
/// consumer is first to take it.
pub(crate) fn shared_fanout_node<T>(
    input: Channel<T>,
    consumers: usize,
    buffer: usize,
    worker: WorkerFn<T, T>,
) -> Vec<Channel<T>>
where
    T: Send + 'static,
{
    assert!(consumers >= 1, "a fan-out node needs at least one output");
    let (pipeline, receiver, hook) = input.claim();
    let subscriptions = SubscriptionSet::new(consumers);
    let (sender, shared_receiver) = flume::bounded(buffer);
    let channels = (0..consumers)
        .map(|index| {
            Channel::new(
                pipeline.clone(),
                shared_receiver.clone(),
                Unsubscriber::new(&subscriptions, index),
            )
        })
        .collect();
    drop(shared_receiver);
    assemble(
        &pipeline,
        vec![(receiver, hook)],
        vec![sender],
        subscriptions,
        worker,
    );
    channels
}

/// A node with one input and no outputs.
pub(crate) fn sink_node<T>(input: Channel<T>, worker: WorkerFn<T, ()>)
where
    T: Send + 'static,
{
    let (pipeline, receiver, hook) = input.claim();
    let subscriptions = SubscriptionSet::new(0);
    assemble(
        &pipeline,
        vec![(receiver, hook)],
        Vec::new(),
        subscriptions,
        worker,
    );
}
