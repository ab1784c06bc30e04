use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::PipelineError;

/// A `Pipeline` is the lifecycle container shared by a set of connected nodes.
///
/// It registers the nodes built by operator calls, starts them, owns the
/// single cancellation/completion state they all observe, and converts worker
/// panics into a terminal error. A pipeline runs once: after [`Pipeline::done`]
/// resolves it cannot be restarted or reused.
///
/// `Pipeline` is a cheap cloneable handle and is safe to share across tasks.
///
/// # Example
/// ```rust
/// use manifold::{Pipeline, Concurrency};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let pipeline = Pipeline::new();
/// let result = pipeline
///     .from_iter(vec![1, 2, 3, 4])
///     .filter(|x| x % 2 == 0, Concurrency::serial())
///     .to_vec();
///
/// assert_eq!(result.await.unwrap(), vec![2, 4]);
/// pipeline.done().await;
/// assert_eq!(pipeline.error(), None);
/// # });
/// ```
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

/// Settings for [`Pipeline::with_config`].
#[derive(Debug, Default)]
pub struct PipelineConfig {
    /// External cancellation context. When the token is cancelled, the
    /// pipeline is cancelled with [`PipelineError::ContextCanceled`].
    pub context: Option<CancellationToken>,
    /// When false (the default), attaching the first sink starts the pipeline
    /// automatically. When true, nothing runs until [`Pipeline::start`].
    pub start_manually: bool,
}

struct PipelineInner {
    done: CancellationToken,
    context: Option<CancellationToken>,
    start_manually: bool,
    state: Mutex<PipelineState>,
}

struct PipelineState {
    started: bool,
    nodes: Vec<Arc<dyn PipelineNode>>,
    error: Option<PipelineError>,
}

/// The node surface the pipeline drives. Implemented by the generic node in
/// `node.rs`; the pipeline itself never sees value types.
pub(crate) trait PipelineNode: Send + Sync {
    fn start(&self);
    fn done_token(&self) -> CancellationToken;
    fn is_sink(&self) -> bool;
}

impl Pipeline {
    /// A pipeline with no external context that starts when its first sink is
    /// attached.
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    /// A pipeline bound to an external cancellation context.
    pub fn with_context(context: CancellationToken) -> Self {
        Self::with_config(PipelineConfig {
            context: Some(context),
            ..PipelineConfig::default()
        })
    }

    /// A pipeline with explicit [`PipelineConfig`] settings.
    pub fn with_config(config: PipelineConfig) -> Self {
        Pipeline {
            inner: Arc::new(PipelineInner {
                done: CancellationToken::new(),
                context: config.context,
                start_manually: config.start_manually,
                state: Mutex::new(PipelineState {
                    started: false,
                    nodes: Vec::new(),
                    error: None,
                }),
            }),
        }
    }

    /// Starts every registered node. Idempotent: only the first call has an
    /// effect.
    ///
    /// The pipeline completes, closing [`Pipeline::done`], when all nodes have
    /// finished, when some worker panics, when [`Pipeline::cancel`] is called,
    /// or when the external context ends, whichever happens first.
    pub fn start(&self) {
        let nodes = {
            let mut state = self.inner.state.lock().unwrap();
            if state.started {
                return;
            }
            state.started = true;
            std::mem::take(&mut state.nodes)
        };
        debug!(nodes = nodes.len(), "starting pipeline");

        if let Some(context) = self.inner.context.clone() {
            let done = self.inner.done.clone();
            let pipeline = self.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = context.cancelled() => pipeline.cancel(Some(PipelineError::ContextCanceled)),
                    _ = done.cancelled() => {}
                }
            });
        }

        if nodes.is_empty() {
            self.cancel(None);
            return;
        }

        let active = Arc::new(AtomicUsize::new(nodes.len()));
        for node in nodes {
            node.start();
            let node_done = node.done_token();
            let active = Arc::clone(&active);
            let pipeline = self.clone();
            tokio::spawn(async move {
                node_done.cancelled().await;
                if active.fetch_sub(1, Ordering::AcqRel) == 1 {
                    pipeline.cancel(None);
                }
            });
        }
    }

    /// Terminates the pipeline.
    ///
    /// `None` marks successful completion; `Some(err)` records `err` as the
    /// terminal error. Only the first call has an effect: once the pipeline is
    /// done, the error is final and later calls are no-ops.
    pub fn cancel(&self, error: Option<PipelineError>) {
        let mut state = self.inner.state.lock().unwrap();
        if self.inner.done.is_cancelled() {
            return;
        }
        if let Some(error) = error {
            debug!(%error, "pipeline canceled");
            state.error = Some(error);
        }
        self.inner.done.cancel();
    }

    /// Resolves when the pipeline has completed, successfully or not.
    pub async fn done(&self) {
        self.inner.done.cancelled().await;
    }

    /// Whether the pipeline has completed, successfully or not.
    pub fn is_done(&self) -> bool {
        self.inner.done.is_cancelled()
    }

    /// The terminal error, if any. `None` while the pipeline is running and
    /// after a successful run; meaningful once [`Pipeline::done`] resolved.
    pub fn error(&self) -> Option<PipelineError> {
        self.inner.state.lock().unwrap().error.clone()
    }

    /// The external cancellation context, if the pipeline was created with one.
    pub fn context(&self) -> Option<&CancellationToken> {
        self.inner.context.as_ref()
    }

    /// Registers a node. Nodes added after the pipeline started (children
    /// created by `flat_map` mappers) are started immediately; a sink
    /// registered before start schedules an automatic start unless the
    /// pipeline was configured with `start_manually`.
    pub(crate) fn add_node(&self, node: Arc<dyn PipelineNode>) {
        let is_sink = node.is_sink();
        {
            let mut state = self.inner.state.lock().unwrap();
            if state.started {
                node.start();
                return;
            }
            state.nodes.push(node);
        }
        if is_sink && !self.inner.start_manually {
            // Started from a task of its own so the caller that attached the
            // sink is not re-entered while it still builds the topology.
            let pipeline = self.clone();
            tokio::spawn(async move { pipeline.start() });
        }
    }

    pub(crate) fn done_token(&self) -> CancellationToken {
        self.inner.done.clone()
    }

    pub(crate) fn downgrade(&self) -> WeakPipeline {
        WeakPipeline(Arc::downgrade(&self.inner))
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Back-reference from nodes to their pipeline. Weak so a pipeline holding
/// its registered nodes does not form a reference cycle.
#[derive(Clone)]
pub(crate) struct WeakPipeline(Weak<PipelineInner>);

impl WeakPipeline {
    pub(crate) fn cancel(&self, error: Option<PipelineError>) {
        if let Some(inner) = self.0.upgrade() {
            Pipeline { inner }.cancel(error);
        }
    }
}
