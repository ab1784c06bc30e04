use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::node::{WorkerCtx, WorkerFn};
use crate::options::Concurrency;
use crate::ordered::ordered_loop;

/// Receives from `source`, giving priority to the quit signal: a non-blocking
/// probe first, then a `biased` select so quit wins even when a value is
/// ready at the same time. Returns `None` on quit or when the source closed.
pub(crate) async fn recv_from<V>(
    quit: &CancellationToken,
    source: &flume::Receiver<V>,
) -> Option<V> {
    if quit.is_cancelled() {
        return None;
    }
    tokio::select! {
        biased;
        _ = quit.cancelled() => None,
        received = source.recv_async() => received.ok(),
    }
}

/// Spawns an inner worker task. A panic inside it is caught on the spot and
/// cancels the pipeline, so sibling tasks blocked on queues the panicked task
/// was supposed to feed are released through the quit signal rather than
/// waiting forever.
pub(crate) fn spawn_supervised<T, R>(
    ctx: &WorkerCtx<T, R>,
    task: BoxFuture<'static, ()>,
) -> JoinHandle<()>
where
    T: Send + 'static,
    R: Send + 'static,
{
    let ctx = ctx.clone();
    tokio::spawn(async move {
        if let Err(payload) = AssertUnwindSafe(task).catch_unwind().await {
            ctx.report_panic(payload);
        }
    })
}

/// Runs `task` on `workers` concurrent tasks sharing the node's context, and
/// waits for all of them. A panic in any task is converted into a pipeline
/// cancellation; the remaining tasks wind down through the quit signal.
pub(crate) async fn run_pool<T, R, F>(ctx: &WorkerCtx<T, R>, workers: usize, task: F)
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(WorkerCtx<T, R>) -> BoxFuture<'static, ()>,
{
    let handles: Vec<_> = (0..workers)
        .map(|_| spawn_supervised(ctx, task(ctx.clone())))
        .collect();
    for handle in handles {
        let _ = handle.await;
    }
}

/// Builds a node worker around a per-value processor. `None` from the
/// processor drops the value; `Some(output)` forwards it.
///
/// One worker runs the plain read-process-send loop. Several workers without
/// ordering run that same loop on a pool. Several workers with ordering go
/// through the reordering pipeline in `ordered.rs`.
pub(crate) fn processor_worker<T, R, P>(processor: P, concurrency: Concurrency) -> WorkerFn<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
    P: Fn(T) -> Option<R> + Send + Sync + 'static,
{
    let processor = Arc::new(processor);
    if concurrency.workers <= 1 {
        return Box::new(move |ctx| single_loop(ctx, processor).boxed());
    }

    let workers = concurrency.workers;
    if !concurrency.ordered {
        return Box::new(move |ctx| {
            async move {
                run_pool(&ctx, workers, move |worker_ctx| {
                    single_loop(worker_ctx, Arc::clone(&processor)).boxed()
                })
                .await;
            }
            .boxed()
        });
    }

    let order_buffer = concurrency.order_buffer.max(1);
    Box::new(move |ctx| ordered_loop(ctx, processor, workers, order_buffer).boxed())
}

async fn single_loop<T, R, P>(ctx: WorkerCtx<T, R>, processor: Arc<P>)
where
    P: Fn(T) -> Option<R> + Send + Sync + 'static,
{
    while let Some(value) = ctx.recv(0).await {
        if let Some(output) = processor(value) {
            if !ctx.send(output).await {
                return;
            }
        }
    }
}
