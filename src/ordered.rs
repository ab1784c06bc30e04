//! The order-preserving concurrent worker.
//!
//! A dispatcher stamps every input value with a monotonically increasing
//! index and hands it to one of `workers` processing tasks. A single
//! reordering task collects the processed values and releases them strictly
//! by index, so the output is the input-ordered subsequence of values the
//! processor kept.
//!
//! Memory is bounded by credits: the reordering task starts by granting
//! `order_buffer` credits and grants one more per released index; the
//! dispatcher must take a credit before it hands out a value. At most
//! `order_buffer + workers` values are therefore in flight at any moment, and
//! the reordering map never holds more than that.

use std::collections::HashMap;
use std::sync::Arc;

use futures::FutureExt;

use crate::node::WorkerCtx;
use crate::worker::{recv_from, spawn_supervised};

struct Sequenced<V> {
    index: u64,
    /// `None` once the processor decided to drop the value: the slot still
    /// travels to the reordering task so the index sequence stays gapless.
    item: Option<V>,
}

pub(crate) async fn ordered_loop<T, R, P>(
    ctx: WorkerCtx<T, R>,
    processor: Arc<P>,
    workers: usize,
    order_buffer: usize,
) where
    T: Send + 'static,
    R: Send + 'static,
    P: Fn(T) -> Option<R> + Send + Sync + 'static,
{
    let (work_sender, work_receiver) = flume::bounded::<Sequenced<T>>(order_buffer + workers);
    let (sorted_sender, sorted_receiver) = flume::bounded::<Sequenced<R>>(order_buffer + workers);
    let (credit_sender, credit_receiver) = flume::bounded::<()>(order_buffer);

    let reordering = spawn_supervised(
        &ctx,
        reorder_loop(ctx.clone(), sorted_receiver, credit_sender, order_buffer).boxed(),
    );

    let mut processing = Vec::with_capacity(workers);
    for _ in 0..workers {
        let worker_ctx = ctx.clone();
        let work_receiver = work_receiver.clone();
        let sorted_sender = sorted_sender.clone();
        let processor = Arc::clone(&processor);
        let task = async move {
            while let Some(Sequenced { index, item }) =
                recv_from(worker_ctx.quit(), &work_receiver).await
            {
                let output = item.and_then(|value| processor(value));
                if sorted_sender
                    .send_async(Sequenced { index, item: output })
                    .await
                    .is_err()
                {
                    return;
                }
            }
        };
        processing.push(spawn_supervised(&ctx, task.boxed()));
    }
    drop(work_receiver);
    drop(sorted_sender);

    let mut index = 0u64;
    while let Some(value) = ctx.recv(0).await {
        if recv_from(ctx.quit(), &credit_receiver).await.is_none() {
            break;
        }
        if work_sender
            .send_async(Sequenced {
                index,
                item: Some(value),
            })
            .await
            .is_err()
        {
            break;
        }
        index += 1;
    }
    drop(work_sender);

    for handle in processing {
        let _ = handle.await;
    }
    // All processing tasks are gone, so the sorted queue is closed and the
    // reordering task drains whatever in-order prefix remains before exiting.
    let _ = reordering.await;
}

async fn reorder_loop<T, R>(
    ctx: WorkerCtx<T, R>,
    sorted: flume::Receiver<Sequenced<R>>,
    credits: flume::Sender<()>,
    order_buffer: usize,
) where
    T: Send + 'static,
    R: Send + 'static,
{
    for _ in 0..order_buffer {
        let _ = credits.try_send(());
    }

    let mut pending: HashMap<u64, Option<R>> = HashMap::new();
    let mut next = 0u64;
    'collect: while let Some(sequenced) = recv_from(ctx.quit(), &sorted).await {
        pending.insert(sequenced.index, sequenced.item);
        while let Some(item) = pending.remove(&next) {
            if let Some(value) = item {
                if !ctx.send(value).await {
                    break 'collect;
                }
            }
            next += 1;
            // Never blocks: at most `order_buffer` credits circulate, one per
            // value between dispatch and release.
            let _ = credits.try_send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::{Concurrency, Pipeline, PipelineError};

    #[tokio::test]
    async fn ordered_map_preserves_input_order() {
        let pipeline = Pipeline::new();
        let result = pipeline
            .from_iter(1..=1000u64)
            .map(|x| x + 10, Concurrency::concurrent_ordered(20))
            .to_vec();

        assert_eq!(result.await.unwrap(), (11..=1010).collect::<Vec<_>>());
        pipeline.done().await;
        assert_eq!(pipeline.error(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn order_survives_skewed_processing_times() {
        let pipeline = Pipeline::new();
        let result = pipeline
            .from_iter(0..50u64)
            .map(
                |x| {
                    // Early values take longest, so completion order inverts
                    // arrival order and the reorder buffer has to work.
                    std::thread::sleep(Duration::from_millis(50 - x));
                    x
                },
                Concurrency::concurrent_ordered(8),
            )
            .to_vec();

        assert_eq!(result.await.unwrap(), (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn ordered_filter_keeps_the_input_subsequence() {
        let pipeline = Pipeline::new();
        let result = pipeline
            .from_iter(0..200u32)
            .filter(|x| x % 3 == 0, Concurrency::concurrent_ordered(7).order_buffer(3))
            .to_vec();

        let expected: Vec<_> = (0..200).filter(|x| x % 3 == 0).collect();
        assert_eq!(result.await.unwrap(), expected);
    }

    #[tokio::test]
    async fn ordered_worker_stops_on_cancellation() {
        let pipeline = Pipeline::new();
        let _result = pipeline
            .from_generator(|i| i)
            .map(|x| x, Concurrency::concurrent_ordered(4))
            .to_vec();

        tokio::time::sleep(Duration::from_millis(20)).await;
        pipeline.cancel(Some(PipelineError::canceled("stop")));
        pipeline.done().await;
        assert_eq!(pipeline.error(), Some(PipelineError::canceled("stop")));
    }

    #[tokio::test]
    async fn a_panicking_processor_cancels_the_pipeline() {
        let pipeline = Pipeline::new();
        let _result = pipeline
            .from_iter(0..100u32)
            .map(
                |x| {
                    if x == 42 {
                        panic!("bad value");
                    }
                    x
                },
                Concurrency::concurrent_ordered(4),
            )
            .to_vec();

        pipeline.done().await;
        assert!(matches!(
            pipeline.error(),
            Some(PipelineError::WorkerPanic(message)) if message.contains("bad value")
        ));
    }
}
