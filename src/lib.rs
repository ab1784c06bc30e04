//! Typed, composable dataflow pipelines of concurrent stream operators.
//!
//! A [`Pipeline`] coordinates a directed graph of nodes. Each node runs on a
//! task of its own and talks to its neighbours through bounded typed
//! channels: sources emit values, operators such as [`Channel::map`],
//! [`Channel::filter`], [`Channel::batch`] or [`merge`] reshape the stream,
//! and sinks such as [`Channel::to_vec`] or [`Channel::for_each`] consume it
//! and hand back a single-shot result. The pipeline gives all of them one
//! shared cancellation and completion state, and turns worker panics into a
//! terminal error instead of a crash.
//!
//! ```rust
//! use manifold::{Pipeline, Concurrency};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let pipeline = Pipeline::new();
//! let result = pipeline
//!     .from_iter(1..=100)
//!     .map(|x| x * 2, Concurrency::concurrent_ordered(8))
//!     .filter(|x| x % 3 == 0, Concurrency::serial())
//!     .to_vec();
//!
//! let values = result.await.unwrap();
//! assert_eq!(values.first(), Some(&6));
//!
//! pipeline.done().await;
//! assert_eq!(pipeline.error(), None);
//! # });
//! ```
//!
//! # Backpressure and cancellation
//!
//! Channels are rendezvous by default: a fast producer advances only as fast
//! as its consumer reads, unless a [`Channel::buffer`] or a `buffered`
//! concurrency setting loosens the coupling. Termination flows both ways.
//! Closing an output tells the downstream node there is nothing more to read;
//! a consumer that stops early (a [`Channel::take`] that is satisfied, a
//! dropped channel) unsubscribes from its producer, and a node whose outputs
//! are all unsubscribed stops and releases its own inputs in turn, all the
//! way back to the source.
//!
//! # Concurrency
//!
//! Operators that accept a [`Concurrency`] value can run their per-value work
//! on several workers. Unordered concurrency emits results as they finish;
//! ordered concurrency runs just as parallel but restores input order on the
//! output, holding back at most a configurable window of out-of-order
//! results.
//!
//! The crate runs on Tokio and spawns its tasks on the current runtime.

mod channel;
mod error;
mod item;
mod node;
mod ops;
mod options;
mod ordered;
mod pipeline;
pub mod reducers;
mod worker;

#[cfg(test)]
mod test_utils;

pub use channel::Channel;
pub use error::PipelineError;
pub use item::Item;
pub use ops::concat::concat;
pub use ops::merge::merge;
pub use options::{Concurrency, Keep};
pub use pipeline::{Pipeline, PipelineConfig};
pub use tokio_util::sync::CancellationToken;
