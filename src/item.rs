use futures::FutureExt;

use crate::channel::Channel;
use crate::node::{linear_node, WorkerFn};

/// A value-or-error carrier for pipelines that propagate per-element,
/// possibly recoverable errors alongside values.
///
/// The core never interprets an `Item`; it is a convention for operator
/// chains. A typical flow lifts values with [`Channel::wrap`], lets fallible
/// mappers replace the value with an error, and splits the two cases apart at
/// the end of the chain.
#[derive(Debug)]
pub struct Item<T, E = Box<dyn std::error::Error + Send + Sync>> {
    pub value: Option<T>,
    pub error: Option<E>,
}

impl<T, E> Item<T, E> {
    /// An item carrying a value.
    pub fn ok(value: T) -> Self {
        Item {
            value: Some(value),
            error: None,
        }
    }

    /// An item carrying an error.
    pub fn err(error: E) -> Self {
        Item {
            value: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }
}

impl<T: Send + 'static> Channel<T> {
    /// Wraps every value in an [`Item`] carrying it, for chains that want to
    /// mix values and per-element errors downstream.
    pub fn wrap<E: Send + 'static>(self) -> Channel<Item<T, E>> {
        let worker: WorkerFn<T, Item<T, E>> = Box::new(move |ctx| {
            async move {
                while let Some(value) = ctx.recv(0).await {
                    if !ctx.send(Item::ok(value)).await {
                        return;
                    }
                }
            }
            .boxed()
        });
        linear_node(self, 0, worker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Pipeline;

    #[tokio::test]
    async fn wrap_lifts_values_into_items() {
        let pipeline = Pipeline::new();
        let result = pipeline
            .from_iter(vec![1, 2])
            .wrap::<String>()
            .to_vec();

        let items = result.await.unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(Item::is_ok));
        assert_eq!(items[0].value, Some(1));
        assert_eq!(items[1].value, Some(2));
    }
}
