//! Ready-made step functions for [`Channel::scan`](crate::Channel::scan) and
//! [`Channel::reduce`](crate::Channel::reduce).
//!
//! A scan step takes the accumulated state and the next value and returns the
//! new state together with the value to emit. These constructors cover the
//! usual folds so call sites stay short:
//!
//! ```rust
//! use manifold::{reducers, Pipeline};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let pipeline = Pipeline::new();
//! let result = pipeline
//!     .from_iter(vec![1, 2, 3])
//!     .scan(0, reducers::sum_reducer())
//!     .to_vec();
//!
//! assert_eq!(result.await.unwrap(), vec![1, 3, 6]);
//! # });
//! ```

use std::ops::Add;

/// Lifts a plain fold step, in which state and emitted value are one and the
/// same, into a scan step that emits the state after every value.
pub fn simple_reducer<S, T, F>(mut step: F) -> impl FnMut(S, T) -> (S, S)
where
    S: Clone,
    F: FnMut(S, T) -> S,
{
    move |state, value| {
        let state = step(state, value);
        (state.clone(), state)
    }
}

/// A running sum.
pub fn sum_reducer<T>() -> impl FnMut(T, T) -> (T, T)
where
    T: Add<Output = T> + Clone,
{
    simple_reducer(|sum: T, value: T| sum + value)
}

/// A running count of values seen.
pub fn count_reducer<T>() -> impl FnMut(u64, T) -> (u64, u64) {
    simple_reducer(|count, _value| count + 1)
}

/// The smallest value seen so far. State is `None` until the first value.
pub fn min_reducer<T>() -> impl FnMut(Option<T>, T) -> (Option<T>, T)
where
    T: PartialOrd + Clone,
{
    move |state, value| {
        let smallest = match state {
            Some(current) if current < value => current,
            _ => value,
        };
        (Some(smallest.clone()), smallest)
    }
}

/// The largest value seen so far. State is `None` until the first value.
pub fn max_reducer<T>() -> impl FnMut(Option<T>, T) -> (Option<T>, T)
where
    T: PartialOrd + Clone,
{
    move |state, value| {
        let largest = match state {
            Some(current) if current > value => current,
            _ => value,
        };
        (Some(largest.clone()), largest)
    }
}

/// The running average of all values seen, as `f64`. State is the pair of
/// running sum and count.
pub fn avg_reducer<T>() -> impl FnMut((f64, u64), T) -> ((f64, u64), f64)
where
    T: Into<f64>,
{
    move |(sum, count), value| {
        let sum = sum + value.into();
        let count = count + 1;
        ((sum, count), sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Pipeline;

    #[tokio::test]
    async fn running_folds() {
        let pipeline = Pipeline::new();
        let sums = pipeline
            .from_iter(vec![1, 2, 3, 4])
            .scan(0, sum_reducer())
            .to_vec();
        assert_eq!(sums.await.unwrap(), vec![1, 3, 6, 10]);

        let pipeline = Pipeline::new();
        let counts = pipeline
            .from_iter(vec!["a", "b"])
            .scan(0, count_reducer())
            .to_vec();
        assert_eq!(counts.await.unwrap(), vec![1, 2]);

        let pipeline = Pipeline::new();
        let minima = pipeline
            .from_iter(vec![5, 7, 2, 9])
            .scan(None, min_reducer())
            .to_vec();
        assert_eq!(minima.await.unwrap(), vec![5, 5, 2, 2]);

        let pipeline = Pipeline::new();
        let maxima = pipeline
            .from_iter(vec![5, 7, 2, 9])
            .scan(None, max_reducer())
            .to_vec();
        assert_eq!(maxima.await.unwrap(), vec![5, 7, 7, 9]);
    }

    #[tokio::test]
    async fn running_average() {
        let pipeline = Pipeline::new();
        let averages = pipeline
            .from_iter(vec![1u32, 2, 3])
            .scan((0.0, 0), avg_reducer())
            .to_vec();
        assert_eq!(averages.await.unwrap(), vec![1.0, 1.5, 2.0]);
    }
}
