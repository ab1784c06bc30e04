/// Controls how an operator schedules its per-value work.
///
/// Example:
///
/// ```rust
/// use manifold::Concurrency;
///
/// // 10 concurrent workers, input order preserved, output buffer of 100
/// let concurrency = Concurrency::concurrent_ordered(10).buffered(100);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Concurrency {
    /// How many worker tasks process values concurrently.
    pub(crate) workers: usize,
    /// Whether the output stream must preserve input order.
    pub(crate) ordered: bool,
    /// How many processed values may wait for reordering before the input is
    /// throttled. Only meaningful when `ordered` is set.
    pub(crate) order_buffer: usize,
    /// Capacity of the operator's output channel. The default of zero makes
    /// every hand-off a rendezvous.
    pub(crate) output_buffer: usize,
}

impl Concurrency {
    /// One worker, input order trivially preserved.
    pub fn serial() -> Self {
        Self {
            workers: 1,
            ordered: true,
            order_buffer: 1,
            output_buffer: 0,
        }
    }

    /// `workers` concurrent workers with no ordering guarantee on the output.
    pub fn concurrent(workers: usize) -> Self {
        assert!(workers >= 1, "concurrency requires at least one worker");
        Self {
            workers,
            ordered: false,
            order_buffer: workers,
            output_buffer: 0,
        }
    }

    /// `workers` concurrent workers; the output preserves input order.
    ///
    /// The reordering window defaults to `workers` and can be widened with
    /// [`Concurrency::order_buffer`].
    pub fn concurrent_ordered(workers: usize) -> Self {
        assert!(workers >= 1, "concurrency requires at least one worker");
        Self {
            workers,
            ordered: true,
            order_buffer: workers,
            output_buffer: 0,
        }
    }

    /// How many processed values may be held back for reordering before the
    /// input is throttled (default = the worker count).
    pub fn order_buffer(self, size: usize) -> Self {
        assert!(size >= 1, "ordering requires a buffer of at least one");
        Self {
            order_buffer: size,
            ..self
        }
    }

    /// Buffer up to `size` output values before the downstream consumer reads
    /// them (default = 0, i.e. unbuffered).
    pub fn buffered(self, size: usize) -> Self {
        Self {
            output_buffer: size,
            ..self
        }
    }
}

impl Default for Concurrency {
    fn default() -> Self {
        Self::serial()
    }
}

/// Which of two key-equal values wins in keyed operators such as
/// [`Channel::to_map`](crate::Channel::to_map), [`Channel::min_by`](crate::Channel::min_by)
/// and [`Channel::max_by`](crate::Channel::max_by).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keep {
    /// Keep the value seen first; later ties are ignored.
    First,
    /// Keep the value seen last; later ties replace earlier ones.
    Last,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let serial = Concurrency::default();
        assert_eq!(serial.workers, 1);
        assert_eq!(serial.output_buffer, 0);

        let concurrent = Concurrency::concurrent_ordered(8);
        assert_eq!(concurrent.order_buffer, 8);
        assert_eq!(concurrent.order_buffer(32).order_buffer, 32);
    }

    #[test]
    #[should_panic(expected = "at least one worker")]
    fn zero_workers_is_a_contract_violation() {
        let _ = Concurrency::concurrent(0);
    }
}
