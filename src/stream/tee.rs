//! Multi-consumer fan-out over one source stream (spec component J).
//!
//! A [`Tee`] owns a single upstream [`Stream`] and a [`RingBuffer`] of the
//! elements it has pulled so far. Each registered consumer tracks its own
//! read position; the tee only pulls from upstream when the *slowest*
//! consumer needs an element that isn't buffered yet, and only evicts a
//! buffered element once every consumer has read past it. There is no
//! background thread: "pull upstream, append to the buffer, wake whoever's
//! waiting" all happens inline inside whichever consumer's `next` call
//! first needs the next upstream element, consistent with this crate's
//! synchronous pull-based design (see `stream::mod`).

use super::Stream;
use crate::error::StreamError;
use super::ring_buffer::RingBuffer;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared state between a [`Tee`] and its [`TeeConsumer`]s.
struct Shared<S: Stream> {
    source: S,
    buffer: RingBuffer<S::Item>,
    /// `Some` once the source has signalled end-of-stream or failed; all
    /// consumers see the same terminal outcome from that point on.
    terminal: Option<Result<(), StreamError>>,
    /// Read position of each still-open consumer, by id.
    positions: Vec<Option<usize>>,
}

impl<S: Stream> Shared<S>
where
    S::Item: Clone,
{
    fn pull_until(&mut self, target_index: usize) -> Result<(), StreamError> {
        while self.buffer.next_index() <= target_index {
            if let Some(outcome) = &self.terminal {
                return outcome.clone_result();
            }
            match self.source.next() {
                Ok(Some(item)) => {
                    self.buffer.append(item);
                }
                Ok(None) => {
                    self.terminal = Some(Ok(()));
                    return Ok(());
                }
                Err(e) => {
                    self.terminal = Some(Err(e.clone()));
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn trim_to_slowest(&mut self) {
        let min_position = self
            .positions
            .iter()
            .flatten()
            .copied()
            .min();
        if let Some(min_position) = min_position {
            self.buffer.trim_to(min_position);
        }
    }
}

/// Helper trait so `Option<Result<(), StreamError>>` can be turned back
/// into a cloned `Result` without awkward match-cloning at each call site.
trait CloneResult {
    fn clone_result(&self) -> Result<(), StreamError>;
}

impl CloneResult for Result<(), StreamError> {
    fn clone_result(&self) -> Result<(), StreamError> {
        match self {
            Ok(()) => Ok(()),
            Err(e) => Err(e.clone()),
        }
    }
}

/// Configuration for a [`Tee`]. `buffer_capacity` is the farthest a fast
/// consumer may run ahead of the slowest one before that consumer starts
/// seeing [`StreamError::ConsumerTooSlow`].
#[derive(Debug, Clone)]
pub struct TeeOptions {
    /// Ring buffer capacity, in elements.
    pub buffer_capacity: usize,
}

impl Default for TeeOptions {
    fn default() -> Self {
        Self { buffer_capacity: 1024 }
    }
}

/// Owns the upstream source and hands out [`TeeConsumer`] handles.
pub struct Tee<S: Stream>
where
    S::Item: Clone,
{
    shared: Rc<RefCell<Shared<S>>>,
}

impl<S: Stream> Tee<S>
where
    S::Item: Clone,
{
    /// Wraps `source` in a tee per `options`.
    pub fn new(source: S, options: TeeOptions) -> Self {
        Tee {
            shared: Rc::new(RefCell::new(Shared {
                source,
                buffer: RingBuffer::new(options.buffer_capacity.max(1)),
                terminal: None,
                positions: Vec::new(),
            })),
        }
    }

    /// Registers a new consumer, starting from the current tail of the
    /// buffer (it will not see elements already evicted before it joined).
    pub fn create_consumer(&self) -> TeeConsumer<S> {
        let mut shared = self.shared.borrow_mut();
        let start = shared.buffer.base_index();
        let id = shared.positions.len();
        shared.positions.push(Some(start));
        TeeConsumer {
            shared: Rc::clone(&self.shared),
            id,
            position: start,
        }
    }
}

/// One consumer's view into a [`Tee`]'s shared buffer.
pub struct TeeConsumer<S: Stream>
where
    S::Item: Clone,
{
    shared: Rc<RefCell<Shared<S>>>,
    id: usize,
    position: usize,
}

impl<S: Stream> TeeConsumer<S>
where
    S::Item: Clone,
{
    /// Closes this consumer, excluding it from the slowest-consumer
    /// calculation so the buffer can trim past its last read position.
    pub fn close(mut self) {
        self.close_mut();
    }

    fn close_mut(&mut self) {
        let mut shared = self.shared.borrow_mut();
        if let Some(slot) = shared.positions.get_mut(self.id) {
            *slot = None;
        }
        shared.trim_to_slowest();
    }
}

impl<S: Stream> Drop for TeeConsumer<S>
where
    S::Item: Clone,
{
    fn drop(&mut self) {
        self.close_mut();
    }
}

impl<S: Stream> Stream for TeeConsumer<S>
where
    S::Item: Clone,
{
    type Item = S::Item;

    fn next(&mut self) -> Result<Option<Self::Item>, StreamError> {
        let mut shared = self.shared.borrow_mut();
        if shared.buffer.was_evicted(self.position) {
            return Err(StreamError::ConsumerTooSlow(self.id));
        }
        if !shared.buffer.is_available(self.position) {
            shared.pull_until(self.position)?;
        }
        let item = match shared.buffer.element(self.position) {
            Some(item) => Some(item.clone()),
            None => None,
        };
        if item.is_some() {
            self.position += 1;
            if let Some(slot) = shared.positions.get_mut(self.id) {
                *slot = Some(self.position);
            }
            shared.trim_to_slowest();
        }
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::from_iter;

    fn opts(buffer_capacity: usize) -> TeeOptions {
        TeeOptions { buffer_capacity }
    }

    #[test]
    fn two_consumers_see_the_same_elements_at_their_own_pace() {
        let tee = Tee::new(from_iter(vec![1, 2, 3, 4, 5]), opts(8));
        let mut fast = tee.create_consumer();
        let mut slow = tee.create_consumer();

        assert_eq!(fast.next().unwrap(), Some(1));
        assert_eq!(fast.next().unwrap(), Some(2));
        assert_eq!(fast.next().unwrap(), Some(3));

        assert_eq!(slow.next().unwrap(), Some(1));
        assert_eq!(slow.next().unwrap(), Some(2));

        assert_eq!(fast.collect().unwrap(), vec![4, 5]);
        assert_eq!(slow.collect().unwrap(), vec![3, 4, 5]);
    }

    #[test]
    fn a_too_slow_consumer_sees_consumer_too_slow() {
        let tee = Tee::new(from_iter(vec![1, 2, 3, 4, 5]), opts(2));
        let mut fast = tee.create_consumer();
        let mut slow = tee.create_consumer();

        for _ in 0..5 {
            fast.next().unwrap();
        }
        assert!(fast.next().unwrap().is_none());

        let err = slow.next().unwrap_err();
        assert!(matches!(err, StreamError::ConsumerTooSlow(_)));
    }

    #[test]
    fn closing_a_consumer_lets_the_buffer_trim_past_it() {
        let tee = Tee::new(from_iter(vec![1, 2, 3, 4]), opts(2));
        let mut a = tee.create_consumer();
        let b = tee.create_consumer();

        assert_eq!(a.next().unwrap(), Some(1));
        b.close();
        assert_eq!(a.next().unwrap(), Some(2));
        assert_eq!(a.collect().unwrap(), vec![3, 4]);
    }

    #[test]
    fn a_single_consumer_reproduces_the_source_in_order() {
        let tee = Tee::new(from_iter(vec![10, 20, 30]), opts(4));
        let only = tee.create_consumer();
        assert_eq!(only.collect().unwrap(), vec![10, 20, 30]);
    }
}
