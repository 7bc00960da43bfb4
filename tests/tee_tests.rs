//! Integration tests for multi-consumer stream fan-out.

use aro::error::StreamError;
use aro::stream::tee::{Tee, TeeOptions};
use aro::stream::{from_iter, Stream};
use pretty_assertions::assert_eq;

fn opts(buffer_capacity: usize) -> TeeOptions {
    TeeOptions { buffer_capacity }
}

#[test]
fn two_consumers_reproduce_the_same_source_independently() {
    let tee = Tee::new(from_iter(1..=100), opts(16));
    let a = tee.create_consumer();
    let b = tee.create_consumer();

    let a_items = a.collect().unwrap();
    let b_items = b.collect().unwrap();
    assert_eq!(a_items, (1..=100).collect::<Vec<_>>());
    assert_eq!(b_items, (1..=100).collect::<Vec<_>>());
}

#[test]
fn a_single_consumer_keeps_pace_with_a_buffer_narrower_than_the_source() {
    let tee = Tee::new(from_iter(1..=50), opts(4));
    let only = tee.create_consumer();
    assert_eq!(only.collect().unwrap(), (1..=50).collect::<Vec<_>>());
}

#[test]
fn a_consumer_that_falls_further_behind_than_the_buffer_holds_is_rejected() {
    let tee = Tee::new(from_iter(1..=50), opts(4));
    let mut fast = tee.create_consumer();
    let mut slow = tee.create_consumer();

    for _ in 0..20 {
        fast.next().unwrap();
    }

    let result = slow.next();
    assert!(matches!(result, Err(StreamError::ConsumerTooSlow(_))));
}

#[test]
fn closing_a_consumer_allows_the_others_to_advance_past_its_position() {
    let tee = Tee::new(from_iter(1..=20), opts(4));
    let stalled = tee.create_consumer();
    let mut runner = tee.create_consumer();

    stalled.close();
    let items = runner.collect().unwrap();
    assert_eq!(items, (1..=20).collect::<Vec<_>>());
}

#[test]
fn interleaved_pulls_still_see_every_element_exactly_once_per_consumer() {
    let tee = Tee::new(from_iter(1..=6), opts(8));
    let mut a = tee.create_consumer();
    let mut b = tee.create_consumer();

    assert_eq!(a.next().unwrap(), Some(1));
    assert_eq!(a.next().unwrap(), Some(2));
    assert_eq!(b.next().unwrap(), Some(1));
    assert_eq!(a.next().unwrap(), Some(3));
    assert_eq!(b.next().unwrap(), Some(2));

    let remaining_a: Vec<_> = std::iter::from_fn(|| a.next().unwrap()).collect();
    let remaining_b: Vec<_> = std::iter::from_fn(|| b.next().unwrap()).collect();
    assert_eq!(remaining_a, vec![4, 5, 6]);
    assert_eq!(remaining_b, vec![3, 4, 5, 6]);
}
