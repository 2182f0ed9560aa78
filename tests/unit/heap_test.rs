//! Randomised checks for the min-heap queue

use prometheus_event_scheduler::core::{MinHeapQueue, SchedulerError};
use rand::Rng;

#[test]
fn test_random_pushes_pop_sorted() {
    let mut rng = rand::rng();
    for _ in 0..20 {
        let len = rng.random_range(1..300);
        let values: Vec<i64> = (0..len).map(|_| rng.random_range(-1_000..1_000)).collect();

        let mut heap = MinHeapQueue::new();
        for v in &values {
            heap.push(*v);
        }
        assert_eq!(heap.len(), values.len());

        let mut sorted = values.clone();
        sorted.sort_unstable();
        let drained: Vec<i64> = std::iter::from_fn(|| heap.pop().ok()).collect();
        assert_eq!(drained, sorted);
        assert!(matches!(heap.pop(), Err(SchedulerError::EmptyQueue)));
    }
}

#[test]
fn test_random_removals_keep_heap_order() {
    let mut rng = rand::rng();
    let mut heap = MinHeapQueue::new();
    let mut mirror = Vec::new();
    for _ in 0..500 {
        let v: u32 = rng.random_range(0..100);
        heap.push(v);
        mirror.push(v);
    }

    for _ in 0..100 {
        let target = mirror[rng.random_range(0..mirror.len())];
        assert_eq!(heap.remove(&target), Some(target));
        let pos = mirror.iter().position(|x| *x == target).unwrap();
        mirror.swap_remove(pos);
        assert_eq!(heap.peek().copied(), mirror.iter().min().copied());
    }

    mirror.sort_unstable();
    let drained: Vec<u32> = std::iter::from_fn(|| heap.pop().ok()).collect();
    assert_eq!(drained, mirror);
}

#[test]
fn test_peek_matches_minimum_while_interleaving() {
    let mut rng = rand::rng();
    let mut heap = MinHeapQueue::new();
    let mut mirror: Vec<u16> = Vec::new();
    for _ in 0..1_000 {
        if mirror.is_empty() || rng.random_bool(0.6) {
            let v = rng.random_range(0..500);
            heap.push(v);
            mirror.push(v);
        } else {
            let popped = heap.pop().unwrap();
            let min = *mirror.iter().min().unwrap();
            assert_eq!(popped, min);
            let pos = mirror.iter().position(|x| *x == min).unwrap();
            mirror.swap_remove(pos);
        }
        assert_eq!(heap.peek().copied(), mirror.iter().min().copied());
    }
}
