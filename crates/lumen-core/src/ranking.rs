//! Top-K Ranker
//!
//! Bounded-heap extraction of the k smallest or largest finite values. The
//! result equals repeated greedy extraction: best value first, equal values
//! ordered by lowest index.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A value and the position it came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranked {
    pub index: usize,
    pub value: f64,
}

/// Heap entry ordered so that the worst kept entry sits on top
#[derive(Debug, Clone, Copy)]
struct Entry {
    ranked: Ranked,
    largest: bool,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_value = if self.largest {
            other.ranked.value.total_cmp(&self.ranked.value)
        } else {
            self.ranked.value.total_cmp(&other.ranked.value)
        };
        by_value.then_with(|| self.ranked.index.cmp(&other.ranked.index))
    }
}

fn top_k(values: &[f64], k: usize, largest: bool) -> Vec<Ranked> {
    if k == 0 {
        return Vec::new();
    }

    let mut heap: BinaryHeap<Entry> = BinaryHeap::with_capacity(k + 1);
    for (index, &value) in values.iter().enumerate() {
        if !value.is_finite() {
            continue;
        }
        let entry = Entry {
            ranked: Ranked { index, value },
            largest,
        };
        if heap.len() < k {
            heap.push(entry);
        } else if heap.peek().is_some_and(|worst| entry < *worst) {
            heap.pop();
            heap.push(entry);
        }
    }

    heap.into_sorted_vec().into_iter().map(|e| e.ranked).collect()
}

/// The `k` smallest finite values, ascending
pub fn smallest_k(values: &[f64], k: usize) -> Vec<Ranked> {
    top_k(values, k, false)
}

/// The `k` largest finite values, descending
pub fn largest_k(values: &[f64], k: usize) -> Vec<Ranked> {
    top_k(values, k, true)
}
