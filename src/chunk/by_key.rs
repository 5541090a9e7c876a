//! Sorted-set algebra over descriptor lists.
//!
//! Every input must already be sorted ascending by external key and free of
//! duplicate keys; that precondition is not checked. Results have the same
//! shape. Keys are formatted once per element per call, not per comparison.

use super::{Chunk, Descriptor};

use std::cmp::Ordering;

/// Descriptors sorted by [`Descriptor::external_key`].
pub type DescByKey = Vec<Descriptor>;

/// Anything ordered by a chunk external key.
pub trait ByKey: Clone {
    fn sort_key(&self) -> String;
}

impl ByKey for Descriptor {
    fn sort_key(&self) -> String {
        self.external_key()
    }
}

impl ByKey for Chunk {
    fn sort_key(&self) -> String {
        self.descriptor().external_key()
    }
}

fn keys<T: ByKey>(items: &[T]) -> Vec<String> {
    items.iter().map(ByKey::sort_key).collect()
}

/// Sort an unsorted lookup result and drop duplicate keys, producing a
/// valid input for the other operations.
pub fn sort_by_key<T: ByKey>(mut items: Vec<T>) -> Vec<T> {
    items.sort_by_cached_key(ByKey::sort_key);
    unique(&items)
}

/// Sort chunks in place by their descriptor's external key.
pub fn sort_chunks_by_key(chunks: &mut [Chunk]) {
    chunks.sort_by_cached_key(ByKey::sort_key);
}

/// Collapse runs of equal keys to their first entry. Input must be sorted.
pub fn unique<T: ByKey>(items: &[T]) -> Vec<T> {
    let mut result = Vec::with_capacity(items.len());
    let mut last: Option<String> = None;
    for item in items {
        let key = item.sort_key();
        if last.as_ref() != Some(&key) {
            result.push(item.clone());
            last = Some(key);
        }
    }
    result
}

/// Union of two sorted, duplicate-free lists. On equal keys the entry from
/// `a` is kept.
pub fn merge<T: ByKey>(a: &[T], b: &[T]) -> Vec<T> {
    let (ka, kb) = (keys(a), keys(b));
    let mut result = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match ka[i].cmp(&kb[j]) {
            Ordering::Less => {
                result.push(a[i].clone());
                i += 1;
            }
            Ordering::Greater => {
                result.push(b[j].clone());
                j += 1;
            }
            Ordering::Equal => {
                result.push(a[i].clone());
                i += 1;
                j += 1;
            }
        }
    }
    result.extend_from_slice(&a[i..]);
    result.extend_from_slice(&b[j..]);
    result
}

/// Intersection of two sorted, duplicate-free lists, keeping entries from
/// `a`.
pub fn intersect<T: ByKey>(a: &[T], b: &[T]) -> Vec<T> {
    let (ka, kb) = (keys(a), keys(b));
    let mut result = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match ka[i].cmp(&kb[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                result.push(a[i].clone());
                i += 1;
                j += 1;
            }
        }
    }
    result
}

/// Union of any number of sorted lists, merged as a balanced tree.
pub fn n_way_union<T: ByKey>(sets: &[Vec<T>]) -> Vec<T> {
    match sets.len() {
        0 => Vec::new(),
        1 => sets[0].clone(),
        2 => merge(&sets[0], &sets[1]),
        len => {
            let split = len / 2;
            let left = n_way_union(&sets[..split]);
            let right = n_way_union(&sets[split..]);
            merge(&left, &right)
        }
    }
}

/// Intersection of any number of sorted lists, combined as a balanced tree.
/// Empty intermediate results do not short-circuit the recursion.
pub fn n_way_intersect<T: ByKey>(sets: &[Vec<T>]) -> Vec<T> {
    match sets.len() {
        0 => Vec::new(),
        1 => sets[0].clone(),
        2 => intersect(&sets[0], &sets[1]),
        len => {
            let split = len / 2;
            let left = n_way_intersect(&sets[..split]);
            let right = n_way_intersect(&sets[split..]);
            intersect(&left, &right)
        }
    }
}
