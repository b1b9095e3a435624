//! Row id ranges and sequential id allocation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Inclusive, non-empty range of 1-based row ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdRange {
    start: u64,
    stop: u64,
}

impl IdRange {
    /// `None` unless `1 <= start <= stop`
    pub fn new(start: u64, stop: u64) -> Option<Self> {
        (start >= 1 && start <= stop).then_some(Self { start, stop })
    }

    /// `1..=count`, `None` for an empty table
    pub fn full(count: u64) -> Option<Self> {
        Self::new(1, count)
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn stop(&self) -> u64 {
        self.stop
    }

    pub fn len(&self) -> u64 {
        self.stop - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, id: u64) -> bool {
        self.start <= id && id <= self.stop
    }

    pub fn iter(&self) -> RangeInclusive<u64> {
        self.start..=self.stop
    }
}

impl IntoIterator for IdRange {
    type Item = u64;
    type IntoIter = RangeInclusive<u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for IdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.stop)
    }
}

/// Restartable counter producing increasing ids from an offset
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Reserve `count` consecutive ids, `None` when `count` is zero
    pub fn reserve(&mut self, count: u64) -> Option<IdRange> {
        let range = IdRange::new(self.next, self.next + count.checked_sub(1)?)?;
        self.next += count;
        Some(range)
    }

    /// Id the next call hands out
    pub fn peek(&self) -> u64 {
        self.next
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl Iterator for IdAllocator {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        Some(self.next_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_bounds() {
        assert!(IdRange::new(0, 5).is_none());
        assert!(IdRange::new(6, 5).is_none());
        assert!(IdRange::full(0).is_none());

        let range = IdRange::new(3, 5).unwrap();
        assert_eq!(range.len(), 3);
        assert_eq!(range.iter().collect::<Vec<_>>(), vec![3, 4, 5]);
        assert!(range.contains(5));
        assert!(!range.contains(6));
    }

    #[test]
    fn test_allocator_blocks_are_contiguous() {
        let mut ids = IdAllocator::starting_at(10);
        assert_eq!(ids.next_id(), 10);
        assert_eq!(ids.reserve(3), IdRange::new(11, 13));
        assert_eq!(ids.reserve(0), None);
        assert_eq!(ids.peek(), 14);
        assert_eq!(ids.reserve(2).map(|r| r.iter().collect::<Vec<_>>()), Some(vec![14, 15]));
    }

    #[test]
    fn test_allocator_as_iterator() {
        let ids: Vec<u64> = IdAllocator::default().take(3).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
