//! Priority queue of level due times
//!
//! Levels are referred to by their tie rank: the index of the level in the
//! engine's processing order. Equal due times pop in rank order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::core::types::SimulationTime;

/// Entry in the due-time heap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DueEntry {
    due: SimulationTime,
    rank: usize,
}

impl Ord for DueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.rank.cmp(&self.rank))
    }
}

impl PartialOrd for DueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Scheduling queue of `(next_due, level rank)` pairs
///
/// Holds at most one entry per level: a level is popped when it becomes due
/// and pushed back once its reaction produced a new consistent state.
#[derive(Debug, Default)]
pub struct DueQueue {
    heap: BinaryHeap<DueEntry>,
}

impl DueQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, rank: usize, due: SimulationTime) {
        debug_assert!(
            self.heap.iter().all(|e| e.rank != rank),
            "level rank {rank} scheduled twice"
        );
        self.heap.push(DueEntry { due, rank });
    }

    /// Earliest due time without removing anything
    pub fn peek_time(&self) -> Option<SimulationTime> {
        self.heap.peek().map(|e| e.due)
    }

    /// Remove every level due at the earliest time
    ///
    /// Returns that time and the ranks due then, in ascending rank order.
    pub fn pop_round(&mut self) -> Option<(SimulationTime, Vec<usize>)> {
        let first = self.heap.pop()?;
        let mut ranks = vec![first.rank];

        while let Some(next) = self.heap.peek() {
            if next.due != first.due {
                break;
            }
            ranks.push(next.rank);
            self.heap.pop();
        }

        Some((first.due, ranks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn t(ticks: i64) -> SimulationTime {
        SimulationTime(ticks)
    }

    #[test]
    fn test_pop_round_groups_ties_in_rank_order() {
        let mut queue = DueQueue::new();
        queue.schedule(2, t(3));
        queue.schedule(0, t(3));
        queue.schedule(1, t(1));

        assert_eq!(queue.peek_time(), Some(t(1)));
        assert_eq!(queue.pop_round(), Some((t(1), vec![1])));
        assert_eq!(queue.pop_round(), Some((t(3), vec![0, 2])));
        assert_eq!(queue.pop_round(), None);
        assert_eq!(queue.peek_time(), None);
    }

    proptest! {
        #[test]
        fn prop_rounds_pop_in_time_order(dues in proptest::collection::vec(0i64..20, 1..30)) {
            let mut queue = DueQueue::new();
            for (rank, due) in dues.iter().enumerate() {
                queue.schedule(rank, t(*due));
            }

            let mut last: Option<SimulationTime> = None;
            let mut popped = 0;
            while let Some((time, ranks)) = queue.pop_round() {
                if let Some(previous) = last {
                    prop_assert!(time > previous);
                }
                prop_assert!(ranks.windows(2).all(|w| w[0] < w[1]));
                for rank in &ranks {
                    prop_assert_eq!(t(dues[*rank]), time);
                }
                popped += ranks.len();
                last = Some(time);
            }
            prop_assert_eq!(popped, dues.len());
        }
    }
}
