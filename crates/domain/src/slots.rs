use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use shared::types::{ScheduleId, TimeSlot};

use crate::recurrence::RecurrenceRule;

/// A concrete shift slot derived from a schedule's recurrence rule.
/// Identified by `(schedule_id, window.start)`; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub schedule_id: ScheduleId,
    pub window: TimeSlot,
}

/// Merge the expansions of several recurrence rules into a single stream
/// ordered by start time, using a k-way heap merge over the lazy per-rule
/// iterators. Duplicate `(schedule_id, start)` pairs produced by overlapping
/// rules are emitted once, at their earliest encounter. Stops after `limit`
/// slots when set.
pub fn merge_slots(
    rules: &[RecurrenceRule],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    limit: Option<usize>,
) -> Vec<Slot> {
    let mut streams: Vec<Box<dyn Iterator<Item = TimeSlot> + '_>> = rules
        .iter()
        .map(|rule| Box::new(rule.expand(from, to)) as Box<dyn Iterator<Item = TimeSlot> + '_>)
        .collect();

    // Min-heap keyed on (start, rule index); ties resolve to the earlier rule
    // so the merge stays deterministic.
    let mut heap = BinaryHeap::new();
    for (idx, stream) in streams.iter_mut().enumerate() {
        if let Some(slot) = stream.next() {
            heap.push(Reverse((slot.start, idx, slot.end)));
        }
    }

    let mut merged = Vec::new();
    let mut seen: HashSet<(ScheduleId, DateTime<Utc>)> = HashSet::new();

    while let Some(Reverse((start, idx, end))) = heap.pop() {
        if let Some(next) = streams[idx].next() {
            heap.push(Reverse((next.start, idx, next.end)));
        }

        let schedule_id = rules[idx].schedule_id;
        if seen.insert((schedule_id, start)) {
            merged.push(Slot {
                schedule_id,
                window: TimeSlot { start, end },
            });
            if limit.map(|l| merged.len() >= l).unwrap_or(false) {
                break;
            }
        }
    }

    merged
}
