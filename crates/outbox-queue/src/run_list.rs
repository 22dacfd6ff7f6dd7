//! In-memory run list: durable FIFO order with a process-local priority overlay.

use std::collections::VecDeque;

use crate::operation::OperationRecord;

/// A run list slot.
#[derive(Debug, Clone)]
struct Entry {
    record: OperationRecord,
    /// Set for high-priority enqueues; never persisted.
    high_priority: bool,
}

/// The ordering the engine drains.
///
/// Normal records sit in ascending sequence order. High-priority records are
/// placed in front of everything pending at the time they were enqueued.
#[derive(Debug, Default)]
pub struct RunList {
    entries: VecDeque<Entry>,
}

impl RunList {
    /// Create an empty run list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with the store's records.
    ///
    /// High-priority entries already present keep their place at the front,
    /// so a priority enqueue made before seeding survives it. Records that
    /// are not in `records` are dropped.
    pub fn seed(&mut self, mut records: Vec<OperationRecord>) {
        records.sort_by_key(|r| r.sequence);

        let priority: Vec<Entry> = self
            .entries
            .drain(..)
            .filter(|e| e.high_priority)
            .filter(|e| records.iter().any(|r| r.sequence == e.record.sequence))
            .collect();

        let mut entries: VecDeque<Entry> = priority.into();
        for record in records {
            if entries.iter().any(|e| e.record.sequence == record.sequence) {
                continue;
            }
            entries.push_back(Entry {
                record,
                high_priority: false,
            });
        }

        self.entries = entries;
    }

    /// Add a freshly inserted record.
    pub fn push(&mut self, record: OperationRecord, high_priority: bool) {
        let entry = Entry {
            record,
            high_priority,
        };
        if high_priority {
            self.entries.push_front(entry);
        } else {
            self.entries.push_back(entry);
        }
    }

    /// Take the head for execution.
    pub fn pop_head(&mut self) -> Option<OperationRecord> {
        self.entries.pop_front().map(|e| e.record)
    }

    /// Put a record back at the very front so it is retried first.
    pub fn restore_head(&mut self, record: OperationRecord) {
        self.entries.push_front(Entry {
            record,
            high_priority: true,
        });
    }

    /// Get run list length.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the run list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records in execution order.
    pub fn records(&self) -> impl Iterator<Item = &OperationRecord> {
        self.entries.iter().map(|e| &e.record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Sequence;

    fn sequences(list: &RunList) -> Vec<Sequence> {
        list.records().map(|r| r.sequence).collect()
    }

    fn record(sequence: Sequence) -> OperationRecord {
        OperationRecord::new(sequence, sequence * 10, None)
    }

    #[test]
    fn test_push_fifo() {
        let mut list = RunList::new();
        list.push(record(1), false);
        list.push(record(2), false);
        list.push(record(3), false);

        assert_eq!(sequences(&list), vec![1, 2, 3]);
        assert_eq!(list.pop_head().unwrap().sequence, 1);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_high_priority_goes_first() {
        let mut list = RunList::new();
        list.push(record(1), false);
        list.push(record(2), false);
        list.push(record(3), true);
        list.push(record(4), true);

        // Most recent priority enqueue wins.
        assert_eq!(sequences(&list), vec![4, 3, 1, 2]);
    }

    #[test]
    fn test_seed_orders_by_sequence() {
        let mut list = RunList::new();
        list.seed(vec![record(5), record(2), record(9)]);
        assert_eq!(sequences(&list), vec![2, 5, 9]);
    }

    #[test]
    fn test_seed_keeps_priority_overlay() {
        let mut list = RunList::new();
        list.push(record(3), true);
        list.push(record(4), false);

        list.seed(vec![record(1), record(2), record(3), record(4)]);
        assert_eq!(sequences(&list), vec![3, 1, 2, 4]);
    }

    #[test]
    fn test_seed_drops_records_missing_from_store() {
        let mut list = RunList::new();
        list.push(record(7), true);
        list.push(record(8), false);

        list.seed(vec![record(8)]);
        assert_eq!(sequences(&list), vec![8]);
    }

    #[test]
    fn test_restore_head_beats_priority() {
        let mut list = RunList::new();
        list.push(record(1), false);
        list.push(record(2), false);

        let head = list.pop_head().unwrap();
        list.push(record(3), true);
        list.restore_head(head);

        assert_eq!(sequences(&list), vec![1, 3, 2]);
    }
}
