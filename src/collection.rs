/// Bounded, insertion-ordered working set of captured records
use crate::dedup::is_duplicate;
use crate::record::Record;

pub const DEFAULT_CAPACITY: usize = 100;

/// Result of offering a record to the working set
#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    /// Appended at the end; `evicted` is the oldest record when capacity was exceeded.
    Inserted { evicted: Option<Record> },
    /// Same content and author already present; nothing changed.
    Duplicate,
}

impl AppendOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, AppendOutcome::Inserted { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkingSet {
    records: Vec<Record>,
    capacity: usize,
}

impl WorkingSet {
    /// Capacity is at least one.
    pub fn new(capacity: usize) -> Self {
        WorkingSet {
            records: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append in discovery order, evicting the oldest record on overflow.
    pub fn append(&mut self, record: Record) -> AppendOutcome {
        if is_duplicate(&record, &self.records) {
            return AppendOutcome::Duplicate;
        }

        self.records.push(record);
        let evicted = if self.records.len() > self.capacity {
            Some(self.records.remove(0))
        } else {
            None
        };

        AppendOutcome::Inserted { evicted }
    }

    /// Replace the whole set, e.g. from persisted state. Incomplete records
    /// are dropped, and only the newest `capacity` records are kept.
    /// Returns how many records were discarded.
    pub fn replace(&mut self, records: Vec<Record>) -> usize {
        let offered = records.len();
        let mut records: Vec<Record> = records.into_iter().filter(Record::is_complete).collect();
        if records.len() > self.capacity {
            records.drain(..records.len() - self.capacity);
        }

        let discarded = offered - records.len();
        self.records = records;
        discarded
    }

    pub fn reset(&mut self) {
        self.records.clear();
    }
}

impl Default for WorkingSet {
    fn default() -> Self {
        WorkingSet::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::record;

    fn filled(capacity: usize, count: usize) -> WorkingSet {
        let mut set = WorkingSet::new(capacity);
        for i in 0..count {
            set.append(record(&format!("post {}", i), "Jane"));
        }
        set
    }

    #[test]
    fn test_working_set_new() {
        let set = WorkingSet::default();

        assert_eq!(set.len(), 0);
        assert_eq!(set.capacity(), 100);
        assert_eq!(WorkingSet::new(0).capacity(), 1);
    }

    #[test]
    fn test_append_preserves_discovery_order() {
        let set = filled(10, 3);

        let contents: Vec<&str> = set.records().iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["post 0", "post 1", "post 2"]);
    }

    #[test]
    fn test_append_below_capacity_does_not_evict() {
        let mut set = filled(3, 2);

        let outcome = set.append(record("post 2", "Jane"));

        assert_eq!(outcome, AppendOutcome::Inserted { evicted: None });
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_full_set_evicts_oldest() {
        let mut set = filled(100, 100);
        let oldest = set.records()[0].clone();
        let newest = record("brand new", "John");

        let outcome = set.append(newest.clone());

        assert_eq!(outcome, AppendOutcome::Inserted { evicted: Some(oldest.clone()) });
        assert_eq!(set.len(), 100);
        assert!(!set.records().contains(&oldest));
        assert_eq!(set.records().last(), Some(&newest));
        assert_eq!(set.records()[0].content, "post 1");
    }

    #[test]
    fn test_length_never_exceeds_capacity() {
        for capacity in 1..6 {
            let mut set = WorkingSet::new(capacity);
            for i in 0..20 {
                let before = set.len();
                assert!(set.append(record(&format!("post {}", i), "Jane")).is_inserted());
                assert_eq!(set.len(), (before + 1).min(capacity));
            }
        }
    }

    #[test]
    fn test_duplicate_leaves_set_unchanged() {
        let mut set = WorkingSet::new(5);
        set.append(record("Hello world", "Jane"));
        let before = set.clone();

        let outcome = set.append(record("Hello world", "Jane"));

        assert_eq!(outcome, AppendOutcome::Duplicate);
        assert_eq!(set, before);
    }

    #[test]
    fn test_replace_keeps_newest_within_capacity() {
        let mut set = WorkingSet::new(2);
        let records = vec![record("a", "Jane"), record("b", "Jane"), record("c", "Jane")];

        let discarded = set.replace(records);

        assert_eq!(discarded, 1);
        let contents: Vec<&str> = set.records().iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["b", "c"]);
    }

    #[test]
    fn test_replace_drops_incomplete_records() {
        let mut set = WorkingSet::new(5);
        let mut broken = record("a", "Jane");
        broken.author = " ".to_string();

        let mut invisible = record("c", "Jane");
        invisible.content = "\u{200b}".to_string();

        let discarded = set.replace(vec![broken, record("b", "Jane"), invisible]);

        assert_eq!(discarded, 2);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_reset_clears() {
        let mut set = filled(5, 5);

        set.reset();

        assert!(set.is_empty());
        assert_eq!(set.capacity(), 5);
    }
}
