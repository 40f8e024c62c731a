//! Per-record collection of (ISBN, format) pairs and the matched/unmatched split

use std::collections::{HashMap, HashSet};

use crate::domain::FormatPair;

/// A source record with at least one surviving pair
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedRecord {
    pub source_id: String,
    /// Distinct pairs, in the order they were first seen
    pub pairs: Vec<FormatPair>,
}

/// Final partition of every processed source record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdentifyResults {
    pub matched: Vec<MatchedRecord>,
    pub unmatched: Vec<String>,
}

impl IdentifyResults {
    pub fn pairs_for(&self, source_id: &str) -> Option<&[FormatPair]> {
        self.matched
            .iter()
            .find(|m| m.source_id == source_id)
            .map(|m| m.pairs.as_slice())
    }

    pub fn is_unmatched(&self, source_id: &str) -> bool {
        self.unmatched.iter().any(|id| id == source_id)
    }
}

#[derive(Debug, Default)]
struct Entry {
    pairs: Vec<FormatPair>,
    seen: HashSet<FormatPair>,
}

/// Collects pairs across all matching candidates of each source record.
///
/// Records are kept in first-accumulated order so output files are reproducible.
#[derive(Debug, Default)]
pub struct ResultAccumulator {
    order: Vec<String>,
    entries: HashMap<String, Entry>,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add pairs for a record. An empty sequence still registers the record, so it
    /// ends up unmatched rather than missing.
    pub fn accumulate<I>(&mut self, source_id: &str, pairs: I)
    where
        I: IntoIterator<Item = FormatPair>,
    {
        if !self.entries.contains_key(source_id) {
            self.order.push(source_id.to_string());
        }
        let entry = self.entries.entry(source_id.to_string()).or_default();

        for pair in pairs {
            if entry.seen.insert(pair.clone()) {
                entry.pairs.push(pair);
            }
        }
    }

    /// Fold another accumulator (e.g. from a parallel worker) into this one.
    pub fn merge(&mut self, other: ResultAccumulator) {
        let mut other = other;
        for id in std::mem::take(&mut other.order) {
            let pairs = other
                .entries
                .remove(&id)
                .map(|e| e.pairs)
                .unwrap_or_default();
            self.accumulate(&id, pairs);
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn finalize(mut self) -> IdentifyResults {
        let mut results = IdentifyResults::default();

        for id in self.order {
            let pairs = self
                .entries
                .remove(&id)
                .map(|e| e.pairs)
                .unwrap_or_default();
            if pairs.is_empty() {
                results.unmatched.push(id);
            } else {
                results.matched.push(MatchedRecord {
                    source_id: id,
                    pairs,
                });
            }
        }

        results
    }
}
