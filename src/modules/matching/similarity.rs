//! Title/publisher similarity scoring and the match decision

use strsim::normalized_levenshtein;

use super::normalize::{normalize, normalize_publisher};
use crate::domain::{CandidateRecord, DomainError, MatchDecision, SourceRecord};
use crate::infrastructure::config::validate_threshold;

/// `1 - distance / longest length`. Two empty strings are identical, one empty string
/// never resembles anything.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.0,
        (false, false) => normalized_levenshtein(a, b),
    }
}

/// Compare one candidate with one source record using a fixed threshold.
pub fn match_candidate(
    source: &SourceRecord,
    candidate: &CandidateRecord,
    threshold: f64,
) -> MatchDecision {
    let source_title = normalize(&source.full_title());
    let candidate_title = normalize(&candidate.title);
    let title_similarity = similarity_ratio(&source_title, &candidate_title);

    // Publisher metadata is often missing from catalog records, so absence is neutral.
    // Any one of the source's publishers is enough.
    let publisher_similarity = candidate.publisher.as_deref().and_then(|theirs| {
        let theirs = normalize_publisher(theirs);
        source
            .publishers
            .iter()
            .map(|ours| similarity_ratio(&normalize_publisher(ours), &theirs))
            .reduce(f64::max)
    });

    let is_match = title_similarity >= threshold
        && publisher_similarity.is_none_or(|score| score >= threshold);

    tracing::debug!(
        "'{}' ~ '{}': title={:.3} publisher={:?} match={}",
        source_title,
        candidate_title,
        title_similarity,
        publisher_similarity,
        is_match
    );

    MatchDecision {
        source_id: source.id.clone(),
        candidate: candidate.clone(),
        title_similarity,
        publisher_similarity,
        is_match,
    }
}

/// Match decisions with a validated threshold
#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    threshold: f64,
}

impl Matcher {
    pub fn new(threshold: f64) -> Result<Self, DomainError> {
        Ok(Self {
            threshold: validate_threshold(threshold)?,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn decide(&self, source: &SourceRecord, candidate: &CandidateRecord) -> MatchDecision {
        match_candidate(source, candidate, self.threshold)
    }

    /// Every candidate that passes, in catalog order. No single best match is picked.
    pub fn matching<I>(&self, source: &SourceRecord, candidates: I) -> Vec<CandidateRecord>
    where
        I: IntoIterator<Item = CandidateRecord>,
    {
        candidates
            .into_iter()
            .map(|candidate| self.decide(source, &candidate))
            .filter(|decision| decision.is_match)
            .map(|decision| decision.candidate)
            .collect()
    }
}
