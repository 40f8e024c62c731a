//! Identify Service - drives each source record through search, parse, match,
//! classify and accumulate.
//!
//! Per-record failures (fetch errors, unusable payloads) route the record to the
//! unmatched set; only fatal errors (cache storage) abort the run.

use futures::{StreamExt, future, stream};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::accumulator::{IdentifyResults, ResultAccumulator};
use crate::domain::{CatalogSearch, DomainError, FormatPair, SourceRecord};
use crate::modules::cataloguing_pro::{classify, parse};
use crate::modules::matching::Matcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStage {
    Searching,
    Parsing,
    Matching,
    Classifying,
    Accumulated,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub threshold: f64,
    /// Test mode: cap on the number of input records consumed
    pub record_limit: Option<usize>,
    /// Records processed concurrently; 1 keeps the run strictly sequential
    pub concurrency: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            threshold: crate::infrastructure::config::DEFAULT_MATCH_THRESHOLD,
            record_limit: None,
            concurrency: 1,
        }
    }
}

/// What happened to one source record
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    pub source_id: String,
    pub pairs: Vec<FormatPair>,
    pub matched_candidates: usize,
    /// Stage at which the record dropped out with an error or warning
    pub failed_at: Option<RecordStage>,
}

/// Counts for the operator at the end of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub total: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub parse_warnings: usize,
    pub fetch_errors: usize,
    pub interrupted: bool,
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "** Summary Report **")?;
        writeln!(f)?;
        writeln!(f, "-- Total number of books included in search: {}", self.total)?;
        writeln!(
            f,
            "-- Number of books successfully matched with records with ISBNs: {}",
            self.matched
        )?;
        writeln!(f, "-- Number of books with no matching records: {}", self.unmatched)?;
        writeln!(f, "-- Unusable catalog responses: {}", self.parse_warnings)?;
        write!(f, "-- Failed searches: {}", self.fetch_errors)?;
        if self.interrupted {
            write!(f, "\n-- Run interrupted before every record was processed")?;
        }
        Ok(())
    }
}

/// ISBNs of the pairs in first-seen order, each once even when it carries several formats
fn distinct_isbns(pairs: &[FormatPair]) -> Vec<&str> {
    let mut seen = HashSet::new();
    pairs
        .iter()
        .map(|p| p.isbn.as_str())
        .filter(|isbn| seen.insert(*isbn))
        .collect()
}

pub struct IdentifyService {
    search: Arc<dyn CatalogSearch>,
    matcher: Matcher,
    record_limit: Option<usize>,
    concurrency: usize,
    stop: Arc<AtomicBool>,
}

impl IdentifyService {
    pub fn new(search: Arc<dyn CatalogSearch>, options: RunOptions) -> Result<Self, DomainError> {
        if options.concurrency == 0 {
            return Err(DomainError::Configuration(
                "concurrency must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            search,
            matcher: Matcher::new(options.threshold)?,
            record_limit: options.record_limit,
            concurrency: options.concurrency,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Setting this flag stops the run before the next source record is started.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Run one record to its terminal stage. Only fatal errors are returned as `Err`.
    pub async fn process_record(&self, record: &SourceRecord) -> Result<RecordOutcome, DomainError> {
        let full_title = record.full_title();
        let mut outcome = RecordOutcome {
            source_id: record.id.clone(),
            pairs: Vec::new(),
            matched_candidates: 0,
            failed_at: None,
        };

        tracing::info!("[{}] Looking for \"{}\" in WorldCat...", record.id, full_title);
        let payload = match self.search.search(&full_title, &record.author).await {
            Ok(payload) => payload,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!("[{}] Search failed: {}", record.id, e);
                outcome.failed_at = Some(RecordStage::Searching);
                return Ok(outcome);
            }
        };

        tracing::debug!("[{}] {:?}", record.id, RecordStage::Parsing);
        let parsed = parse(&payload);
        if let Some(warning) = &parsed.warning {
            tracing::warn!("[{}] Unusable catalog response: {}", record.id, warning);
            outcome.failed_at = Some(RecordStage::Parsing);
        }
        if let Some(reported) = parsed.number_of_records
            && reported > parsed.record_count() as u64
        {
            tracing::warn!(
                "[{}] Catalog reported {} records but returned {}",
                record.id,
                reported,
                parsed.record_count()
            );
        }

        tracing::debug!("[{}] {:?}", record.id, RecordStage::Matching);
        let matches = self.matcher.matching(record, parsed.candidates());
        outcome.matched_candidates = matches.len();
        tracing::info!(
            "[{}] Number of WorldCat records found: {}, matched: {}",
            record.id,
            parsed.record_count(),
            matches.len()
        );

        tracing::debug!("[{}] {:?}", record.id, RecordStage::Classifying);
        outcome.pairs = matches.iter().flat_map(classify).collect();
        if !matches.is_empty() && outcome.pairs.is_empty() {
            tracing::info!("[{}] Matching records carry no ISBN", record.id);
        }

        tracing::debug!("[{}] {:?}", record.id, RecordStage::Accumulated);
        Ok(outcome)
    }

    /// Process the records (up to the test-mode cap) and partition them into matched and
    /// unmatched.
    pub async fn run(
        &self,
        records: &[SourceRecord],
    ) -> Result<(IdentifyResults, RunReport), DomainError> {
        let selected = match self.record_limit {
            Some(limit) => {
                tracing::info!("TEST_MODE is ON: processing at most {} records", limit);
                &records[..limit.min(records.len())]
            }
            None => records,
        };

        let stop = &self.stop;
        let mut outcomes = stream::iter(selected.iter())
            .take_while(|_| future::ready(!stop.load(Ordering::SeqCst)))
            .map(|record| self.process_record(record))
            .buffered(self.concurrency);

        let mut accumulator = ResultAccumulator::new();
        let mut report = RunReport::default();

        while let Some(outcome) = outcomes.next().await {
            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("Aborting run: {}", e);
                    return Err(e);
                }
            };

            match outcome.failed_at {
                Some(RecordStage::Searching) => report.fetch_errors += 1,
                Some(RecordStage::Parsing) => report.parse_warnings += 1,
                _ => {}
            }

            if outcome.pairs.is_empty() {
                tracing::warn!("[{}] No matching records with ISBNs were found!", outcome.source_id);
            } else {
                let isbns = distinct_isbns(&outcome.pairs);
                tracing::info!(
                    "[{}] Book successfully matched with record(s) with {} ISBN(s): {:?}",
                    outcome.source_id,
                    isbns.len(),
                    isbns
                );
            }
            accumulator.accumulate(&outcome.source_id, outcome.pairs);
        }

        let results = accumulator.finalize();
        report.total = results.matched.len() + results.unmatched.len();
        report.matched = results.matched.len();
        report.unmatched = results.unmatched.len();
        report.interrupted = report.total < selected.len();

        Ok((results, report))
    }
}
