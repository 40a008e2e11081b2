use std::cmp::Ordering;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::config::MatcherConfig;
use super::similarity::best_similarity;
use crate::core::{ImportedInvoiceHeader, LedgerEntry};

/// What is known about an invoice when looking for the ledger entry that paid it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationQuery {
    pub amount: Decimal,
    pub issue_date: NaiveDate,
    /// Document-derived label, e.g. "NF-e 123/1 - Acme Corp".
    pub label: String,
    pub counterparty_name: String,
}

impl ReconciliationQuery {
    pub fn for_header(header: &ImportedInvoiceHeader) -> Self {
        Self {
            amount: header.totals.grand_total,
            issue_date: header.issue_date,
            label: header.document_label(),
            counterparty_name: header.counterparty.legal_name.clone(),
        }
    }
}

/// A ledger entry scored against a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationCandidate {
    pub entry: LedgerEntry,
    /// Composite score in `[0, 1]`.
    pub score: f64,
    /// Absolute number of days between the entry date and the issue date.
    pub day_distance: i64,
    /// Amount agreement alone, `1.0` within the absolute tolerance.
    pub amount_score: f64,
    /// Description similarity alone.
    pub text_score: f64,
}

/// Result of a reconciliation search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReconciliationMatch {
    /// One entry is clearly the payment of this invoice.
    Confident(ReconciliationCandidate),
    /// Entries above the relevance floor, best first, for a human to choose from.
    Candidates(Vec<ReconciliationCandidate>),
    /// Nothing relevant.
    NoMatch,
}

impl ReconciliationMatch {
    pub fn candidates(&self) -> &[ReconciliationCandidate] {
        match self {
            Self::Confident(c) => std::slice::from_ref(c),
            Self::Candidates(cs) => cs,
            Self::NoMatch => &[],
        }
    }
}

/// Score every unreconciled entry and classify the result.
///
/// Reconciled entries in the snapshot are ignored. Entries outside the amount
/// or date window are excluded before scoring.
pub fn find_matches(
    query: &ReconciliationQuery,
    entries: &[LedgerEntry],
    config: &MatcherConfig,
) -> ReconciliationMatch {
    let mut candidates: Vec<ReconciliationCandidate> = entries
        .iter()
        .filter(|e| !e.reconciled)
        .filter_map(|e| score_entry(query, e, config))
        .filter(|c| c.score >= config.relevance_floor)
        .collect();

    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.day_distance.cmp(&b.day_distance))
            .then_with(|| a.entry.id.cmp(&b.entry.id))
    });

    let confident = match candidates.as_slice() {
        [] => return ReconciliationMatch::NoMatch,
        [only] => only.score >= config.confident_threshold,
        [best, runner_up, ..] => {
            best.score >= config.confident_threshold
                && best.score - runner_up.score > config.tie_margin
                && !indistinguishable(best, runner_up, config)
        }
    };

    if confident {
        ReconciliationMatch::Confident(candidates.swap_remove(0))
    } else {
        ReconciliationMatch::Candidates(candidates)
    }
}

/// A runner-up with the exact amount and an equally similar description
/// cannot be told apart from the best entry. Date proximity only ranks them.
fn indistinguishable(
    best: &ReconciliationCandidate,
    runner_up: &ReconciliationCandidate,
    config: &MatcherConfig,
) -> bool {
    runner_up.amount_score >= 1.0
        && (best.text_score - runner_up.text_score).abs() <= config.tie_margin
}

/// Score one entry, or `None` when it falls outside the amount or date window.
pub fn score_entry(
    query: &ReconciliationQuery,
    entry: &LedgerEntry,
    config: &MatcherConfig,
) -> Option<ReconciliationCandidate> {
    let amount = amount_score(query.amount, entry.amount, config)?;

    let day_distance = (entry.date - query.issue_date).num_days().abs();
    if day_distance > config.date_window_days {
        return None;
    }
    let date = 1.0 - day_distance as f64 / (config.date_window_days + 1) as f64;

    let text = best_similarity(
        &entry.description,
        &[query.counterparty_name.as_str(), query.label.as_str()],
    );

    let total_weight = config.amount_weight + config.date_weight + config.text_weight;
    let score = if total_weight > 0.0 {
        (config.amount_weight * amount + config.date_weight * date + config.text_weight * text)
            / total_weight
    } else {
        0.0
    };

    debug!(
        entry = %entry.id,
        amount_score = amount,
        date_score = date,
        text_score = text,
        score,
        "scored ledger entry"
    );

    Some(ReconciliationCandidate {
        entry: entry.clone(),
        score,
        day_distance,
        amount_score: amount,
        text_score: text,
    })
}

/// 1.0 within the absolute tolerance, decaying linearly with the difference
/// relative to the invoice amount, `None` past the window. Signs are ignored:
/// statements record outflows as negative amounts.
fn amount_score(expected: Decimal, actual: Decimal, config: &MatcherConfig) -> Option<f64> {
    let expected = expected.abs();
    let actual = actual.abs();
    let diff = (expected - actual).abs();
    if diff <= config.amount_abs_tolerance {
        return Some(1.0);
    }
    if expected.is_zero() {
        return None;
    }

    let relative = (diff / expected).to_f64()?;
    if relative > config.amount_window_pct || config.amount_window_pct <= 0.0 {
        return None;
    }
    Some(1.0 - relative / config.amount_window_pct)
}
