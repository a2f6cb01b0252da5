//! Segment evaluator: recomputes segment membership against the live
//! record store on every call.

use async_trait::async_trait;
use crm_core::types::{Customer, Rule, Segment};
use crm_core::{CrmError, CrmResult};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

use crate::predicates::{compile, CompiledPredicate};

/// Read access to customer records filtered by a compiled predicate.
///
/// Implementations are only ever handed non-empty predicates.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn count_matching(&self, predicate: &CompiledPredicate) -> CrmResult<u64>;

    async fn fetch_matching(&self, predicate: &CompiledPredicate) -> CrmResult<Vec<Customer>>;
}

/// A segment together with its live membership count.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentSummary {
    #[serde(flatten)]
    pub segment: Segment,
    pub rules: Vec<Rule>,
    pub count: u64,
}

/// Evaluates rule sets against a record store handle passed in at startup.
#[derive(Clone)]
pub struct SegmentEvaluator {
    store: Arc<dyn RecordStore>,
}

impl SegmentEvaluator {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Number of records matching the rule set. Zero, without touching the
    /// store, when no rule survives compilation.
    pub async fn count(&self, rules: &[Rule]) -> CrmResult<u64> {
        self.count_compiled(&compile(rules)).await
    }

    /// All records matching the rule set, in the store's natural order.
    /// Empty, without touching the store, when no rule survives compilation.
    pub async fn members(&self, rules: &[Rule]) -> CrmResult<Vec<Customer>> {
        self.members_compiled(&compile(rules)).await
    }

    /// `count` for a predicate the caller has already compiled.
    pub async fn count_compiled(&self, predicate: &CompiledPredicate) -> CrmResult<u64> {
        if predicate.is_empty() {
            debug!("No valid rules, segment count is zero");
            return Ok(0);
        }

        self.store
            .count_matching(predicate)
            .await
            .map_err(|e| evaluation_failed("count", e))
    }

    /// `members` for a predicate the caller has already compiled.
    pub async fn members_compiled(&self, predicate: &CompiledPredicate) -> CrmResult<Vec<Customer>> {
        if predicate.is_empty() {
            debug!("No valid rules, segment has no members");
            return Ok(Vec::new());
        }

        self.store
            .fetch_matching(predicate)
            .await
            .map_err(|e| evaluation_failed("members", e))
    }

    pub async fn summarize(&self, segment: Segment) -> CrmResult<SegmentSummary> {
        let count = self.count(segment.rules()).await?;
        let rules = segment.criteria.rules.clone();
        Ok(SegmentSummary {
            segment,
            rules,
            count,
        })
    }
}

fn evaluation_failed(operation: &'static str, err: CrmError) -> CrmError {
    error!(operation, error = %err, "Segment evaluation failed");
    metrics::counter!("segments.evaluation_failures").increment(1);
    if matches!(err, CrmError::Evaluation(_)) {
        err
    } else {
        CrmError::Evaluation(err.to_string())
    }
}
