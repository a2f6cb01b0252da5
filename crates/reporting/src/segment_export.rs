//! Segment export pipeline: rule set → members → CSV attachment.

use crm_core::types::Segment;
use crm_core::CrmResult;
use crm_segmentation::{compile, SegmentEvaluator};
use tracing::info;

use crate::csv_export::{CsvExporter, DEFAULT_EXPORT_COLUMNS};

pub const EXPORT_FILENAME_SUFFIX: &str = "_customers.csv";

/// Download filename for a segment export: spaces become underscores.
pub fn export_filename(segment_name: &str) -> String {
    format!("{}{}", segment_name.replace(' ', "_"), EXPORT_FILENAME_SUFFIX)
}

#[derive(Debug, Clone)]
pub struct SegmentExport {
    pub filename: String,
    pub csv: String,
    pub row_count: usize,
}

/// Result of a segment export. The two empty cases are kept apart so
/// callers can tell "fix your rules" from "nobody matches yet".
#[derive(Debug, Clone)]
pub enum ExportOutcome {
    Ready(SegmentExport),
    NoValidRules,
    NoMatches,
}

#[derive(Clone)]
pub struct SegmentExporter {
    evaluator: SegmentEvaluator,
    csv: CsvExporter,
}

impl SegmentExporter {
    pub fn new(evaluator: SegmentEvaluator, csv: CsvExporter) -> Self {
        Self { evaluator, csv }
    }

    pub async fn export(&self, segment: &Segment) -> CrmResult<ExportOutcome> {
        let predicate = compile(segment.rules());
        if predicate.is_empty() {
            return Ok(ExportOutcome::NoValidRules);
        }

        let members = self.evaluator.members_compiled(&predicate).await?;
        if members.is_empty() {
            return Ok(ExportOutcome::NoMatches);
        }

        let csv = self.csv.to_csv(&members, &DEFAULT_EXPORT_COLUMNS);
        info!(
            segment_id = segment.id,
            rows = members.len(),
            "Segment exported"
        );
        Ok(ExportOutcome::Ready(SegmentExport {
            filename: export_filename(&segment.name),
            csv,
            row_count: members.len(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_filename_replaces_spaces() {
        assert_eq!(export_filename("High Value Tech"), "High_Value_Tech_customers.csv");
        assert_eq!(export_filename("VIP"), "VIP_customers.csv");
        assert_eq!(export_filename("  two  "), "__two___customers.csv");
    }
}
