//! Customer exports: CSV formatting and the segment export pipeline.

pub mod csv_export;
pub mod segment_export;

pub use csv_export::{CsvExporter, DEFAULT_EXPORT_COLUMNS};
pub use segment_export::{export_filename, ExportOutcome, SegmentExport, SegmentExporter};
