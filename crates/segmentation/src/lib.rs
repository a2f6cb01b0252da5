//! Customer segmentation: allow-listed rule fields, the predicate compiler,
//! and the segment evaluator that counts and fetches members.

pub mod engine;
pub mod fields;
pub mod predicates;

pub use engine::{RecordStore, SegmentEvaluator, SegmentSummary};
pub use fields::{CustomerField, FieldKind, RuleOperator};
pub use predicates::{compile, CompiledPredicate, Condition, SqlParam};
