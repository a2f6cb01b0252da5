//! Predicate compiler: turns user-authored segment rules into a
//! parameterized SQL filter over the allow-listed customer fields.

use chrono::{DateTime, NaiveDate, Utc};
use crm_core::types::{Customer, Rule, RuleValue};
use serde::Serialize;
use tracing::debug;

use crate::fields::{CustomerField, FieldKind, RuleOperator};

/// A value bound to a placeholder. Never interpolated into clause text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlParam {
    Text(String),
    Number(f64),
    Timestamp(DateTime<Utc>),
}

/// One retained rule, typed against the allow-list.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: CustomerField,
    pub operator: RuleOperator,
    /// Coerced rule value. For `contains` this is the bare needle; the bound
    /// parameter carries the wildcard-wrapped pattern.
    pub operand: SqlParam,
}

/// Why a rule was left out of the compiled predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MissingField,
    MissingOperator,
    MissingValue,
    UnknownField,
    UnsupportedOperator,
    OperatorNotAllowedForField,
    UncoercibleValue,
}

/// Parameterized filter compiled from a rule set.
///
/// `clause` holds exactly one `$n` placeholder per entry in `parameters`,
/// numbered in order. An empty predicate means "no valid filter" and must
/// never be executed as an unfiltered query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledPredicate {
    clause: String,
    parameters: Vec<SqlParam>,
    conditions: Vec<Condition>,
}

impl CompiledPredicate {
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Boolean expression usable directly inside a `WHERE`.
    pub fn clause(&self) -> &str {
        &self.clause
    }

    pub fn parameters(&self) -> &[SqlParam] {
        &self.parameters
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn where_clause(&self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(format!("WHERE {}", self.clause))
        }
    }

    /// Evaluate the predicate against an in-memory record with SQL semantics:
    /// missing values never match and `contains` is case-insensitive.
    /// An empty predicate matches nothing.
    pub fn matches(&self, customer: &Customer) -> bool {
        !self.is_empty() && self.conditions.iter().all(|c| c.matches(customer))
    }
}

impl Condition {
    /// The value bound to this condition's placeholder.
    pub fn parameter(&self) -> SqlParam {
        match (&self.operator, &self.operand) {
            (RuleOperator::Contains, SqlParam::Text(needle)) => {
                SqlParam::Text(format!("%{}%", escape_like(needle)))
            }
            (_, operand) => operand.clone(),
        }
    }

    fn fragment(&self, placeholder: usize) -> String {
        format!(
            "{} {} ${}",
            self.field.quoted_column(),
            self.operator.sql(),
            placeholder
        )
    }

    pub fn matches(&self, customer: &Customer) -> bool {
        use RuleOperator::*;
        match (field_value(customer, self.field), &self.operand) {
            (FieldValue::Text(Some(actual)), SqlParam::Text(expected)) => match self.operator {
                Equals => actual == expected.as_str(),
                NotEquals => actual != expected.as_str(),
                Contains => actual.to_lowercase().contains(&expected.to_lowercase()),
                _ => false,
            },
            (FieldValue::Number(actual), SqlParam::Number(expected)) => {
                compare(actual.partial_cmp(expected), self.operator)
            }
            (FieldValue::Timestamp(actual), SqlParam::Timestamp(expected)) => {
                compare(Some(actual.cmp(expected)), self.operator)
            }
            _ => false,
        }
    }
}

enum FieldValue<'a> {
    Text(Option<&'a str>),
    Number(f64),
    Timestamp(DateTime<Utc>),
}

fn field_value(customer: &Customer, field: CustomerField) -> FieldValue<'_> {
    match field {
        CustomerField::Status => FieldValue::Text(Some(&customer.status)),
        CustomerField::Industry => FieldValue::Text(customer.industry.as_deref()),
        CustomerField::Email => FieldValue::Text(Some(&customer.email)),
        CustomerField::Company => FieldValue::Text(customer.company.as_deref()),
        CustomerField::FirstName => FieldValue::Text(Some(&customer.first_name)),
        CustomerField::LastName => FieldValue::Text(Some(&customer.last_name)),
        CustomerField::Value => FieldValue::Number(customer.value),
        CustomerField::CreatedAt => FieldValue::Timestamp(customer.created_at),
    }
}

fn compare(ordering: Option<std::cmp::Ordering>, operator: RuleOperator) -> bool {
    use std::cmp::Ordering;
    match (ordering, operator) {
        (Some(Ordering::Equal), RuleOperator::Equals) => true,
        (Some(o), RuleOperator::NotEquals) => o != Ordering::Equal,
        (Some(Ordering::Greater), RuleOperator::GreaterThan) => true,
        (Some(Ordering::Less), RuleOperator::LessThan) => true,
        _ => false,
    }
}

/// Escape LIKE metacharacters so user text only ever matches literally.
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Render a number the way it would be typed, without a trailing `.0`.
fn number_text(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn coerce(kind: FieldKind, value: &RuleValue) -> Option<SqlParam> {
    match kind {
        FieldKind::Number => {
            let n = match value {
                RuleValue::Number(n) => *n,
                RuleValue::Text(s) => parse_float_prefix(s)?,
                RuleValue::Other(_) => return None,
            };
            (!n.is_nan()).then_some(SqlParam::Number(n))
        }
        FieldKind::Timestamp => match value {
            RuleValue::Text(s) => parse_timestamp(s.trim()),
            _ => None,
        },
        FieldKind::Text => match value {
            RuleValue::Text(s) => Some(SqlParam::Text(s.clone())),
            RuleValue::Number(n) if n.is_finite() => Some(SqlParam::Text(number_text(*n))),
            _ => None,
        },
    }
}

/// Read the longest leading decimal number, ignoring leading whitespace and
/// any trailing text: `"1000 USD"` is 1000, `"1,000"` is 1. `Infinity` is
/// accepted with an optional sign. `None` when no number starts the string.
fn parse_float_prefix(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let sign_len = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));

    if s[sign_len..].starts_with("Infinity") {
        return Some(if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }

    let digits = |from: usize| {
        bytes[from..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let int_digits = digits(sign_len);
    let mut end = sign_len + int_digits;
    let mut mantissa_digits = int_digits;
    if bytes.get(end) == Some(&b'.') {
        let frac_digits = digits(end + 1);
        if int_digits + frac_digits > 0 {
            end += 1 + frac_digits;
            mantissa_digits += frac_digits;
        }
    }
    if mantissa_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let exp_sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exp_digits = digits(end + 1 + exp_sign);
        if exp_digits > 0 {
            end += 1 + exp_sign + exp_digits;
        }
    }

    s[..end].parse().ok()
}

fn parse_timestamp(raw: &str) -> Option<SqlParam> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(SqlParam::Timestamp(ts.with_timezone(&Utc)));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| SqlParam::Timestamp(dt.and_utc()))
}

/// Validate a single rule against the allow-list and coerce its value.
pub fn compile_rule(rule: &Rule) -> Result<Condition, DropReason> {
    let raw_field = rule
        .field
        .as_deref()
        .filter(|f| !f.is_empty())
        .ok_or(DropReason::MissingField)?;
    let raw_operator = rule
        .operator
        .as_deref()
        .filter(|o| !o.is_empty())
        .ok_or(DropReason::MissingOperator)?;
    let value = match &rule.value {
        None => return Err(DropReason::MissingValue),
        Some(RuleValue::Text(s)) if s.is_empty() => return Err(DropReason::MissingValue),
        Some(RuleValue::Other(serde_json::Value::Null)) => return Err(DropReason::MissingValue),
        Some(v) => v,
    };

    let field = CustomerField::lookup(raw_field).ok_or(DropReason::UnknownField)?;
    let operator = RuleOperator::parse(raw_operator).ok_or(DropReason::UnsupportedOperator)?;
    if !field.supports(operator) {
        return Err(DropReason::OperatorNotAllowedForField);
    }
    let operand = coerce(field.kind(), value).ok_or(DropReason::UncoercibleValue)?;

    Ok(Condition {
        field,
        operator,
        operand,
    })
}

/// Compile a rule set into a conjunctive, parameterized predicate.
///
/// Malformed rules are dropped, not rejected. If nothing survives the
/// result is empty (`clause == ""`, no parameters).
pub fn compile(rules: &[Rule]) -> CompiledPredicate {
    let mut predicate = CompiledPredicate::default();
    let mut fragments = Vec::with_capacity(rules.len());

    for (index, rule) in rules.iter().enumerate() {
        match compile_rule(rule) {
            Ok(condition) => {
                predicate.parameters.push(condition.parameter());
                fragments.push(condition.fragment(predicate.parameters.len()));
                predicate.conditions.push(condition);
            }
            Err(reason) => {
                debug!(rule_index = index, reason = ?reason, "Dropping segment rule");
            }
        }
    }

    predicate.clause = fragments.join(" AND ");
    predicate
}
