use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A customer row as held by the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    pub status: String,
    pub value: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_contact: Option<DateTime<Utc>>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
}

// ─── Segment rules ─────────────────────────────────────────────────────────

/// A single user-authored filter condition, exactly as submitted.
///
/// Every part is optional so that malformed rules survive deserialization
/// and are dropped by the predicate compiler instead of failing the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub operator: Option<String>,
    #[serde(default)]
    pub value: Option<RuleValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleValue {
    Text(String),
    Number(f64),
    /// Anything else (booleans, arrays, objects). Never compiles.
    Other(serde_json::Value),
}

impl Rule {
    pub fn new(field: &str, operator: &str, value: impl Into<RuleValue>) -> Self {
        Self {
            field: Some(field.to_string()),
            operator: Some(operator.to_string()),
            value: Some(value.into()),
        }
    }
}

impl From<&str> for RuleValue {
    fn from(s: &str) -> Self {
        RuleValue::Text(s.to_string())
    }
}

impl From<String> for RuleValue {
    fn from(s: String) -> Self {
        RuleValue::Text(s)
    }
}

impl From<f64> for RuleValue {
    fn from(n: f64) -> Self {
        RuleValue::Number(n)
    }
}

/// Stored criteria document: `{ "rules": [...] }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentCriteria {
    #[serde(default)]
    pub rules: Vec<Rule>,
}

// ─── Segments ──────────────────────────────────────────────────────────────

/// A named, saved rule set. Membership is never stored on the segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub criteria: SegmentCriteria,
    pub created_at: DateTime<Utc>,
}

impl Segment {
    pub fn rules(&self) -> &[Rule] {
        &self.criteria.rules
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSegment {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub criteria: SegmentCriteria,
}

// ─── Activity log ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    SegmentCreated,
    SegmentDeleted,
    SegmentExported,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::SegmentCreated => "segment_created",
            ActivityAction::SegmentDeleted => "segment_deleted",
            ActivityAction::SegmentExported => "segment_exported",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub action: String,
    pub user_name: String,
    pub target: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub action: ActivityAction,
    pub user_name: String,
    pub target: String,
    pub details: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_accepts_string_and_number_values() {
        let rules: Vec<Rule> = serde_json::from_str(
            r#"[
                {"field": "status", "operator": "eq", "value": "Active"},
                {"field": "value", "operator": "gt", "value": 1000},
                {"field": "status", "operator": "eq", "value": true},
                {"operator": "eq"}
            ]"#,
        )
        .unwrap();

        assert_eq!(rules[0].value, Some(RuleValue::Text("Active".into())));
        assert_eq!(rules[1].value, Some(RuleValue::Number(1000.0)));
        assert!(matches!(rules[2].value, Some(RuleValue::Other(_))));
        assert_eq!(rules[3].field, None);
        assert_eq!(rules[3].value, None);
    }

    #[test]
    fn test_segment_criteria_defaults_to_no_rules() {
        let segment: Segment = serde_json::from_str(
            r#"{"id": 7, "name": "Empty", "created_at": "2024-03-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(segment.rules().is_empty());
        assert_eq!(segment.description, None);
    }

    #[test]
    fn test_customer_uses_camel_case_on_the_wire() {
        let json = r#"{
            "id": 1, "firstName": "Jane", "lastName": "Smith",
            "email": "jane@example.com", "status": "Active", "value": 1500.0,
            "createdAt": "2024-01-15T10:00:00Z",
            "address": {"street": "1 Main St", "city": "NYC"},
            "tags": ["VIP"]
        }"#;
        let customer: Customer = serde_json::from_str(json).unwrap();
        assert_eq!(customer.first_name, "Jane");
        let address = customer.address.unwrap();
        assert_eq!(address.city.as_deref(), Some("NYC"));
        assert_eq!(address.zip, None);
        assert_eq!(customer.tags, vec!["VIP".to_string()]);
    }
}
