//! Allow-list of customer fields that segment rules may filter on.

use serde::{Deserialize, Serialize};

/// Comparison operators a rule may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
}

impl RuleOperator {
    /// Parse the wire name used by the segment builder.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "eq" => Some(RuleOperator::Equals),
            "ne" => Some(RuleOperator::NotEquals),
            "gt" => Some(RuleOperator::GreaterThan),
            "lt" => Some(RuleOperator::LessThan),
            "contains" => Some(RuleOperator::Contains),
            _ => None,
        }
    }

    pub fn wire_name(&self) -> &'static str {
        match self {
            RuleOperator::Equals => "eq",
            RuleOperator::NotEquals => "ne",
            RuleOperator::GreaterThan => "gt",
            RuleOperator::LessThan => "lt",
            RuleOperator::Contains => "contains",
        }
    }

    /// SQL comparator emitted between the quoted column and its placeholder.
    pub fn sql(&self) -> &'static str {
        match self {
            RuleOperator::Equals => "=",
            RuleOperator::NotEquals => "!=",
            RuleOperator::GreaterThan => ">",
            RuleOperator::LessThan => "<",
            RuleOperator::Contains => "ILIKE",
        }
    }
}

/// Value type of a filterable field; drives coercion and operator support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Timestamp,
}

impl FieldKind {
    pub fn operators(&self) -> &'static [RuleOperator] {
        use RuleOperator::*;
        match self {
            FieldKind::Text => &[Equals, NotEquals, Contains],
            FieldKind::Number | FieldKind::Timestamp => &[Equals, NotEquals, GreaterThan, LessThan],
        }
    }
}

/// The closed set of customer fields a rule can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CustomerField {
    Status,
    Industry,
    Value,
    Email,
    Company,
    FirstName,
    LastName,
    CreatedAt,
}

impl CustomerField {
    pub const ALL: [CustomerField; 8] = [
        CustomerField::Status,
        CustomerField::Industry,
        CustomerField::Value,
        CustomerField::Email,
        CustomerField::Company,
        CustomerField::FirstName,
        CustomerField::LastName,
        CustomerField::CreatedAt,
    ];

    /// Resolve a rule's `field` against the allow-list. Accepts the
    /// camelCase wire key and the snake_case column name.
    pub fn lookup(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.key() == raw || f.column() == raw)
    }

    pub fn key(&self) -> &'static str {
        match self {
            CustomerField::Status => "status",
            CustomerField::Industry => "industry",
            CustomerField::Value => "value",
            CustomerField::Email => "email",
            CustomerField::Company => "company",
            CustomerField::FirstName => "firstName",
            CustomerField::LastName => "lastName",
            CustomerField::CreatedAt => "createdAt",
        }
    }

    /// Column name in the `customers` table.
    pub fn column(&self) -> &'static str {
        match self {
            CustomerField::Status => "status",
            CustomerField::Industry => "industry",
            CustomerField::Value => "value",
            CustomerField::Email => "email",
            CustomerField::Company => "company",
            CustomerField::FirstName => "first_name",
            CustomerField::LastName => "last_name",
            CustomerField::CreatedAt => "created_at",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            CustomerField::Value => FieldKind::Number,
            CustomerField::CreatedAt => FieldKind::Timestamp,
            _ => FieldKind::Text,
        }
    }

    /// Operators this field accepts. Substring matching is limited to the
    /// enumerable text columns.
    pub fn operators(&self) -> &'static [RuleOperator] {
        use RuleOperator::*;
        match self {
            CustomerField::Status | CustomerField::Industry => &[Equals, NotEquals, Contains],
            CustomerField::Email
            | CustomerField::Company
            | CustomerField::FirstName
            | CustomerField::LastName => &[Equals, NotEquals],
            CustomerField::Value | CustomerField::CreatedAt => self.kind().operators(),
        }
    }

    pub fn supports(&self, operator: RuleOperator) -> bool {
        self.operators().contains(&operator)
    }

    /// Double-quoted SQL identifier for this field's column.
    pub fn quoted_column(&self) -> String {
        format!("\"{}\"", self.column())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_accepts_wire_key_and_column() {
        assert_eq!(CustomerField::lookup("firstName"), Some(CustomerField::FirstName));
        assert_eq!(CustomerField::lookup("first_name"), Some(CustomerField::FirstName));
        assert_eq!(CustomerField::lookup("status"), Some(CustomerField::Status));
        assert_eq!(CustomerField::lookup("password"), None);
        assert_eq!(CustomerField::lookup("status\" OR 1=1 --"), None);
    }

    #[test]
    fn test_contains_limited_to_enumerable_fields() {
        assert!(CustomerField::Status.supports(RuleOperator::Contains));
        for field in [
            CustomerField::Email,
            CustomerField::Company,
            CustomerField::FirstName,
            CustomerField::LastName,
        ] {
            assert!(!field.supports(RuleOperator::Contains), "{field:?}");
            assert!(field.supports(RuleOperator::Equals));
            assert!(field.supports(RuleOperator::NotEquals));
        }
    }

    #[test]
    fn test_operator_support_follows_field_kind() {
        assert!(CustomerField::Industry.supports(RuleOperator::Contains));
        assert!(!CustomerField::Industry.supports(RuleOperator::GreaterThan));
        assert!(CustomerField::Value.supports(RuleOperator::GreaterThan));
        assert!(!CustomerField::Value.supports(RuleOperator::Contains));
        assert!(CustomerField::CreatedAt.supports(RuleOperator::LessThan));
    }

    #[test]
    fn test_operator_wire_names_round_trip() {
        for raw in ["eq", "ne", "gt", "lt", "contains"] {
            let op = RuleOperator::parse(raw).unwrap();
            assert_eq!(op.wire_name(), raw);
        }
        assert_eq!(RuleOperator::parse("gte"), None);
        assert_eq!(RuleOperator::parse("EQ"), None);
    }

    #[test]
    fn test_quoted_column_uses_storage_name() {
        assert_eq!(CustomerField::LastName.quoted_column(), "\"last_name\"");
    }
}
