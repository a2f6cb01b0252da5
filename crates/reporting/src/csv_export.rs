//! CSV export of customer records with nested fields flattened into columns.

use chrono::{DateTime, SecondsFormat, Utc};
use crm_core::types::Customer;
use std::collections::HashMap;

/// Column order used when the caller does not supply one.
pub const DEFAULT_EXPORT_COLUMNS: [&str; 17] = [
    "id",
    "first_name",
    "last_name",
    "email",
    "phone",
    "company",
    "industry",
    "status",
    "value",
    "created_at",
    "updated_at",
    "last_contact",
    "address_street",
    "address_city",
    "address_state",
    "address_zip",
    "tags",
];

/// A customer reduced to flat, optional text cells keyed by column name.
pub type FlatRecord = HashMap<&'static str, Option<String>>;

#[derive(Debug, Clone)]
pub struct CsvExporter {
    tag_delimiter: String,
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self::new("; ")
    }
}

fn iso(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Quote a cell, doubling embedded quotes. Missing values become `""`.
fn quote_cell(value: Option<&str>) -> String {
    format!("\"{}\"", value.unwrap_or_default().replace('"', "\"\""))
}

impl CsvExporter {
    pub fn new(tag_delimiter: impl Into<String>) -> Self {
        Self {
            tag_delimiter: tag_delimiter.into(),
        }
    }

    /// Flatten nested address and tag fields. The nested `address` key
    /// itself is never present in the result.
    pub fn flatten(&self, customer: &Customer) -> FlatRecord {
        let address = customer.address.clone().unwrap_or_default();
        let mut row = FlatRecord::new();
        row.insert("id", Some(customer.id.to_string()));
        row.insert("first_name", Some(customer.first_name.clone()));
        row.insert("last_name", Some(customer.last_name.clone()));
        row.insert("email", Some(customer.email.clone()));
        row.insert("phone", customer.phone.clone());
        row.insert("company", customer.company.clone());
        row.insert("industry", customer.industry.clone());
        row.insert("status", Some(customer.status.clone()));
        row.insert("value", Some(customer.value.to_string()));
        row.insert("created_at", Some(iso(&customer.created_at)));
        row.insert("updated_at", customer.updated_at.as_ref().map(iso));
        row.insert("last_contact", customer.last_contact.as_ref().map(iso));
        row.insert("address_street", address.street);
        row.insert("address_city", address.city);
        row.insert("address_state", address.state);
        row.insert("address_zip", address.zip);
        row.insert("tags", Some(customer.tags.join(&self.tag_delimiter)));
        row
    }

    /// Render records as CSV in exactly the given column order.
    ///
    /// Every cell, header included, is quoted; each line ends with `\n`.
    /// Unknown column names produce empty cells. No records yields the
    /// header line alone.
    pub fn to_csv<S: AsRef<str>>(&self, records: &[Customer], columns: &[S]) -> String {
        let mut csv = columns
            .iter()
            .map(|c| quote_cell(Some(c.as_ref())))
            .collect::<Vec<_>>()
            .join(",");
        csv.push('\n');

        for customer in records {
            let row = self.flatten(customer);
            let cells: Vec<String> = columns
                .iter()
                .map(|c| quote_cell(row.get(c.as_ref()).and_then(|v| v.as_deref())))
                .collect();
            csv.push_str(&cells.join(","));
            csv.push('\n');
        }
        csv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crm_core::types::Address;

    fn sample() -> Customer {
        Customer {
            id: 7,
            first_name: "Jane".into(),
            last_name: "Smith".into(),
            email: "jane@example.com".into(),
            phone: None,
            company: Some("Acme \"Corp\"".into()),
            industry: Some("Technology".into()),
            status: "Active".into(),
            value: 1500.0,
            created_at: Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap(),
            updated_at: None,
            last_contact: None,
            address: Some(Address {
                street: Some("1 Main St".into()),
                city: Some("NYC".into()),
                state: Some("NY".into()),
                zip: Some("10001".into()),
            }),
            tags: vec!["VIP".into(), "Enterprise".into()],
        }
    }

    /// Minimal reader for one line of fully quoted cells.
    fn parse_line(line: &str) -> Vec<String> {
        let mut cells = Vec::new();
        let mut current = String::new();
        let mut chars = line.chars().peekable();
        let mut in_quotes = false;
        while let Some(ch) = chars.next() {
            match (ch, in_quotes) {
                ('"', true) if chars.peek() == Some(&'"') => {
                    current.push('"');
                    chars.next();
                }
                ('"', _) => in_quotes = !in_quotes,
                (',', false) => cells.push(std::mem::take(&mut current)),
                (c, _) => current.push(c),
            }
        }
        cells.push(current);
        cells
    }

    #[test]
    fn test_quotes_are_doubled_and_parse_back() {
        let csv = CsvExporter::default().to_csv(&[sample()], &["company"]);
        let data_line = csv.lines().nth(1).unwrap();
        assert_eq!(data_line, "\"Acme \"\"Corp\"\"\"");
        assert_eq!(parse_line(data_line), vec!["Acme \"Corp\"".to_string()]);
    }

    #[test]
    fn test_address_is_split_into_columns() {
        let exporter = CsvExporter::default();
        let flat = exporter.flatten(&sample());
        assert!(!flat.contains_key("address"));

        let csv = exporter.to_csv(&[sample()], &DEFAULT_EXPORT_COLUMNS);
        let mut lines = csv.lines();
        let header = parse_line(lines.next().unwrap());
        let row = parse_line(lines.next().unwrap());
        assert!(!header.contains(&"address".to_string()));

        let cell = |name: &str| {
            let idx = header.iter().position(|h| h == name).unwrap();
            row[idx].clone()
        };
        assert_eq!(cell("address_street"), "1 Main St");
        assert_eq!(cell("address_city"), "NYC");
        assert_eq!(cell("address_state"), "NY");
        assert_eq!(cell("address_zip"), "10001");
    }

    #[test]
    fn test_numbers_dates_tags_and_nulls() {
        let csv = CsvExporter::default().to_csv(
            &[sample()],
            &["id", "value", "created_at", "updated_at", "phone", "tags"],
        );
        let row = csv.lines().nth(1).unwrap();
        assert_eq!(
            row,
            "\"7\",\"1500\",\"2024-01-15T10:30:00.000Z\",\"\",\"\",\"VIP; Enterprise\""
        );
    }

    #[test]
    fn test_missing_address_renders_empty_cells() {
        let mut customer = sample();
        customer.address = None;
        let csv = CsvExporter::new("|").to_csv(&[customer], &["address_city", "tags"]);
        assert_eq!(csv.lines().nth(1).unwrap(), "\"\",\"VIP|Enterprise\"");
    }

    #[test]
    fn test_empty_input_yields_header_only() {
        let csv = CsvExporter::default().to_csv(&[], &DEFAULT_EXPORT_COLUMNS);
        assert_eq!(csv.lines().count(), 1);
        assert_eq!(
            parse_line(csv.lines().next().unwrap()).len(),
            DEFAULT_EXPORT_COLUMNS.len()
        );
        assert!(csv.ends_with('\n'));
    }

    #[test]
    fn test_column_order_is_caller_defined() {
        let exporter = CsvExporter::default();
        let a = exporter.to_csv(&[sample()], &["status", "email"]);
        let b = exporter.to_csv(&[sample()], &["email", "status"]);
        assert_eq!(a.lines().nth(1).unwrap(), "\"Active\",\"jane@example.com\"");
        assert_eq!(b.lines().nth(1).unwrap(), "\"jane@example.com\",\"Active\"");
    }
}
