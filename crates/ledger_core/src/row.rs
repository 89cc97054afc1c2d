use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub type PageId = String;

/// One statement line. Amounts travel as decimal strings; the backend may also
/// send bare numbers or `null`, which are read as their text or as empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Row {
    #[serde(default, deserialize_with = "lenient_text")]
    pub row_id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub debit: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub credit: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub balance: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowField {
    Date,
    Description,
    Debit,
    Credit,
    Balance,
}

impl Row {
    pub fn get(&self, field: RowField) -> &str {
        match field {
            RowField::Date => &self.date,
            RowField::Description => &self.description,
            RowField::Debit => &self.debit,
            RowField::Credit => &self.credit,
            RowField::Balance => &self.balance,
        }
    }

    pub fn set(&mut self, field: RowField, value: String) {
        match field {
            RowField::Date => self.date = value,
            RowField::Description => self.description = value,
            RowField::Debit => self.debit = value,
            RowField::Credit => self.credit = value,
            RowField::Balance => self.balance = value,
        }
    }

    /// Copies every value field, leaving the identity untouched.
    pub(crate) fn copy_values_from(&mut self, other: &Row) {
        self.date.clone_from(&other.date);
        self.description.clone_from(&other.description);
        self.debit.clone_from(&other.debit);
        self.credit.clone_from(&other.credit);
        self.balance.clone_from(&other.balance);
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text,
        Some(Value::Number(number)) => number.to_string(),
        Some(other) => other.to_string(),
    })
}

/// Parses an amount as entered: currency symbols, spaces and thousands
/// separators are ignored. Returns `None` when no number can be read.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|ch| ch.is_ascii_digit() || *ch == '.' || *ch == '-')
        .collect();
    if matches!(cleaned.as_str(), "" | "-" | "." | "-.") {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Canonical two-decimal form of an amount. Unparsable text is kept as typed
/// (trimmed) so the user's input is never destroyed.
pub fn normalize_amount(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    match parse_amount(trimmed) {
        // Avoid "-0.00".
        Some(value) if value == 0.0 => "0.00".to_string(),
        Some(value) => format!("{value:.2}"),
        None => trimmed.to_string(),
    }
}

/// Gives every row without an id the next sequential, zero-padded id after the
/// highest numeric id already on the page.
pub fn assign_row_ids(rows: &mut [Row]) {
    let mut next = rows
        .iter()
        .filter_map(|row| row.row_id.trim().parse::<u32>().ok())
        .max()
        .unwrap_or(0)
        + 1;
    for row in rows.iter_mut() {
        if row.row_id.trim().is_empty() {
            row.row_id = format!("{next:03}");
            next += 1;
        }
    }
}

/// Prepares rows for persisting: ids assigned, amounts canonical.
pub fn normalize_rows(rows: &mut [Row]) {
    assign_row_ids(rows);
    for row in rows.iter_mut() {
        row.debit = normalize_amount(&row.debit);
        row.credit = normalize_amount(&row.credit);
        row.balance = normalize_amount(&row.balance);
    }
}

/// `page_001.png` -> `page_001`.
pub fn page_id_from_file(name: &str) -> PageId {
    let name = name.trim();
    match name.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem.to_string(),
        _ => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_are_canonicalised() {
        assert_eq!(normalize_amount(" 1,234.5 "), "1234.50");
        assert_eq!(normalize_amount("$20"), "20.00");
        assert_eq!(normalize_amount("-0"), "0.00");
        assert_eq!(normalize_amount(""), "");
    }

    #[test]
    fn unparsable_amount_is_preserved() {
        assert_eq!(normalize_amount("  n/a "), "n/a");
        assert_eq!(normalize_amount("12-3"), "12-3");
        assert_eq!(parse_amount("12-3"), None);
    }

    #[test]
    fn missing_ids_continue_after_highest() {
        let mut rows = vec![
            Row {
                row_id: "004".into(),
                ..Row::default()
            },
            Row::default(),
            Row::default(),
        ];
        assign_row_ids(&mut rows);
        let ids: Vec<_> = rows.iter().map(|r| r.row_id.as_str()).collect();
        assert_eq!(ids, vec!["004", "005", "006"]);
    }

    #[test]
    fn numeric_amounts_deserialize_as_text() {
        let row: Row = serde_json::from_str(
            r#"{"row_id":"001","date":"02/01/2026","debit":null,"credit":1000.0,"balance":"1000.00"}"#,
        )
        .unwrap();
        assert_eq!(row.debit, "");
        assert_eq!(row.credit, "1000.0");
        assert_eq!(row.description, "");
    }

    #[test]
    fn page_ids_drop_extension() {
        assert_eq!(page_id_from_file("page_001.png"), "page_001");
        assert_eq!(page_id_from_file("page_002"), "page_002");
    }
}
