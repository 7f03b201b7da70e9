use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Length of a well-formed activation code once separators are stripped.
pub const CODE_LENGTH: usize = 16;

/// A single-use redemption code tied to one app.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Code {
    pub id: Uuid,
    pub app_id: Uuid,
    pub code: String,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl Code {
    pub fn new(app_id: Uuid, code: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            app_id,
            code,
            used: false,
            created_at: Utc::now(),
        }
    }
}

/// Outcome of a bulk import.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CodeImportReport {
    /// Cleaned codes accepted for import, in input order.
    pub imported: Vec<String>,
    /// Cleaned codes repeated inside the submitted batch.
    pub duplicates: Vec<String>,
    /// Cleaned codes that already exist in the system.
    pub system_duplicates: Vec<String>,
    /// Raw entries that do not clean up to a valid code.
    pub invalid: Vec<String>,
}

impl CodeImportReport {
    pub fn rejected(&self) -> usize {
        self.duplicates.len() + self.system_duplicates.len() + self.invalid.len()
    }
}

/// Strips everything but ASCII digits.
pub fn clean_code(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

pub fn is_valid_code(raw: &str) -> bool {
    clean_code(raw).len() == CODE_LENGTH
}

/// Renders a valid code as four dash-separated groups of four digits.
/// Anything that is not a valid code comes back untouched.
pub fn format_code(raw: &str) -> String {
    let cleaned = clean_code(raw);
    if cleaned.len() != CODE_LENGTH {
        return raw.to_string();
    }
    cleaned
        .as_bytes()
        .chunks(4)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("-")
}

/// Sorts a raw batch into accepted, duplicated and invalid entries.
///
/// Single pass in input order. A code seen earlier in the batch is a batch
/// duplicate; otherwise a code already in `existing` is a system duplicate.
/// Each duplicate is reported once no matter how often it repeats.
pub fn validate_codes<'a, I, E>(new_codes: I, existing: E) -> CodeImportReport
where
    I: IntoIterator<Item = &'a str>,
    E: IntoIterator<Item = &'a str>,
{
    let existing: HashSet<String> = existing.into_iter().map(clean_code).collect();

    let mut report = CodeImportReport::default();
    let mut seen = HashSet::new();
    let mut duplicates = HashSet::new();
    let mut system_duplicates = HashSet::new();

    for raw in new_codes {
        let cleaned = clean_code(raw);
        if cleaned.len() != CODE_LENGTH {
            if !raw.trim().is_empty() {
                report.invalid.push(raw.trim().to_string());
            }
            continue;
        }

        if seen.contains(&cleaned) {
            if duplicates.insert(cleaned.clone()) {
                report.duplicates.push(cleaned);
            }
        } else if existing.contains(&cleaned) {
            if system_duplicates.insert(cleaned.clone()) {
                report.system_duplicates.push(cleaned);
            }
        } else {
            seen.insert(cleaned.clone());
            report.imported.push(cleaned);
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "1234-5678-9012-3456";
    const B: &str = "1111222233334444";

    #[test]
    fn test_clean_and_validate() {
        assert_eq!(clean_code(" 1234-5678 9012.3456 "), "1234567890123456");
        assert!(is_valid_code(A));
        assert!(!is_valid_code("1234-5678"));
        assert!(!is_valid_code("12345678901234567"));
    }

    #[test]
    fn test_format_code() {
        assert_eq!(format_code("1234567890123456"), A);
        assert_eq!(format_code("abc"), "abc");
    }

    #[test]
    fn test_batch_duplicates_reported_once() {
        let report = validate_codes([A, B, "1234567890123456", A], std::iter::empty());
        assert_eq!(report.imported, vec!["1234567890123456", B]);
        assert_eq!(report.duplicates, vec!["1234567890123456"]);
        assert!(report.system_duplicates.is_empty());
    }

    #[test]
    fn test_system_duplicates_compare_cleaned() {
        let report = validate_codes([A, B], ["1234 5678 9012 3456"]);
        assert_eq!(report.imported, vec![B]);
        assert_eq!(report.system_duplicates, vec!["1234567890123456"]);
    }

    #[test]
    fn test_invalid_entries_keep_raw_text() {
        let report = validate_codes(["  12-34 ", "", A], std::iter::empty());
        assert_eq!(report.invalid, vec!["12-34"]);
        assert_eq!(report.imported.len(), 1);
        assert_eq!(report.rejected(), 1);
    }
}
