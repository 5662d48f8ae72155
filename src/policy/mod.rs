//! Record-level rules shared across the crate: field extraction from raw
//! records, staff validity, the staff-to-evaluation cascade link, and the
//! repair step that turns raw records into typed models.

use serde_json::Value;

use crate::models::{Evaluation, StaffMember, Theme};
use crate::store::Record;

/// Read an integer field. Tolerates floats with an integral value, which
/// imported data sometimes carries.
pub fn record_i64(record: &Record, key: &str) -> Option<i64> {
    match record.get(key)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        _ => None,
    }
}

/// The record's `id` field.
pub fn record_id(record: &Record) -> Option<i64> {
    record_i64(record, "id")
}

/// Read a string field. Absent or non-string yields `None`.
pub fn record_str<'a>(record: &'a Record, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

fn trimmed<'a>(record: &'a Record, key: &str) -> Option<&'a str> {
    record_str(record, key)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// A staff record is valid only with non-blank firstName, lastName and
/// email. Invalid records stay in the datastore but are hidden from the
/// typed views.
pub fn staff_record_is_valid(record: &Record) -> bool {
    trimmed(record, "firstName").is_some()
        && trimmed(record, "lastName").is_some()
        && trimmed(record, "email").is_some()
}

/// Whether an evaluation belongs to a staff record: linked by `staffId`,
/// or by the legacy firstName/lastName pair. Name matching requires the
/// staff record to carry both names; comparison is exact after trimming.
pub fn cascade_matches(staff: &Record, evaluation: &Record) -> bool {
    if let (Some(staff_id), Some(eval_staff_id)) =
        (record_id(staff), record_i64(evaluation, "staffId"))
    {
        if staff_id == eval_staff_id {
            return true;
        }
    }

    match (trimmed(staff, "firstName"), trimmed(staff, "lastName")) {
        (Some(first), Some(last)) => {
            trimmed(evaluation, "firstName") == Some(first)
                && trimmed(evaluation, "lastName") == Some(last)
        }
        _ => false,
    }
}

/// Decode raw staff records into typed models, dropping invalid and
/// undecodable ones from the view.
pub fn repair_staff(records: &[Record]) -> Vec<StaffMember> {
    let total = records.len();
    let staff: Vec<StaffMember> = records
        .iter()
        .filter(|record| staff_record_is_valid(record))
        .filter_map(|record| serde_json::from_value(Value::Object(record.clone())).ok())
        .collect();
    warn_dropped("staff", total, staff.len());
    staff
}

pub fn repair_themes(records: &[Record]) -> Vec<Theme> {
    let total = records.len();
    let themes: Vec<Theme> = records
        .iter()
        .filter_map(|record| serde_json::from_value(Value::Object(record.clone())).ok())
        .collect();
    warn_dropped("themes", total, themes.len());
    themes
}

pub fn repair_evaluations(records: &[Record]) -> Vec<Evaluation> {
    let total = records.len();
    let evaluations: Vec<Evaluation> = records
        .iter()
        .filter_map(|record| serde_json::from_value(Value::Object(record.clone())).ok())
        .collect();
    warn_dropped("evaluations", total, evaluations.len());
    evaluations
}

fn warn_dropped(what: &str, total: usize, kept: usize) {
    if kept < total {
        tracing::warn!(
            "Dropped {} malformed {} records from the typed view",
            total - kept,
            what
        );
    }
}
