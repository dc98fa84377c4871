//! Narrowing search candidates to the exact requested window.
//!
//! The search endpoint only filters by year, so every candidate is checked
//! against its declared creation timestamp here. Timestamps are compared
//! naively: a trailing `Z` is stripped and numeric offsets are dropped.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::record::{Record, first_data_entry};
use crate::window::{SyncWindow, start_of_day};

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Extracts the creation timestamp of a raw search item.
///
/// Reads `data[0].date_created`, falling back to `data[0].date`.
#[must_use]
pub fn extract_declared_date(item: &Value) -> Option<NaiveDateTime> {
    let data = first_data_entry(item)?;
    let raw = ["date_created", "date"]
        .iter()
        .find_map(|key| data.get(*key).and_then(Value::as_str).filter(|s| !s.is_empty()))?;
    parse_timestamp(raw)
}

/// Parses an ISO-8601 timestamp into a naive date-time.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix('Z').unwrap_or(trimmed);

    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(start_of_day(date));
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|parsed| parsed.naive_local())
}

/// Keeps records whose declared date falls inside `window`.
///
/// Records without a usable date are dropped silently.
pub fn filter_records<'w, I>(records: I, window: &'w SyncWindow) -> impl Iterator<Item = Record> + 'w
where
    I: IntoIterator<Item = Record>,
    I::IntoIter: 'w,
{
    records.into_iter().filter(move |record| {
        record
            .declared_date()
            .is_some_and(|declared| window.contains(declared))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::window::end_of_day;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn item(id: &str, date_created: Option<&str>) -> Value {
        match date_created {
            Some(value) => json!({"data": [{"nasa_id": id, "date_created": value}]}),
            None => json!({"data": [{"nasa_id": id}]}),
        }
    }

    #[test]
    fn test_parse_timestamp_with_z_suffix() {
        assert_eq!(
            parse_timestamp("2024-03-10T14:05:00Z"),
            date(2024, 3, 10).and_hms_opt(14, 5, 0)
        );
    }

    #[test]
    fn test_parse_timestamp_fractional_and_space_forms() {
        assert_eq!(
            parse_timestamp("2024-03-10T14:05:00.250"),
            date(2024, 3, 10).and_hms_milli_opt(14, 5, 0, 250)
        );
        assert_eq!(
            parse_timestamp("2024-03-10 14:05:00"),
            date(2024, 3, 10).and_hms_opt(14, 5, 0)
        );
        assert_eq!(
            parse_timestamp("2024-03-10T14:05"),
            date(2024, 3, 10).and_hms_opt(14, 5, 0)
        );
    }

    #[test]
    fn test_parse_timestamp_date_only_is_midnight() {
        assert_eq!(parse_timestamp("2024-03-10"), Some(start_of_day(date(2024, 3, 10))));
    }

    #[test]
    fn test_parse_timestamp_offset_keeps_wall_clock() {
        assert_eq!(
            parse_timestamp("2024-03-10T23:30:00+05:00"),
            date(2024, 3, 10).and_hms_opt(23, 30, 0)
        );
    }

    #[test]
    fn test_parse_timestamp_rejects_non_iso() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("March 10, 2024"), None);
        assert_eq!(parse_timestamp("10/03/2024"), None);
        assert_eq!(parse_timestamp("2024-02-30T00:00:00Z"), None);
    }

    #[test]
    fn test_extract_declared_date_falls_back_to_date_field() {
        let value = json!({"data": [{"nasa_id": "a", "date": "2020-01-02T00:00:00Z"}]});
        assert_eq!(
            extract_declared_date(&value),
            Some(start_of_day(date(2020, 1, 2)))
        );

        let value = json!({"data": [{"date_created": "", "date": "2020-01-02"}]});
        assert_eq!(
            extract_declared_date(&value),
            Some(start_of_day(date(2020, 1, 2)))
        );
    }

    #[test]
    fn test_extract_declared_date_missing_or_wrong_type() {
        assert_eq!(extract_declared_date(&json!({})), None);
        assert_eq!(extract_declared_date(&json!({"data": []})), None);
        assert_eq!(
            extract_declared_date(&json!({"data": [{"date_created": 20240310}]})),
            None
        );
    }

    #[test]
    fn test_filter_includes_both_bounds_and_excludes_outside() {
        let window =
            SyncWindow::new(start_of_day(date(2024, 3, 1)), end_of_day(date(2024, 3, 10))).unwrap();
        let records = vec![
            Record::from_item(item("on-start", Some("2024-03-01T00:00:00Z")), 1),
            Record::from_item(item("on-end", Some("2024-03-10T00:00:00Z")), 2),
            Record::from_item(item("day-before", Some("2024-02-29T00:00:00Z")), 3),
            Record::from_item(item("day-after", Some("2024-03-11T00:00:00Z")), 4),
            Record::from_item(item("no-date", None), 5),
            Record::from_item(item("bad-date", Some("sometime in March")), 6),
        ];

        let kept: Vec<String> = filter_records(records, &window)
            .map(|record| record.id().to_string())
            .collect();

        assert_eq!(kept, vec!["on-start".to_string(), "on-end".to_string()]);
    }

    #[test]
    fn test_filter_preserves_order() {
        let window =
            SyncWindow::new(start_of_day(date(2024, 1, 1)), end_of_day(date(2024, 12, 31))).unwrap();
        let records = (1..=5).map(|i| {
            let id = format!("r{i}");
            let created = format!("2024-0{i}-15");
            Record::from_item(item(&id, Some(&created)), i)
        });
        let ids: Vec<String> = filter_records(records, &window)
            .map(|record| record.id().to_string())
            .collect();
        assert_eq!(ids, vec!["r1", "r2", "r3", "r4", "r5"]);
    }
}
