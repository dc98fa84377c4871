//! Search result records.

use chrono::NaiveDateTime;
use serde_json::Value;

use crate::filter::extract_declared_date;

/// One item returned by the search endpoint.
///
/// The raw item is kept verbatim so the persisted metadata matches what the
/// API returned.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: String,
    declared_date: Option<NaiveDateTime>,
    raw: Value,
}

impl Record {
    /// Builds a record from a raw search item.
    ///
    /// The id is `data[0].nasa_id`, falling back to `data[0].title`, then
    /// to `item_<position>`.
    #[must_use]
    pub fn from_item(raw: Value, position: usize) -> Self {
        let id = first_data_entry(&raw)
            .and_then(|data| {
                non_empty_str(data, "nasa_id").or_else(|| non_empty_str(data, "title"))
            })
            .map_or_else(|| format!("item_{position}"), str::to_string);
        let declared_date = extract_declared_date(&raw);
        Self {
            id,
            declared_date,
            raw,
        }
    }

    /// Remote identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Creation timestamp declared by the API, if present and parseable.
    #[must_use]
    pub fn declared_date(&self) -> Option<NaiveDateTime> {
        self.declared_date
    }

    /// Title from the first data entry, for log output.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        first_data_entry(&self.raw).and_then(|data| non_empty_str(data, "title"))
    }

    /// The raw item as returned by the API.
    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

/// Returns `item.data[0]`, the entry carrying the descriptive fields.
pub(crate) fn first_data_entry(item: &Value) -> Option<&Value> {
    item.get("data")?.as_array()?.first()
}

fn non_empty_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
