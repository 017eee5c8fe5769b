//! Filter spec to request body

use super::filter::FilterSpec;
use crate::error::{Error, Result};
use crate::types::JsonValue;
use serde_json::json;

/// Key of the pagination object in every request body
pub const PAGINATION_KEY: &str = "pagination";

/// Encode `filter` into the wire body for one page request
///
/// `cursor` overrides the filter's own `pagination_start`; `Some(0)` means
/// cursor 0. Absent fields are omitted.
pub fn encode(filter: &FilterSpec, cursor: Option<u64>) -> Result<JsonValue> {
    let JsonValue::Object(mut body) = serde_json::to_value(filter)? else {
        return Err(Error::Other(
            "filter did not serialize to a JSON object".to_string(),
        ));
    };

    let start = cursor.unwrap_or(filter.pagination_start);
    body.insert(PAGINATION_KEY.to_string(), json!({ "start": start }));

    Ok(JsonValue::Object(body))
}
