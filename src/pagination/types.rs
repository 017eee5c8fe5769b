//! Page envelopes and pagination state
//!
//! Every paginated response carries
//! `{"data": [...], "pagination": {"total_count", "start", "page_size"}}`.
//! A body with an `error` key is a normal HTTP response that must not be
//! treated as data.

use crate::error::{Error, Result};
use crate::types::JsonValue;
use serde::{Deserialize, Serialize};

/// Server-reported pagination metadata of one page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageEnvelope {
    /// Rows matching the query across all pages
    pub total_count: u64,
    /// Offset of this page
    pub start: u64,
    /// Rows per page
    pub page_size: u64,
}

impl PageEnvelope {
    pub fn new(total_count: u64, start: u64, page_size: u64) -> Self {
        Self {
            total_count,
            start,
            page_size,
        }
    }

    /// `ceil(total_count / page_size)`
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return u64::from(self.total_count > 0);
        }
        self.total_count.div_ceil(self.page_size)
    }

    /// Offset of the page after this one
    pub fn next_cursor(&self) -> u64 {
        self.start.saturating_add(self.page_size)
    }

    /// Whether rows remain past this page
    pub fn has_more(&self) -> bool {
        self.total_count > self.next_cursor()
    }

    /// Offsets of every page after this one, in order
    pub fn remaining_cursors(&self) -> Vec<u64> {
        if self.page_size == 0 {
            return Vec::new();
        }
        let mut cursors = Vec::new();
        let mut cursor = self.next_cursor();
        while cursor < self.total_count {
            cursors.push(cursor);
            cursor = cursor.saturating_add(self.page_size);
        }
        cursors
    }
}

/// One parsed page
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub rows: Vec<JsonValue>,
    pub envelope: PageEnvelope,
}

impl Page {
    /// Parse a paginated response body
    ///
    /// Fails with [`Error::Api`] when the body carries an `error` key and with
    /// [`Error::MalformedResponse`] when `data` or `pagination` is unusable.
    pub fn from_body(body: JsonValue) -> Result<Self> {
        let JsonValue::Object(mut map) = body else {
            return Err(Error::malformed("response body is not a JSON object"));
        };

        check_error_key(&map)?;

        let rows = match map.remove("data") {
            Some(JsonValue::Array(rows)) => rows,
            Some(other) => {
                return Err(Error::malformed(format!(
                    "'data' is not an array: {}",
                    type_name(&other)
                )))
            }
            None => return Err(Error::malformed("response has no 'data' field")),
        };

        let pagination = map
            .get("pagination")
            .ok_or_else(|| Error::malformed("response has no 'pagination' field"))?;
        let field = |name: &str| {
            pagination
                .get(name)
                .and_then(JsonValue::as_u64)
                .ok_or_else(|| {
                    Error::malformed(format!(
                        "'pagination.{name}' is missing or not a non-negative integer"
                    ))
                })
        };
        let envelope = PageEnvelope::new(field("total_count")?, field("start")?, field("page_size")?);

        if envelope.page_size == 0 && (envelope.total_count > 0 || !rows.is_empty()) {
            return Err(Error::malformed("'pagination.page_size' is 0"));
        }

        Ok(Self { rows, envelope })
    }
}

/// Rows of a non-paginated response: a bare array or a `data` array
pub fn extract_rows(body: JsonValue) -> Result<Vec<JsonValue>> {
    match body {
        JsonValue::Array(rows) => Ok(rows),
        JsonValue::Object(mut map) => {
            check_error_key(&map)?;
            match map.remove("data") {
                Some(JsonValue::Array(rows)) => Ok(rows),
                Some(JsonValue::Null) | None => Ok(Vec::new()),
                Some(other) => Ok(vec![other]),
            }
        }
        JsonValue::Null => Ok(Vec::new()),
        other => Err(Error::malformed(format!(
            "expected an array or object, got {}",
            type_name(&other)
        ))),
    }
}

fn check_error_key(map: &serde_json::Map<String, JsonValue>) -> Result<()> {
    match map.get("error") {
        None | Some(JsonValue::Null) => Ok(()),
        Some(JsonValue::String(message)) => Err(Error::api(message.clone())),
        Some(other) => Err(Error::api(other.to_string())),
    }
}

fn type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Cursor bookkeeping for the sequential page loop
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    /// Offset of the next page to request
    pub cursor: u64,
    /// Zero-based index of the next page
    pub page_index: u64,
    /// Last page size the server reported
    pub page_size: u64,
    /// Server-reported total, once known
    pub total_count: Option<u64>,
    /// Is pagination complete?
    pub done: bool,
}

impl PaginationState {
    /// Create state starting at `cursor`
    pub fn new(cursor: u64) -> Self {
        Self {
            cursor,
            ..Default::default()
        }
    }

    /// Move past a page that was fetched successfully
    ///
    /// A page that does not move the cursor forward is malformed; pagination
    /// is marked done so the loop cannot spin.
    pub fn advance(&mut self, envelope: &PageEnvelope) -> Result<()> {
        self.page_index += 1;
        self.page_size = envelope.page_size;
        self.total_count = Some(envelope.total_count);

        let next = envelope.next_cursor();
        if next <= self.cursor {
            self.done = true;
            return Err(Error::malformed(format!(
                "pagination did not advance past cursor {}",
                self.cursor
            )));
        }

        self.cursor = next;
        self.done = !envelope.has_more();
        Ok(())
    }

    /// Move past a page that failed, by the last known page size
    pub fn skip(&mut self) {
        self.page_index += 1;
        if self.page_size == 0 {
            self.done = true;
            return;
        }

        self.cursor = self.cursor.saturating_add(self.page_size);
        self.done = self.total_count.map_or(true, |total| self.cursor >= total);
    }

    /// Mark pagination as complete
    pub fn mark_done(&mut self) {
        self.done = true;
    }
}
