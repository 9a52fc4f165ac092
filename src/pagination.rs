//! # Pagination Normalization
//!
//! The two CRM backends answer "give me a page after cursor X" with
//! incompatible semantics: the SOQL backend orders by record id and its
//! `Id > 'after'` filter is naturally exclusive, while the object-API
//! backend echoes the `after` record back as the first row of the page.
//! Callers over-fetch by a backend-specific buffer and hand the raw rows
//! to [`paginate`], which produces a uniform page + `PageInfo` contract.

use serde::Serialize;

use crate::cursor::encode_cursor;
use crate::error::ConnectError;

/// How the backend treats the `after` boundary record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterMode {
    /// The backend excludes the `after` record from results (SOQL `Id >`).
    Exclusive,
    /// The backend includes the `after` record as the first row; it must
    /// be dropped client-side.
    Inclusive,
}

/// One record plus the opaque cursor that continues after it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge<T> {
    pub node: T,
    pub cursor: String,
}

impl<T> Edge<T> {
    /// Build an edge, deriving the cursor from the node's native id.
    pub fn new(node: T, native_id: &str) -> Self {
        Self {
            cursor: encode_cursor(native_id),
            node,
        }
    }
}

/// Relay-style page metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_cursor: Option<String>,
}

/// A normalized page of records.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub edges: Vec<Edge<T>>,
    pub page_info: PageInfo,
}

/// Number of rows to request from the backend for a page of `first`.
///
/// Always one extra row to detect a following page, plus one more when an
/// inclusive backend will echo the `after` record back.
pub fn fetch_limit(first: i64, after_present: bool, mode: AfterMode) -> i64 {
    let mut buffer = 1;
    if mode == AfterMode::Inclusive && after_present {
        buffer += 1;
    }
    first + buffer
}

/// Shape an over-fetched row set into a page.
///
/// `edges` must be in backend order. `first <= 0` is rejected with
/// `InvalidArgument`. Zero fetched rows yield an empty page with
/// `has_next_page = false` and absent cursors.
pub fn paginate<T>(
    first: i64,
    after: Option<&str>,
    mode: AfterMode,
    mut edges: Vec<Edge<T>>,
) -> Result<Page<T>, ConnectError> {
    if first <= 0 {
        return Err(ConnectError::invalid_argument(
            "page size 'first' must be greater than zero",
        ));
    }

    // Drop the echoed `after` record before counting anything else.
    if mode == AfterMode::Inclusive
        && let Some(after_cursor) = after
        && edges.first().is_some_and(|edge| edge.cursor == after_cursor)
    {
        edges.remove(0);
    }

    let has_next_page = edges.len() as i64 > first;
    if has_next_page {
        edges.truncate(first as usize);
    }

    let start_cursor = edges.first().map(|edge| edge.cursor.clone());
    let end_cursor = edges.last().map(|edge| edge.cursor.clone());

    Ok(Page {
        edges,
        page_info: PageInfo {
            has_next_page,
            start_cursor,
            end_cursor,
        },
    })
}
