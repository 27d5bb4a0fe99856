//! Multi-page accumulation over page/size listing endpoints.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{RequestOptions, Transport};
use crate::error::TransportError;

pub const DEFAULT_MAX_ITEMS: usize = 100;
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// A flat list of items plus the platform's reported total.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Page {
    /// Items in the order the platform returned them.
    pub items: Vec<Value>,
    /// `totalElements` or `totalItems` from the envelope. When the platform
    /// reports no total, the number of items collected.
    pub total: u64,
}

fn item_count(items: &[Value]) -> u64 {
    u64::try_from(items.len()).unwrap_or(u64::MAX)
}

fn reported_total(raw: &Value) -> Option<u64> {
    [raw.get("data"), Some(raw)]
        .into_iter()
        .flatten()
        .find_map(|envelope| {
            envelope
                .get("totalElements")
                .or_else(|| envelope.get("totalItems"))
                .and_then(Value::as_u64)
        })
}

/// Normalizes one listing response into a [`Page`].
///
/// Recognized envelopes, first match wins:
///
/// - `{data: {content: [...], totalElements | totalItems}}`
/// - `{content: [...], totalElements | totalItems}`
/// - `{data: [...]}` or a bare array
///
/// A missing total falls back to the number of items.
#[must_use]
pub fn normalize_page(raw: &Value) -> Page {
    let data = raw.get("data");
    let items = data
        .and_then(|d| d.get("content"))
        .or_else(|| raw.get("content"))
        .or(data.filter(|d| d.is_array()))
        .or(Some(raw).filter(|r| r.is_array()))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let total = reported_total(raw).unwrap_or_else(|| item_count(&items));

    Page { items, total }
}

/// Fetches pages of `request` until `max_items` items are collected, a page
/// comes back empty, or a page is shorter than requested.
///
/// Pages are requested with `page` (0-based) and `size` query parameters;
/// `size` never exceeds the remaining budget. The result's total is the
/// last total the platform reported, or the number of items collected when
/// no page reported one.
///
/// # Errors
///
/// Returns the first [`TransportError`] raised by any page request.
pub async fn paginate<T>(
    client: &T,
    request: &RequestOptions,
    max_items: usize,
    page_size: usize,
) -> Result<Page, TransportError>
where
    T: Transport + ?Sized,
{
    let page_size = page_size.max(1);
    let mut items = Vec::new();
    let mut reported = None;
    let mut page_number = 0usize;

    while items.len() < max_items {
        let remaining = max_items - items.len();
        let size = page_size.min(remaining);
        let options = request
            .clone()
            .with_param("page", page_number.to_string())
            .with_param("size", size.to_string());

        let raw = client.request(options).await?;
        let page = normalize_page(&raw);
        let received = page.items.len();
        debug!(page = page_number, received, total = page.total, "fetched page");

        reported = reported_total(&raw).or(reported);
        items.extend(page.items.into_iter().take(remaining));

        if received == 0 || received < size {
            break;
        }
        page_number += 1;
    }

    let total = reported.unwrap_or_else(|| item_count(&items));
    Ok(Page { items, total })
}
