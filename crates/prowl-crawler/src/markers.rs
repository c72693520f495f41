//! One routine for every marker table: product containers, CAPTCHA
//! interstitials and CAPTCHA resolution.

use prowl_browser::{BrowserError, PageDriver, SelectorState};
use prowl_rules::MarkerTable;
use std::time::Duration;

/// Whether any marker of `table` is on the page right now.
///
/// Selector markers are queried first; text markers are matched against the
/// serialized page only if no selector hit. Non-fatal driver errors count as
/// "absent".
pub async fn any_present(page: &dyn PageDriver, table: &MarkerTable) -> Result<bool, BrowserError> {
    for selector in table.selectors() {
        match page.query_selector(selector).await {
            Ok(true) => {
                tracing::trace!(table = table.name(), selector, "marker present");
                return Ok(true);
            }
            Ok(false) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => tracing::debug!(table = table.name(), selector, "marker query failed: {}", e),
        }
    }

    if table.phrases().next().is_none() {
        return Ok(false);
    }
    match page.content().await {
        Ok(html) => Ok(table.phrase_in(&html)),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            tracing::debug!(table = table.name(), "content unavailable for marker check: {}", e);
            Ok(false)
        }
    }
}

/// Probe selector markers in order, waiting up to `per_probe` for each to
/// become visible. Returns the first one that did.
pub async fn first_visible(
    page: &dyn PageDriver,
    table: &MarkerTable,
    per_probe: Duration,
) -> Result<Option<String>, BrowserError> {
    for selector in table.selectors() {
        match page
            .wait_for_selector(selector, SelectorState::Visible, per_probe)
            .await
        {
            Ok(true) => return Ok(Some(selector.to_string())),
            Ok(false) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => tracing::debug!(table = table.name(), selector, "probe failed: {}", e),
        }
    }
    Ok(None)
}
