//! Popup model
//!
//! Everything the popup does that does not touch the browser: which tabs it
//! applies to, what the status line says, how counters are read out of a
//! bridge response and what each control sends.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::bridge::Request;
use crate::config::STORAGE_KEY;
use crate::dom::Dom;
use crate::visibility::enabled_from_stored;

pub const REPORT_ISSUE_URL: &str = "https://github.com/issues/new?title=Bot%20Comment%20Hider%20Issue&body=Please%20describe%20the%20issue%20you%20encountered.";

/// Selectors used when the page script does not answer.
pub const FALLBACK_TOTAL_SELECTOR: &str = ".timeline-comment, .timeline-comment-group";
pub const FALLBACK_HIDDEN_SELECTOR: &str = ".bot-comment-hidden";

const UNKNOWN_COUNT: &str = "?";

pub fn is_pull_request_url(url: &str) -> bool {
    url.contains("github.com") && url.contains("/pull/")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub class_name: &'static str,
    pub text: &'static str,
}

impl StatusView {
    pub fn for_enabled(enabled: bool) -> Self {
        if enabled {
            Self { class_name: "status enabled", text: "Bot comments are hidden" }
        } else {
            Self { class_name: "status disabled", text: "Bot comments are visible" }
        }
    }
}

/// Counter texts as shown in the popup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StatsView {
    pub hidden: String,
    pub total: String,
}

/// Result of counting straight from the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DirectCount {
    pub total: u32,
    pub hidden: u32,
}

impl StatsView {
    pub fn counts(hidden: u64, total: u64) -> Self {
        Self { hidden: hidden.to_string(), total: total.to_string() }
    }

    /// Shown when the page could not be asked at all.
    pub fn unavailable() -> Self {
        Self { hidden: UNKNOWN_COUNT.to_string(), total: UNKNOWN_COUNT.to_string() }
    }

    /// Read a `getStats` response. `None` when it carries no stats and the
    /// caller should fall back to [`count_directly`].
    pub fn from_response(response: Option<&Value>) -> Option<Self> {
        let stats = response?.get("stats")?.as_object()?;
        let count = |key: &str| stats.get(key).and_then(Value::as_u64).unwrap_or(0);
        Some(Self::counts(count("hiddenCount"), count("totalCount")))
    }
}

impl From<DirectCount> for StatsView {
    fn from(count: DirectCount) -> Self {
        Self::counts(count.hidden.into(), count.total.into())
    }
}

/// Count comment containers and hidden markers without the page script.
pub fn count_directly<D: Dom>(dom: &D) -> DirectCount {
    DirectCount {
        total: dom.count(FALLBACK_TOTAL_SELECTOR) as u32,
        hidden: dom.count(FALLBACK_HIDDEN_SELECTOR) as u32,
    }
}

/// Popup controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Toggle(bool),
    Refresh,
    ShowAll,
    HideAll,
    ReportIssue,
}

impl Control {
    /// Bridge request the control sends to the page, if any.
    pub fn request(self) -> Option<Request> {
        match self {
            Self::Toggle(enabled) => Some(Request::Toggle { enabled }),
            Self::ShowAll => Some(Request::ShowAll),
            Self::HideAll => Some(Request::HideAll),
            Self::Refresh | Self::ReportIssue => None,
        }
    }

    /// Whether the flag must be written to storage before sending.
    pub fn persists(self) -> Option<bool> {
        match self {
            Self::Toggle(enabled) => Some(enabled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupState {
    enabled: bool,
}

impl PopupState {
    /// Build from the raw stored flag; absent means enabled.
    pub fn from_stored(value: Option<&Value>) -> Self {
        Self { enabled: enabled_from_stored(value) }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn status(&self) -> StatusView {
        StatusView::for_enabled(self.enabled)
    }

    /// Apply a control, returning the request to send.
    pub fn apply(&mut self, control: Control) -> Option<Request> {
        if let Some(enabled) = control.persists() {
            self.enabled = enabled;
        }
        control.request()
    }

    /// React to a storage change notification. Only `sync` changes to the
    /// flag count; returns the new toggle state when it moved.
    pub fn on_storage_change(&mut self, changes: &Value, area: &str) -> Option<bool> {
        if area != "sync" {
            return None;
        }
        let change = changes.get(STORAGE_KEY)?;
        let enabled = enabled_from_stored(change.get("newValue"));
        if enabled == self.enabled {
            return None;
        }
        self.enabled = enabled;
        Some(enabled)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::Config;
    use crate::document::Document;
    use crate::markup::sample_page;
    use crate::session::Session;
    use crate::visibility::MemoryStore;

    #[test]
    fn test_pull_request_urls() {
        assert!(is_pull_request_url("https://github.com/acme/widgets/pull/7"));
        assert!(!is_pull_request_url("https://github.com/acme/widgets/issues/7"));
        assert!(!is_pull_request_url("https://gitlab.com/acme/widgets/pull/7"));
        assert!(!is_pull_request_url(""));
    }

    #[test]
    fn test_status_view() {
        assert_eq!(StatusView::for_enabled(true).class_name, "status enabled");
        assert_eq!(StatusView::for_enabled(true).text, "Bot comments are hidden");
        assert_eq!(StatusView::for_enabled(false).class_name, "status disabled");
        assert_eq!(StatusView::for_enabled(false).text, "Bot comments are visible");
    }

    #[test]
    fn test_stats_from_response() {
        let response = json!({"stats": {"hiddenCount": 3, "totalCount": 9, "enabled": true}});
        assert_eq!(StatsView::from_response(Some(&response)), Some(StatsView::counts(3, 9)));

        let partial = json!({"stats": {"totalCount": 4}});
        assert_eq!(StatsView::from_response(Some(&partial)), Some(StatsView::counts(0, 4)));

        assert_eq!(StatsView::from_response(Some(&json!({"error": "Extension not initialized"}))), None);
        assert_eq!(StatsView::from_response(None), None);
        assert_eq!(StatsView::unavailable().hidden, "?");
    }

    #[test]
    fn test_count_directly() {
        let session = Session::start(Document::from_specs(&sample_page()), MemoryStore::new(), &Config::default(), true, 0);
        let count = count_directly(session.dom());
        assert_eq!(count, DirectCount { total: 5, hidden: 2 });
        assert_eq!(StatsView::from(count), StatsView::counts(2, 5));
    }

    #[test]
    fn test_direct_count_from_injected_result() {
        // shape returned by the counter injected into the tab
        let result = json!({"total": 4, "hidden": 1});
        let count: DirectCount = serde_json::from_value(result).unwrap();
        assert_eq!(StatsView::from(count), StatsView::counts(1, 4));
        assert!(serde_json::from_value::<DirectCount>(json!(null)).is_err());
    }

    #[test]
    fn test_controls() {
        let mut state = PopupState::from_stored(None);
        assert!(state.enabled());

        assert_eq!(state.apply(Control::Toggle(false)), Some(Request::Toggle { enabled: false }));
        assert!(!state.enabled());
        assert_eq!(state.status(), StatusView::for_enabled(false));

        assert_eq!(state.apply(Control::HideAll), Some(Request::HideAll));
        assert!(!state.enabled());
        assert_eq!(state.apply(Control::Refresh), None);
        assert_eq!(state.apply(Control::ReportIssue), None);
    }

    #[test]
    fn test_storage_change() {
        let mut state = PopupState::from_stored(Some(&json!(true)));
        let changes = json!({ "botHiderEnabled": {"oldValue": true, "newValue": false} });

        assert_eq!(state.on_storage_change(&changes, "local"), None);
        assert_eq!(state.on_storage_change(&json!({"other": {}}), "sync"), None);
        assert_eq!(state.on_storage_change(&changes, "sync"), Some(false));
        assert_eq!(state.on_storage_change(&changes, "sync"), None);
        assert!(!state.enabled());
    }
}
