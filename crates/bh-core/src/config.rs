//! Runtime configuration
//!
//! Every field has a default matching the shipped extension, so an empty JSON
//! object is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::HiderError;

/// Storage key holding the enabled flag in synced storage.
pub const STORAGE_KEY: &str = "botHiderEnabled";
/// Class toggled on bot comments; the extension stylesheet hides it.
pub const HIDDEN_CLASS: &str = "bot-comment-hidden";
/// Attribute stamped on registered comments so they can be found again.
pub const KEY_ATTRIBUTE: &str = "data-bot-hider-key";
/// Query-string switch for classifier tracing.
pub const DEBUG_QUERY: &str = "debug=bot-hider";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub storage_key: String,
    pub hidden_class: String,
    pub key_attribute: String,
    /// Wait after an in-app navigation before re-activating
    pub settle_delay_ms: u64,
    /// Log every examined element at debug level
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_key: STORAGE_KEY.to_string(),
            hidden_class: HIDDEN_CLASS.to_string(),
            key_attribute: KEY_ATTRIBUTE.to_string(),
            settle_delay_ms: 1000,
            debug: false,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, HiderError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Default configuration, with tracing switched on by the page query.
    pub fn from_query(search: &str) -> Self {
        Self {
            debug: search.contains(DEBUG_QUERY),
            ..Self::default()
        }
    }

    /// Re-read the tracing switch from a full URL after an in-app navigation.
    pub fn follow_location(&mut self, href: &str) {
        let without_fragment = href.split('#').next().unwrap_or_default();
        let query = without_fragment.split_once('?').map_or("", |(_, query)| query);
        self.debug = query.contains(DEBUG_QUERY);
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(Config::from_json("{}").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_json(r#"{"settleDelayMs": 250, "debug": true}"#).unwrap();
        assert_eq!(config.settle_delay(), Duration::from_millis(250));
        assert!(config.debug);
        assert_eq!(config.hidden_class, HIDDEN_CLASS);
    }

    #[test]
    fn test_from_query() {
        assert!(Config::from_query("?tab=files&debug=bot-hider").debug);
        assert!(!Config::from_query("?tab=files").debug);
    }

    #[test]
    fn test_follow_location() {
        let mut config = Config::default();
        config.follow_location("https://github.com/acme/widgets/pull/4?debug=bot-hider");
        assert!(config.debug);
        config.follow_location("https://github.com/acme/widgets/pull/4#debug=bot-hider");
        assert!(!config.debug);
        config.follow_location("https://github.com/acme/widgets/pull/4/files?w=1&debug=bot-hider#diff");
        assert!(config.debug);
        assert_eq!(config.storage_key, STORAGE_KEY);
    }
}
