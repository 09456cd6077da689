//! Lifecycle and navigation
//!
//! The host site navigates in-app without full reloads. [`Lifecycle`] owns
//! the at-most-one active [`Session`]: it activates only on pull-request
//! paths, tears the session down when the URL changes, and tells the caller
//! how long to wait before trying again.
//!
//! Activation is two-phase because the stored flag arrives asynchronously:
//! [`Lifecycle::begin_activation`] hands out a ticket and
//! [`Lifecycle::complete_activation`] ignores tickets made stale by a
//! navigation in between.

use std::time::Duration;

use serde_json::Value;

use crate::bridge::{self, Response};
use crate::config::Config;
use crate::dom::Dom;
use crate::session::Session;
use crate::visibility::FlagStore;

const PULL_REQUEST_SEGMENT: &str = "/pull/";
const READY_STATE_LOADING: &str = "loading";

/// Event to wait for while the document is still being parsed.
pub const DOM_READY_EVENT: &str = "DOMContentLoaded";

/// Does this location path belong to a pull request view?
pub fn is_pull_request_path(path: &str) -> bool {
    path.contains(PULL_REQUEST_SEGMENT)
}

/// Should activation wait for [`DOM_READY_EVENT`]? Only while the document
/// is still loading; `body` may not exist yet.
pub fn waits_for_dom(ready_state: &str) -> bool {
    ready_state == READY_STATE_LOADING
}

/// Tracks the last seen URL.
#[derive(Debug, Clone)]
pub struct NavigationWatcher {
    current: String,
}

impl NavigationWatcher {
    pub fn new(href: &str) -> Self {
        Self { current: href.to_string() }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// Record `href`; `true` when it differs from the last one.
    pub fn observe(&mut self, href: &str) -> bool {
        if self.current == href {
            return false;
        }
        self.current = href.to_string();
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationAction {
    Unchanged,
    /// The old session is gone; try activating again after the delay.
    Reactivate { after: Duration },
}

/// Ticket for a pending activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation(u32);

pub struct Lifecycle<D: Dom, S: FlagStore> {
    config: Config,
    watcher: NavigationWatcher,
    session: Option<Session<D, S>>,
    generation: u32,
}

impl<D: Dom, S: FlagStore> Lifecycle<D, S> {
    pub fn new(config: Config, href: &str) -> Self {
        Self {
            config,
            watcher: NavigationWatcher::new(href),
            session: None,
            generation: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> Option<&Session<D, S>> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session<D, S>> {
        self.session.as_mut()
    }

    /// Start activating for `path`. `None` when the path is not a pull
    /// request; the caller should then do nothing.
    pub fn begin_activation(&mut self, path: &str) -> Option<Activation> {
        if !is_pull_request_path(path) {
            log::debug!("Not a pull request path: {}", path);
            return None;
        }
        self.generation += 1;
        Some(Activation(self.generation))
    }

    /// Finish an activation once the stored flag is known. Returns `false`
    /// (and drops `dom`/`store`) when the ticket is stale.
    pub fn complete_activation(&mut self, ticket: Activation, dom: D, store: S, enabled: bool) -> bool {
        if ticket.0 != self.generation {
            log::debug!("Dropping stale activation {}", ticket.0);
            return false;
        }
        self.teardown();
        self.session = Some(Session::start(dom, store, &self.config, enabled, ticket.0));
        true
    }

    /// Activate in one step when the flag is already known.
    pub fn activate(&mut self, path: &str, dom: D, store: S, enabled: bool) -> bool {
        match self.begin_activation(path) {
            Some(ticket) => self.complete_activation(ticket, dom, store, enabled),
            None => false,
        }
    }

    /// React to the current URL. On change the session is torn down at once
    /// and any pending activation is invalidated.
    pub fn on_location_change(&mut self, href: &str) -> NavigationAction {
        if !self.watcher.observe(href) {
            return NavigationAction::Unchanged;
        }
        log::info!("Navigated to {}", href);
        self.config.follow_location(href);
        self.generation += 1;
        self.teardown();
        NavigationAction::Reactivate { after: self.config.settle_delay() }
    }

    /// Drop the active session, if any, returning its document.
    pub fn teardown(&mut self) -> Option<D> {
        self.session.take().map(Session::teardown)
    }

    /// Answer a bridge message against the active session.
    pub fn handle_message(&mut self, raw: &Value) -> Response {
        bridge::dispatch(self.session.as_mut(), raw)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::bridge::ERR_NOT_INITIALIZED;
    use crate::document::Document;
    use crate::markup::sample_page;
    use crate::visibility::MemoryStore;

    const PR: &str = "https://github.com/acme/widgets/pull/12";

    fn lifecycle() -> Lifecycle<Document, MemoryStore> {
        Lifecycle::new(Config::default(), PR)
    }

    fn page() -> Document {
        Document::from_specs(&sample_page())
    }

    #[test]
    fn test_pull_request_paths() {
        assert!(is_pull_request_path("/acme/widgets/pull/12"));
        assert!(is_pull_request_path("/acme/widgets/pull/12/files"));
        assert!(!is_pull_request_path("/acme/widgets/pulls"));
        assert!(!is_pull_request_path("/acme/widgets/issues/3"));
    }

    #[test]
    fn test_waits_for_dom_only_while_loading() {
        assert!(waits_for_dom("loading"));
        assert!(!waits_for_dom("interactive"));
        assert!(!waits_for_dom("complete"));
    }

    #[test]
    fn test_navigation_rereads_debug_switch() {
        let mut lc = lifecycle();
        assert!(!lc.config().debug);
        lc.on_location_change("https://github.com/acme/widgets/pull/12?debug=bot-hider");
        assert!(lc.config().debug);
        lc.activate("/acme/widgets/pull/12", page(), MemoryStore::new(), true);
        assert_eq!(lc.session().unwrap().hidden_count(), 2);
        lc.on_location_change("https://github.com/acme/widgets/pull/13");
        assert!(!lc.config().debug);
    }

    #[test]
    fn test_activate_only_on_pull_requests() {
        let mut lc = lifecycle();
        assert!(!lc.activate("/acme/widgets/issues/3", page(), MemoryStore::new(), true));
        assert!(lc.session().is_none());
        assert!(lc.activate("/acme/widgets/pull/12", page(), MemoryStore::new(), true));
        assert_eq!(lc.session().unwrap().hidden_count(), 2);
    }

    #[test]
    fn test_messages_before_activation_are_rejected() {
        let mut lc = lifecycle();
        assert_eq!(lc.handle_message(&json!({"action": "getStats"})), Response::error(ERR_NOT_INITIALIZED));
        lc.activate("/acme/widgets/pull/12", page(), MemoryStore::new(), false);
        assert_eq!(
            lc.handle_message(&json!({"action": "getStats"})).to_value(),
            json!({"stats": {"hiddenCount": 2, "totalCount": 5, "enabled": false}})
        );
    }

    #[test]
    fn test_navigation_tears_down_and_schedules_reactivation() {
        let mut lc = lifecycle();
        lc.activate("/acme/widgets/pull/12", page(), MemoryStore::new(), true);

        assert_eq!(lc.on_location_change(PR), NavigationAction::Unchanged);
        assert!(lc.session().is_some());

        let action = lc.on_location_change("https://github.com/acme/widgets/pull/13");
        assert_eq!(action, NavigationAction::Reactivate { after: Duration::from_millis(1000) });
        assert!(lc.session().is_none());

        assert!(lc.activate("/acme/widgets/pull/13", page(), MemoryStore::new(), true));
        assert!(lc.session().is_some());
    }

    #[test]
    fn test_navigation_invalidates_pending_activation() {
        let mut lc = lifecycle();
        let ticket = lc.begin_activation("/acme/widgets/pull/12").unwrap();
        lc.on_location_change("https://github.com/acme/widgets");
        assert!(!lc.complete_activation(ticket, page(), MemoryStore::new(), true));
        assert!(lc.session().is_none());
    }

    #[test]
    fn test_reactivation_uses_fresh_registry_keys() {
        let mut lc = lifecycle();
        lc.activate("/acme/widgets/pull/12", page(), MemoryStore::new(), true);
        lc.on_location_change("https://github.com/acme/widgets/pull/12?tab=checks");
        // same document survives the in-app navigation
        let doc = page();
        lc.activate("/acme/widgets/pull/12", doc, MemoryStore::new(), true);
        let session = lc.session().unwrap();
        assert!(session.registry().entries().iter().all(|e| e.key.starts_with("3-")));
    }
}
