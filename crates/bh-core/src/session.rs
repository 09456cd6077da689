//! Session
//!
//! One active hider for one pull-request view: classifier, registry,
//! visibility flag and toggle button bound to a document. Created by the
//! lifecycle when a PR view appears and torn down on in-app navigation.

use crate::affordance::Affordance;
use crate::classifier::Classifier;
use crate::config::Config;
use crate::dom::{Dom, Subscription};
use crate::registry::Registry;
use crate::rules::{selectors, RuleSet};
use crate::types::Stats;
use crate::visibility::{FlagStore, Visibility};

pub struct Session<D: Dom, S: FlagStore> {
    dom: D,
    store: S,
    classifier: Classifier<'static>,
    registry: Registry,
    visibility: Visibility,
    affordance: Option<Affordance<D::Node>>,
    subscriptions: Vec<Box<dyn Subscription>>,
}

impl<D: Dom, S: FlagStore> Session<D, S> {
    /// Mount the toggle, scan the page and apply the flag.
    pub fn start(mut dom: D, store: S, config: &Config, enabled: bool, generation: u32) -> Self {
        let affordance = Affordance::mount(&mut dom, enabled, 0);
        let mut session = Self {
            dom,
            store,
            classifier: Classifier::new(RuleSet::builtin()).with_debug(config.debug),
            registry: Registry::new(&config.key_attribute, generation),
            visibility: Visibility::new(enabled, &config.hidden_class),
            affordance,
            subscriptions: Vec::new(),
        };

        let found = session.registry.scan_existing(&mut session.dom, &session.classifier);
        for node in &found {
            session.visibility.mark(&mut session.dom, node);
        }
        session.render();
        log::info!(
            "Bot hider started: {} bot comment(s), hiding {}",
            session.registry.len(),
            if enabled { "on" } else { "off" }
        );
        session
    }

    pub fn dom(&self) -> &D {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut D {
        &mut self.dom
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn affordance(&self) -> Option<&Affordance<D::Node>> {
        self.affordance.as_ref()
    }

    pub fn enabled(&self) -> bool {
        self.visibility.enabled()
    }

    pub fn hidden_count(&self) -> usize {
        self.registry.len()
    }

    pub fn stats(&self) -> Stats {
        Stats {
            hidden_count: self.registry.len() as u32,
            total_count: self.dom.count(selectors::WATCH) as u32,
            enabled: self.enabled(),
        }
    }

    /// Keep a host subscription alive until teardown.
    pub fn hold(&mut self, subscription: Box<dyn Subscription>) {
        self.subscriptions.push(subscription);
    }

    /// Handle one batch of inserted nodes. New bot comments are marked
    /// straight away when hiding is on. Returns how many were found.
    pub fn handle_mutations(&mut self, added: &[D::Node]) -> usize {
        let found = self.registry.observe_additions(&mut self.dom, &self.classifier, added);
        if found.is_empty() {
            return 0;
        }
        for node in &found {
            self.visibility.mark(&mut self.dom, node);
        }
        log::debug!("Found {} new bot comment(s)", found.len());
        self.render();
        found.len()
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.visibility.set_enabled(&mut self.dom, &self.registry, &self.store, enabled);
        self.render();
    }

    /// Flip the flag; what a click on the toggle does. Returns the new value.
    pub fn toggle(&mut self) -> bool {
        let enabled = self.visibility.toggle(&mut self.dom, &self.registry, &self.store);
        self.render();
        enabled
    }

    fn render(&mut self) {
        if let Some(affordance) = &self.affordance {
            affordance.render(&mut self.dom, self.visibility.enabled(), self.registry.len());
        }
    }

    /// Cancel subscriptions and remove the toggle. Markers already applied
    /// stay on the page. Returns the document.
    pub fn teardown(mut self) -> D {
        for mut subscription in self.subscriptions.drain(..) {
            subscription.cancel();
        }
        if let Some(affordance) = self.affordance.take() {
            affordance.unmount(&mut self.dom);
        }
        log::debug!("Bot hider torn down");
        self.dom
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::config::HIDDEN_CLASS;
    use crate::document::Document;
    use crate::markup::{sample_page, CommentBuilder};
    use crate::visibility::MemoryStore;

    fn start(enabled: bool) -> Session<Document, MemoryStore> {
        let doc = Document::from_specs(&sample_page());
        Session::start(doc, MemoryStore::new(), &Config::default(), enabled, 0)
    }

    fn hidden(session: &Session<Document, MemoryStore>) -> usize {
        session.dom().count(&format!(".{HIDDEN_CLASS}"))
    }

    fn label(session: &Session<Document, MemoryStore>) -> String {
        let button = *session.affordance().unwrap().button();
        session.dom().text_content(&button)
    }

    struct Counter(Rc<Cell<u32>>);

    impl Subscription for Counter {
        fn cancel(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_start_hides_and_reports_stats() {
        let session = start(true);
        assert_eq!(session.stats(), Stats { hidden_count: 2, total_count: 5, enabled: true });
        assert_eq!(hidden(&session), 2);
        assert_eq!(label(&session), "Show Bot Comments (2)");
    }

    #[test]
    fn test_start_disabled_leaves_comments_visible() {
        let session = start(false);
        assert_eq!(session.hidden_count(), 2);
        assert_eq!(hidden(&session), 0);
        assert_eq!(label(&session), "Hide Bot Comments (2)");
    }

    #[test]
    fn test_new_bot_is_hidden_in_same_batch() {
        let mut session = start(true);
        session.dom_mut().take_mutations();
        let timeline = session.dom().query_selector(None, selectors::DISCUSSION).unwrap();
        session
            .dom_mut()
            .insert(&timeline, &CommentBuilder::new("vercel").body("Preview deployed.").build());
        let added = session.dom_mut().take_mutations();

        assert_eq!(session.handle_mutations(&added), 1);
        assert_eq!(hidden(&session), 3);
        assert_eq!(label(&session), "Show Bot Comments (3)");
    }

    #[test]
    fn test_toggle_round_trip() {
        let mut session = start(true);
        assert!(!session.toggle());
        assert_eq!(hidden(&session), 0);
        assert_eq!(session.store().load(), Some(false));
        assert!(session.toggle());
        assert_eq!(hidden(&session), 2);
        assert_eq!(session.store().load(), Some(true));
    }

    #[test]
    fn test_hidden_count_survives_detach() {
        let mut session = start(true);
        let first = session.registry().resolve(session.dom())[0];
        session.dom_mut().remove(&first);
        assert_eq!(session.stats().hidden_count, 2);
        assert_eq!(session.stats().total_count, 4);
    }

    #[test]
    fn test_teardown_cancels_and_unmounts() {
        let mut session = start(true);
        let cancelled = Rc::new(Cell::new(0));
        session.hold(Box::new(Counter(cancelled.clone())));
        session.hold(Box::new(Counter(cancelled.clone())));

        let doc = session.teardown();
        assert_eq!(cancelled.get(), 2);
        assert_eq!(doc.count(".bot-hider-toggle"), 0);
        assert_eq!(doc.count(&format!(".{HIDDEN_CLASS}")), 2);
    }
}
