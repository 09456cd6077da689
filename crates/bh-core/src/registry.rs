//! Comment Registry
//!
//! Remembers which elements were judged bot comments. Entries are stable
//! keys stamped into an attribute on the element, never retained handles:
//! a registered element may leave the page at any time and its entry simply
//! stops resolving. Entries are never removed during a session.

use std::collections::HashSet;

use crate::classifier::{comment_role, Classifier};
use crate::dom::{attribute_selector, Dom};
use crate::rules::selectors;
use crate::types::{CommentRole, Verdict};

/// One registered bot comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub role: CommentRole,
    pub verdict: Verdict,
}

pub struct Registry {
    key_attribute: String,
    /// Distinguishes keys stamped by earlier sessions on the same page
    generation: u32,
    entries: Vec<Entry>,
    keys: HashSet<String>,
}

impl Registry {
    pub fn new(key_attribute: &str, generation: u32) -> Self {
        Self {
            key_attribute: key_attribute.to_string(),
            generation,
            entries: Vec::new(),
            keys: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in registration order.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn contains<D: Dom>(&self, dom: &D, node: &D::Node) -> bool {
        dom.attribute(node, &self.key_attribute)
            .map_or(false, |key| self.keys.contains(&key))
    }

    /// Register `node`. Returns `false` when it was already registered.
    pub fn insert<D: Dom>(&mut self, dom: &mut D, node: &D::Node, verdict: Verdict) -> bool {
        if self.contains(dom, node) {
            return false;
        }
        let key = format!("{}-{}", self.generation, self.entries.len());
        dom.set_attribute(node, &self.key_attribute, &key);
        self.keys.insert(key.clone());
        self.entries.push(Entry {
            key,
            role: comment_role(dom, node),
            verdict,
        });
        true
    }

    /// Registered elements still present in the document, in registration
    /// order.
    pub fn resolve<D: Dom>(&self, dom: &D) -> Vec<D::Node> {
        self.entries
            .iter()
            .filter_map(|entry| dom.query_selector(None, &attribute_selector(&self.key_attribute, &entry.key)))
            .collect()
    }

    /// Classify `node` unless already registered; register it on a bot
    /// verdict. Returns `true` if it was newly registered.
    pub fn consider<D: Dom>(&mut self, dom: &mut D, classifier: &Classifier<'_>, node: &D::Node) -> bool {
        if self.contains(dom, node) {
            return false;
        }
        let verdict = classifier.classify(dom, node);
        verdict.is_bot && self.insert(dom, node, verdict)
    }

    /// Classify every comment-like element currently in the document.
    /// Returns the newly registered elements.
    pub fn scan_existing<D: Dom>(&mut self, dom: &mut D, classifier: &Classifier<'_>) -> Vec<D::Node> {
        let candidates = dom.query_selector_all(None, selectors::SCAN);
        log::debug!("Scanning {} comment-like elements", candidates.len());
        candidates
            .into_iter()
            .filter(|node| self.consider(dom, classifier, node))
            .collect()
    }

    /// Classify a batch of inserted nodes: each node that is itself
    /// comment-like, and every comment-like descendant it brought along.
    /// Returns the newly registered elements.
    pub fn observe_additions<D: Dom>(
        &mut self,
        dom: &mut D,
        classifier: &Classifier<'_>,
        added: &[D::Node],
    ) -> Vec<D::Node> {
        let mut registered = Vec::new();
        for node in added {
            if dom.matches(node, selectors::WATCH) && self.consider(dom, classifier, node) {
                registered.push(node.clone());
            }
            for descendant in dom.query_selector_all(Some(node), selectors::WATCH) {
                if self.consider(dom, classifier, &descendant) {
                    registered.push(descendant);
                }
            }
        }
        registered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KEY_ATTRIBUTE;
    use crate::document::Document;
    use crate::markup::{sample_page, CommentBuilder};
    use crate::rules::RuleSet;

    fn classifier() -> Classifier<'static> {
        Classifier::new(RuleSet::builtin())
    }

    #[test]
    fn test_scan_registers_bots_only() {
        let mut doc = Document::from_specs(&sample_page());
        let mut registry = Registry::new(KEY_ATTRIBUTE, 0);
        let found = registry.scan_existing(&mut doc, &classifier());
        assert_eq!(found.len(), 2);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.resolve(&doc), found);
        assert_eq!(registry.entries()[0].key, "0-0");
        assert_eq!(registry.entries()[0].role, CommentRole::TOP_LEVEL);
    }

    #[test]
    fn test_scan_is_idempotent() {
        let mut doc = Document::from_specs(&sample_page());
        let mut registry = Registry::new(KEY_ATTRIBUTE, 0);
        registry.scan_existing(&mut doc, &classifier());
        assert!(registry.scan_existing(&mut doc, &classifier()).is_empty());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_observe_additions_finds_nested_comments() {
        let mut doc = Document::from_specs(&sample_page());
        let mut registry = Registry::new(KEY_ATTRIBUTE, 0);
        registry.scan_existing(&mut doc, &classifier());

        let timeline = doc.query_selector(None, selectors::DISCUSSION).unwrap();
        let thread = crate::document::ElementSpec::new("div")
            .class("js-review-thread")
            .child(CommentBuilder::review("renovate[bot]").build())
            .child(CommentBuilder::review("dave").build())
            .child(CommentBuilder::review("snyk-bot").build());
        doc.insert(&timeline, &thread);
        let added = doc.take_mutations();

        let found = registry.observe_additions(&mut doc, &classifier(), &added);
        assert_eq!(found.len(), 2);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_detached_entries_stay_registered() {
        let mut doc = Document::from_specs(&sample_page());
        let mut registry = Registry::new(KEY_ATTRIBUTE, 0);
        let found = registry.scan_existing(&mut doc, &classifier());
        doc.remove(&found[0]);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.resolve(&doc), vec![found[1]]);

        // re-attaching brings the entry back without re-registering
        let timeline = doc.query_selector(None, selectors::DISCUSSION).unwrap();
        doc.append_child(&timeline, &found[0]);
        assert_eq!(registry.resolve(&doc).len(), 2);
        let added = doc.take_mutations();
        assert!(registry.observe_additions(&mut doc, &classifier(), &added).is_empty());
    }

    #[test]
    fn test_keys_from_older_generation_are_not_trusted() {
        let mut doc = Document::from_specs(&sample_page());
        let mut old = Registry::new(KEY_ATTRIBUTE, 0);
        old.scan_existing(&mut doc, &classifier());

        let mut fresh = Registry::new(KEY_ATTRIBUTE, 1);
        let found = fresh.scan_existing(&mut doc, &classifier());
        assert_eq!(found.len(), 2);
        assert_eq!(fresh.entries()[1].key, "1-1");
        assert_eq!(fresh.resolve(&doc), found);
    }
}
