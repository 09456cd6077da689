//! Visibility Controller
//!
//! Owns the enabled flag and the hide-marker. Every flag change re-asserts
//! the marker over the whole registry rather than diffing, so markers that
//! drifted (manual DOM edits, re-rendered nodes) are corrected each time.
//!
//! The flag is persisted through a [`FlagStore`]. Persisting is
//! fire-and-forget: the in-memory flag is authoritative for the session and a
//! failed write is only reported to the log.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::Value;

use crate::dom::Dom;
use crate::error::HiderError;
use crate::registry::Registry;

/// Cross-session persistence for the enabled flag.
///
/// `persist` must return immediately. Implementations start the write and
/// report a failure via [`report_persist_failure`]; callers never await it.
pub trait FlagStore {
    fn persist(&self, enabled: bool);
}

/// Log a failed flag write. The session keeps its in-memory value.
pub fn report_persist_failure(error: &HiderError) {
    log::warn!("Failed to persist enabled flag: {}", error);
}

/// Interpret the stored value: anything but an explicit `false` means
/// enabled, so a first run hides bots.
pub fn enabled_from_stored(value: Option<&Value>) -> bool {
    !matches!(value, Some(Value::Bool(false)))
}

/// Process-local [`FlagStore`], shared by clones.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    value: Rc<RefCell<Option<bool>>>,
    writes: Rc<Cell<u32>>,
    failing: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(enabled: bool) -> Self {
        let store = Self::default();
        store.value.replace(Some(enabled));
        store
    }

    /// A store whose writes are always rejected.
    pub fn failing() -> Self {
        Self { failing: true, ..Self::default() }
    }

    pub fn load(&self) -> Option<bool> {
        *self.value.borrow()
    }

    /// Number of write attempts, failed ones included.
    pub fn writes(&self) -> u32 {
        self.writes.get()
    }
}

impl FlagStore for MemoryStore {
    fn persist(&self, enabled: bool) {
        self.writes.set(self.writes.get() + 1);
        if self.failing {
            report_persist_failure(&HiderError::Storage("write rejected".to_string()));
            return;
        }
        self.value.replace(Some(enabled));
    }
}

pub struct Visibility {
    enabled: bool,
    hidden_class: String,
}

impl Visibility {
    pub fn new(enabled: bool, hidden_class: &str) -> Self {
        Self { enabled, hidden_class: hidden_class.to_string() }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Set and persist the flag, then re-assert markers on every entry.
    pub fn set_enabled<D: Dom, S: FlagStore>(&mut self, dom: &mut D, registry: &Registry, store: &S, enabled: bool) {
        self.enabled = enabled;
        store.persist(enabled);
        self.apply(dom, registry);
    }

    /// Flip the flag. Returns the new value.
    pub fn toggle<D: Dom, S: FlagStore>(&mut self, dom: &mut D, registry: &Registry, store: &S) -> bool {
        let enabled = !self.enabled;
        self.set_enabled(dom, registry, store, enabled);
        enabled
    }

    /// Bring every registered element in line with the current flag.
    pub fn apply<D: Dom>(&self, dom: &mut D, registry: &Registry) {
        for node in registry.resolve(dom) {
            self.mark(dom, &node);
        }
    }

    /// Bring one element in line with the current flag.
    pub fn mark<D: Dom>(&self, dom: &mut D, node: &D::Node) {
        if self.enabled {
            dom.add_class(node, &self.hidden_class);
        } else {
            dom.remove_class(node, &self.hidden_class);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Classifier;
    use crate::config::{HIDDEN_CLASS, KEY_ATTRIBUTE};
    use crate::document::Document;
    use crate::markup::sample_page;
    use crate::rules::RuleSet;

    fn scanned() -> (Document, Registry) {
        let mut doc = Document::from_specs(&sample_page());
        let mut registry = Registry::new(KEY_ATTRIBUTE, 0);
        registry.scan_existing(&mut doc, &Classifier::new(RuleSet::builtin()));
        (doc, registry)
    }

    fn hidden(doc: &Document) -> usize {
        doc.count(&format!(".{HIDDEN_CLASS}"))
    }

    #[test]
    fn test_enabled_from_stored() {
        assert!(enabled_from_stored(None));
        assert!(enabled_from_stored(Some(&Value::Bool(true))));
        assert!(enabled_from_stored(Some(&Value::Null)));
        assert!(!enabled_from_stored(Some(&Value::Bool(false))));
    }

    #[test]
    fn test_set_enabled_twice_is_idempotent() {
        let (mut doc, registry) = scanned();
        let store = MemoryStore::new();
        let mut visibility = Visibility::new(false, HIDDEN_CLASS);

        visibility.set_enabled(&mut doc, &registry, &store, true);
        let once: Vec<_> = registry.resolve(&doc).iter().map(|n| doc.classes(*n).to_vec()).collect();
        visibility.set_enabled(&mut doc, &registry, &store, true);
        let twice: Vec<_> = registry.resolve(&doc).iter().map(|n| doc.classes(*n).to_vec()).collect();

        assert_eq!(once, twice);
        assert_eq!(hidden(&doc), 2);
        assert_eq!(store.load(), Some(true));
    }

    #[test]
    fn test_toggle_twice_restores_state() {
        let (mut doc, registry) = scanned();
        let store = MemoryStore::new();
        let mut visibility = Visibility::new(true, HIDDEN_CLASS);
        visibility.apply(&mut doc, &registry);
        assert_eq!(hidden(&doc), 2);

        assert!(!visibility.toggle(&mut doc, &registry, &store));
        assert_eq!(hidden(&doc), 0);
        assert!(visibility.toggle(&mut doc, &registry, &store));
        assert_eq!(hidden(&doc), 2);
        assert!(visibility.enabled());
        assert_eq!(store.writes(), 2);
    }

    #[test]
    fn test_apply_heals_manual_edits() {
        let (mut doc, registry) = scanned();
        let visibility = Visibility::new(true, HIDDEN_CLASS);
        visibility.apply(&mut doc, &registry);
        let first = registry.resolve(&doc)[0];
        doc.remove_class(&first, HIDDEN_CLASS);

        visibility.apply(&mut doc, &registry);
        assert_eq!(hidden(&doc), 2);
    }

    #[test]
    fn test_failed_persist_keeps_in_memory_flag() {
        let (mut doc, registry) = scanned();
        let store = MemoryStore::failing();
        let mut visibility = Visibility::new(true, HIDDEN_CLASS);

        visibility.set_enabled(&mut doc, &registry, &store, false);
        assert!(!visibility.enabled());
        assert_eq!(store.load(), None);
        assert_eq!(store.writes(), 1);
    }
}
