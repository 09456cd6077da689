//! Document Abstraction
//!
//! The engine never touches a concrete DOM. Everything it needs from the
//! host page goes through [`Dom`], implemented by the in-memory
//! [`crate::document::Document`] and by the web-sys binding in `bh-wasm`.
//!
//! Selector arguments are plain CSS strings. An invalid selector behaves as
//! "no match": implementations log it and return an empty result.

/// Host document operations used by the classifier, registry and affordance.
pub trait Dom {
    /// Handle to an element. Equality is node identity.
    type Node: Clone + PartialEq;

    /// First element under `scope` (or the whole document) matching `selector`.
    fn query_selector(&self, scope: Option<&Self::Node>, selector: &str) -> Option<Self::Node>;

    /// All elements under `scope` (or the whole document) matching `selector`,
    /// in document order.
    fn query_selector_all(&self, scope: Option<&Self::Node>, selector: &str) -> Vec<Self::Node>;

    fn matches(&self, node: &Self::Node, selector: &str) -> bool;

    /// Nearest inclusive ancestor matching `selector`.
    fn closest(&self, node: &Self::Node, selector: &str) -> Option<Self::Node>;

    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    fn previous_element_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    fn has_class(&self, node: &Self::Node, class: &str) -> bool;

    /// Concatenated text of the node and its descendants.
    fn text_content(&self, node: &Self::Node) -> String;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str);

    fn add_class(&mut self, node: &Self::Node, class: &str);

    fn remove_class(&mut self, node: &Self::Node, class: &str);

    /// New detached element; `None` when the host rejects the tag.
    fn create_element(&mut self, tag: &str) -> Option<Self::Node>;

    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node);

    /// Insert `child` before the first element child of `parent`, or append
    /// when `parent` has none.
    fn prepend_child(&mut self, parent: &Self::Node, child: &Self::Node);

    fn set_text_content(&mut self, node: &Self::Node, text: &str);

    /// Detach `node` from its parent.
    fn remove(&mut self, node: &Self::Node);

    fn body(&self) -> Option<Self::Node>;

    /// Whether a query against the whole document would match anything.
    fn exists(&self, selector: &str) -> bool {
        self.query_selector(None, selector).is_some()
    }

    /// Number of elements in the document matching `selector`.
    fn count(&self, selector: &str) -> usize {
        self.query_selector_all(None, selector).len()
    }
}

/// A host subscription (mutation observer, event listener) owned by a
/// session and cancelled when the session is torn down.
pub trait Subscription {
    fn cancel(&mut self);
}

/// Builds the exact-match attribute selector used to find stamped nodes.
pub fn attribute_selector(name: &str, value: &str) -> String {
    format!("[{}=\"{}\"]", name, value.replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_selector() {
        assert_eq!(attribute_selector("data-bot-hider-key", "7"), "[data-bot-hider-key=\"7\"]");
    }
}
