//! In-memory Document
//!
//! Arena-backed element tree implementing [`Dom`]. Used by the tests, the
//! benches and the CLI fixture replay. Insertions into the connected tree are
//! recorded and handed out in batches by [`Document::take_mutations`], the
//! way a mutation observer delivers `addedNodes`.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::dom::Dom;
use crate::error::HiderError;
use crate::selector::{SelectorList, SelectorTarget};

/// Index of an element in the document arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    tag: String,
    classes: Vec<String>,
    attrs: Vec<(String, String)>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl NodeData {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            classes: Vec::new(),
            attrs: Vec::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
        }
    }
}

// =============================================================================
// Fixture format
// =============================================================================

/// Serializable description of an element subtree.
///
/// ```json
/// { "tag": "div", "class": "timeline-comment", "attrs": {"id": "x"},
///   "text": "", "children": [] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSpec {
    #[serde(default = "default_tag")]
    pub tag: String,
    /// Space-separated class list
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub class: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    /// Text placed before the children
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementSpec>,
}

fn default_tag() -> String {
    "div".to_string()
}

impl ElementSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            class: String::new(),
            attrs: BTreeMap::new(),
            text: String::new(),
            children: Vec::new(),
        }
    }

    pub fn class(mut self, class: &str) -> Self {
        if !self.class.is_empty() {
            self.class.push(' ');
        }
        self.class.push_str(class);
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn child(mut self, child: ElementSpec) -> Self {
        self.children.push(child);
        self
    }
}

// =============================================================================
// Document
// =============================================================================

pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
    body: NodeId,
    pending: Vec<NodeId>,
    selectors: RefCell<HashMap<String, Option<Rc<SelectorList>>>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty `<html><body></body></html>` document.
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: vec![NodeData::new("html")],
            root: NodeId(0),
            body: NodeId(0),
            pending: Vec::new(),
            selectors: RefCell::new(HashMap::new()),
        };
        let body = doc.alloc(NodeData::new("body"));
        doc.attach(doc.root, body, None);
        doc.body = body;
        doc.pending.clear();
        doc
    }

    /// Build a document whose body holds `specs`. No mutation records are
    /// left pending: this is the page as first rendered.
    pub fn from_specs(specs: &[ElementSpec]) -> Self {
        let mut doc = Self::new();
        let body = doc.body;
        for spec in specs {
            doc.insert(&body, spec);
        }
        doc.pending.clear();
        doc
    }

    /// Parse a JSON array of [`ElementSpec`] into a document.
    pub fn from_json(json: &str) -> Result<Self, HiderError> {
        let specs: Vec<ElementSpec> = serde_json::from_str(json)?;
        Ok(Self::from_specs(&specs))
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Build `spec` detached, then append it under `parent` in one insertion.
    pub fn insert(&mut self, parent: &NodeId, spec: &ElementSpec) -> NodeId {
        let node = self.build(spec);
        self.append_child(parent, &node);
        node
    }

    fn build(&mut self, spec: &ElementSpec) -> NodeId {
        let mut data = NodeData::new(&spec.tag);
        data.classes = spec.class.split_whitespace().map(str::to_string).collect();
        data.attrs = spec
            .attrs
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case("class"))
            .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
            .collect();
        data.text = spec.text.clone();
        let id = self.alloc(data);
        for child in &spec.children {
            let child_id = self.build(child);
            self.attach(id, child_id, None);
        }
        id
    }

    /// Root nodes inserted into the connected tree since the last call.
    pub fn take_mutations(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.pending)
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            if id == self.root {
                return true;
            }
            cursor = self.nodes[id.0].parent;
        }
        false
    }

    pub fn tag(&self, node: NodeId) -> &str {
        &self.nodes[node.0].tag
    }

    pub fn classes(&self, node: NodeId) -> &[String] {
        &self.nodes[node.0].classes
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(data);
        NodeId(self.nodes.len() - 1)
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, position: Option<usize>) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        let children = &mut self.nodes[parent.0].children;
        match position {
            Some(index) if index <= children.len() => children.insert(index, child),
            _ => children.push(child),
        }
        if self.is_connected(parent) {
            self.pending.push(child);
        }
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != node);
        }
    }

    fn selector(&self, selector: &str) -> Option<Rc<SelectorList>> {
        if let Some(cached) = self.selectors.borrow().get(selector) {
            return cached.clone();
        }
        let parsed = match SelectorList::parse(selector) {
            Ok(list) => Some(Rc::new(list)),
            Err(e) => {
                log::warn!("Invalid selector '{}': {}", selector, e);
                None
            }
        };
        self.selectors.borrow_mut().insert(selector.to_string(), parsed.clone());
        parsed
    }

    /// Pre-order walk of the subtree below `scope`, `scope` excluded.
    fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[scope.0].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
        }
        out
    }

    fn candidates(&self, scope: Option<&NodeId>) -> Vec<NodeId> {
        match scope {
            Some(&scope) => self.descendants(scope),
            None => {
                let mut all = vec![self.root];
                all.extend(self.descendants(self.root));
                all
            }
        }
    }

    fn append_text(&self, node: NodeId, out: &mut String) {
        let data = &self.nodes[node.0];
        out.push_str(&data.text);
        for &child in &data.children {
            self.append_text(child, out);
        }
    }
}

impl SelectorTarget for Document {
    type Id = NodeId;

    fn tag_name(&self, node: NodeId) -> &str {
        &self.nodes[node.0].tag
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.nodes[node.0].classes.iter().any(|c| c == class)
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes[node.0]
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }
}

impl Dom for Document {
    type Node = NodeId;

    fn query_selector(&self, scope: Option<&NodeId>, selector: &str) -> Option<NodeId> {
        let list = self.selector(selector)?;
        self.candidates(scope).into_iter().find(|&id| list.matches(self, id))
    }

    fn query_selector_all(&self, scope: Option<&NodeId>, selector: &str) -> Vec<NodeId> {
        let Some(list) = self.selector(selector) else {
            return Vec::new();
        };
        self.candidates(scope).into_iter().filter(|&id| list.matches(self, id)).collect()
    }

    fn matches(&self, node: &NodeId, selector: &str) -> bool {
        self.selector(selector).map_or(false, |list| list.matches(self, *node))
    }

    fn closest(&self, node: &NodeId, selector: &str) -> Option<NodeId> {
        let list = self.selector(selector)?;
        let mut cursor = Some(*node);
        while let Some(id) = cursor {
            if list.matches(self, id) {
                return Some(id);
            }
            cursor = self.nodes[id.0].parent;
        }
        None
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    fn previous_element_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let parent = self.nodes[node.0].parent?;
        let siblings = &self.nodes[parent.0].children;
        let index = siblings.iter().position(|c| c == node)?;
        index.checked_sub(1).map(|i| siblings[i])
    }

    fn has_class(&self, node: &NodeId, class: &str) -> bool {
        SelectorTarget::has_class(self, *node, class)
    }

    fn text_content(&self, node: &NodeId) -> String {
        let mut out = String::new();
        self.append_text(*node, &mut out);
        out
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        if name == "class" {
            let classes = &self.nodes[node.0].classes;
            return (!classes.is_empty()).then(|| classes.join(" "));
        }
        SelectorTarget::attribute(self, *node, &name).map(str::to_string)
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        if name == "class" {
            self.nodes[node.0].classes = value.split_whitespace().map(str::to_string).collect();
            return;
        }
        let attrs = &mut self.nodes[node.0].attrs;
        match attrs.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => attrs.push((name, value.to_string())),
        }
    }

    fn add_class(&mut self, node: &NodeId, class: &str) {
        let classes = &mut self.nodes[node.0].classes;
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_string());
        }
    }

    fn remove_class(&mut self, node: &NodeId, class: &str) {
        self.nodes[node.0].classes.retain(|c| c != class);
    }

    fn create_element(&mut self, tag: &str) -> Option<NodeId> {
        Some(self.alloc(NodeData::new(tag)))
    }

    fn append_child(&mut self, parent: &NodeId, child: &NodeId) {
        self.attach(*parent, *child, None);
    }

    fn prepend_child(&mut self, parent: &NodeId, child: &NodeId) {
        self.attach(*parent, *child, Some(0));
    }

    fn set_text_content(&mut self, node: &NodeId, text: &str) {
        let children = std::mem::take(&mut self.nodes[node.0].children);
        for child in children {
            self.nodes[child.0].parent = None;
        }
        self.nodes[node.0].text = text.to_string();
    }

    fn remove(&mut self, node: &NodeId) {
        self.detach(*node);
    }

    fn body(&self) -> Option<NodeId> {
        Some(self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comment(author: &str) -> ElementSpec {
        ElementSpec::new("div").class("timeline-comment").child(
            ElementSpec::new("div").class("timeline-comment-header").child(
                ElementSpec::new("a").class("author").attr("href", &format!("/{author}")).text(author),
            ),
        )
    }

    #[test]
    fn test_from_specs_leaves_no_pending_mutations() {
        let mut doc = Document::from_specs(&[comment("alice"), comment("bob")]);
        assert!(doc.take_mutations().is_empty());
        assert_eq!(doc.count(".timeline-comment"), 2);
    }

    #[test]
    fn test_insert_records_subtree_root_once() {
        let mut doc = Document::from_specs(&[]);
        let body = doc.body().unwrap();
        let node = doc.insert(&body, &comment("carol"));
        assert_eq!(doc.take_mutations(), vec![node]);
        assert!(doc.take_mutations().is_empty());
    }

    #[test]
    fn test_detached_insert_is_not_recorded() {
        let mut doc = Document::new();
        let orphan = doc.create_element("div").unwrap();
        let child = doc.create_element("span").unwrap();
        doc.append_child(&orphan, &child);
        assert!(doc.take_mutations().is_empty());
    }

    #[test]
    fn test_scoped_query_and_document_order() {
        let doc = Document::from_specs(&[comment("alice"), comment("bob")]);
        let comments = doc.query_selector_all(None, ".timeline-comment");
        let author = doc.query_selector(Some(&comments[1]), ".timeline-comment-header .author").unwrap();
        assert_eq!(doc.text_content(&author), "bob");
        assert!(doc.query_selector(Some(&author), ".author").is_none());
    }

    #[test]
    fn test_closest_and_siblings() {
        let doc = Document::from_specs(&[ElementSpec::new("strong")
            .child(ElementSpec::new("a").class("author").text("bot-x"))
            .child(ElementSpec::new("span").class("Label Label--secondary").text("bot"))]);
        let label = doc.query_selector(None, ".Label--secondary").unwrap();
        let prev = doc.previous_element_sibling(&label).unwrap();
        assert!(Dom::has_class(&doc, &prev, "author"));
        assert!(doc.previous_element_sibling(&prev).is_none());
        assert_eq!(doc.closest(&label, "strong"), Dom::parent(&doc, &label));
    }

    #[test]
    fn test_remove_disconnects_from_queries() {
        let mut doc = Document::from_specs(&[comment("alice")]);
        let node = doc.query_selector(None, ".timeline-comment").unwrap();
        doc.remove(&node);
        assert!(!doc.is_connected(node));
        assert_eq!(doc.count(".timeline-comment"), 0);
        // the handle itself stays valid
        assert_eq!(doc.tag(node), "div");
    }

    #[test]
    fn test_prepend_child_goes_first() {
        let mut doc = Document::from_specs(&[comment("alice")]);
        let body = doc.body().unwrap();
        let marker = doc.create_element("button").unwrap();
        doc.prepend_child(&body, &marker);
        assert_eq!(doc.children(body)[0], marker);
    }

    #[test]
    fn test_invalid_selector_matches_nothing() {
        let doc = Document::from_specs(&[comment("alice")]);
        assert!(doc.query_selector_all(None, "div > a").is_empty());
        assert!(!doc.exists("["));
    }

    #[test]
    fn test_class_attribute_maps_to_class_list() {
        let mut doc = Document::from_specs(&[ElementSpec::new("div").class("a b")]);
        let node = doc.query_selector(None, ".a").unwrap();
        assert_eq!(Dom::attribute(&doc, &node, "class").as_deref(), Some("a b"));
        doc.set_attribute(&node, "class", "c  d");
        assert!(Dom::has_class(&doc, &node, "d"));
        assert_eq!(doc.count(".a"), 0);
    }

    #[test]
    fn test_from_json() {
        let doc = Document::from_json(r#"[{"class": "timeline-comment", "children": [{"tag": "a", "class": "author", "text": "x"}]}]"#).unwrap();
        assert_eq!(doc.count(".timeline-comment .author"), 1);
        assert!(Document::from_json("{").is_err());
    }
}
