//! Live page implementation of [`Dom`]

use bh_core::dom::Dom;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Node, NodeList};

use crate::chrome::describe;

pub struct BrowserDom {
    document: Document,
}

impl BrowserDom {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }
}

fn elements(list: NodeList) -> Vec<Element> {
    (0..list.length())
        .filter_map(|i| list.item(i))
        .filter_map(|node| node.dyn_into::<Element>().ok())
        .collect()
}

impl Dom for BrowserDom {
    type Node = Element;

    fn query_selector(&self, scope: Option<&Element>, selector: &str) -> Option<Element> {
        let found = match scope {
            Some(scope) => scope.query_selector(selector),
            None => self.document.query_selector(selector),
        };
        found.unwrap_or_else(|e| {
            log::warn!("Bad selector {:?}: {}", selector, describe(&e));
            None
        })
    }

    fn query_selector_all(&self, scope: Option<&Element>, selector: &str) -> Vec<Element> {
        let found = match scope {
            Some(scope) => scope.query_selector_all(selector),
            None => self.document.query_selector_all(selector),
        };
        match found {
            Ok(list) => elements(list),
            Err(e) => {
                log::warn!("Bad selector {:?}: {}", selector, describe(&e));
                Vec::new()
            }
        }
    }

    fn matches(&self, node: &Element, selector: &str) -> bool {
        node.matches(selector).unwrap_or(false)
    }

    fn closest(&self, node: &Element, selector: &str) -> Option<Element> {
        node.closest(selector).ok().flatten()
    }

    fn parent(&self, node: &Element) -> Option<Element> {
        node.parent_element()
    }

    fn previous_element_sibling(&self, node: &Element) -> Option<Element> {
        node.previous_element_sibling()
    }

    fn has_class(&self, node: &Element, class: &str) -> bool {
        node.class_list().contains(class)
    }

    fn text_content(&self, node: &Element) -> String {
        node.text_content().unwrap_or_default()
    }

    fn attribute(&self, node: &Element, name: &str) -> Option<String> {
        node.get_attribute(name)
    }

    fn set_attribute(&mut self, node: &Element, name: &str, value: &str) {
        if let Err(e) = node.set_attribute(name, value) {
            log::warn!("Failed to set {}: {}", name, describe(&e));
        }
    }

    fn add_class(&mut self, node: &Element, class: &str) {
        if let Err(e) = node.class_list().add_1(class) {
            log::warn!("Failed to add class {}: {}", class, describe(&e));
        }
    }

    fn remove_class(&mut self, node: &Element, class: &str) {
        if let Err(e) = node.class_list().remove_1(class) {
            log::warn!("Failed to remove class {}: {}", class, describe(&e));
        }
    }

    fn create_element(&mut self, tag: &str) -> Option<Element> {
        self.document
            .create_element(tag)
            .map_err(|e| log::warn!("Failed to create <{}>: {}", tag, describe(&e)))
            .ok()
    }

    fn append_child(&mut self, parent: &Element, child: &Element) {
        if let Err(e) = parent.append_child(child) {
            log::warn!("Failed to append: {}", describe(&e));
        }
    }

    fn prepend_child(&mut self, parent: &Element, child: &Element) {
        let first: Option<Node> = parent.first_element_child().map(Into::into);
        if let Err(e) = parent.insert_before(child, first.as_ref()) {
            log::warn!("Failed to prepend: {}", describe(&e));
        }
    }

    fn set_text_content(&mut self, node: &Element, text: &str) {
        node.set_text_content(Some(text));
    }

    fn remove(&mut self, node: &Element) {
        node.remove();
    }

    fn body(&self) -> Option<Element> {
        self.document.body().map(Into::into)
    }
}
