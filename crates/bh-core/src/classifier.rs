//! Comment Classifier
//!
//! Decides whether one comment-like element was written by a bot. Tiers run
//! in a fixed order and the first hit wins:
//!
//! 0. exemption: the discussion's first comment is always human
//! 1. a `bot` label next to an author link (outside edit history)
//! 2. a `bot` label in the main author's container
//! 3. app link, account-name pattern, or listed bot user
//! 4. any header label reading bot/app/service (outside edit history)
//! 5. automated-disclosure boilerplate in the body
//! 6. CI action identifier in a `title`/`alt` attribute
//!
//! A missing sub-element only means that tier's signal is absent.

use crate::dom::Dom;
use crate::rules::{normalize, selectors, Field, RuleSet, ROLE_SELECTORS};
use crate::types::{CommentRole, Tier, Verdict};

const DEBUG_TEXT_LIMIT: usize = 500;

pub struct Classifier<'r> {
    rules: &'r RuleSet,
    debug: bool,
}

impl<'r> Classifier<'r> {
    pub fn new(rules: &'r RuleSet) -> Self {
        Self { rules, debug: false }
    }

    /// Log every examined element at debug level.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn is_bot<D: Dom>(&self, dom: &D, element: &D::Node) -> bool {
        self.classify(dom, element).is_bot
    }

    pub fn classify<D: Dom>(&self, dom: &D, element: &D::Node) -> Verdict {
        if is_first_comment(dom, element) {
            return Verdict::exempt();
        }

        if self.debug {
            let class = dom.attribute(element, "class").unwrap_or_default();
            let text: String = dom.text_content(element).chars().take(DEBUG_TEXT_LIMIT).collect();
            log::debug!("Checking element class=\"{}\": {}", class, text.trim());
        }

        if let Some(verdict) = self.co_located_label(dom, element) {
            return verdict;
        }

        let main_author = dom.query_selector(Some(element), selectors::MAIN_AUTHOR);
        if let Some(author) = &main_author {
            if let Some(verdict) = self.main_author_label(dom, author) {
                return verdict;
            }
            if let Some(verdict) = self.author_identity(dom, author) {
                return verdict;
            }
        }

        self.label_variant(dom, element)
            .or_else(|| self.boilerplate(dom, element))
            .or_else(|| self.action_marker(dom, element))
            .unwrap_or_else(Verdict::human)
    }

    fn co_located_label<D: Dom>(&self, dom: &D, element: &D::Node) -> Option<Verdict> {
        for label in dom.query_selector_all(Some(element), selectors::SECONDARY_LABEL) {
            let text = label_text(dom, &label);
            let Some(rule) = self.rules.first_match(Tier::CoLocatedLabel, Field::LabelText, &text) else {
                continue;
            };
            if dom.closest(&label, selectors::EDIT_HISTORY).is_some() {
                continue;
            }
            if has_nearby_author(dom, &label) {
                return Some(Verdict::bot(Tier::CoLocatedLabel, rule.id));
            }
        }
        None
    }

    fn main_author_label<D: Dom>(&self, dom: &D, author: &D::Node) -> Option<Verdict> {
        let container = dom
            .closest(author, selectors::AUTHOR_WRAPPER)
            .or_else(|| dom.parent(author))?;
        let label = dom.query_selector(Some(&container), selectors::SECONDARY_LABEL)?;
        let text = label_text(dom, &label);
        self.rules
            .first_match(Tier::MainAuthorLabel, Field::LabelText, &text)
            .map(|rule| Verdict::bot(Tier::MainAuthorLabel, rule.id))
    }

    fn author_identity<D: Dom>(&self, dom: &D, author: &D::Node) -> Option<Verdict> {
        if let Some(href) = dom.attribute(author, "href") {
            if let Some(rule) = self.rules.first_match(Tier::AuthorIdentity, Field::Url, &href) {
                return Some(Verdict::bot(Tier::AuthorIdentity, rule.id));
            }
        }
        let username = dom.text_content(author);
        self.rules
            .first_match(Tier::AuthorIdentity, Field::AccountName, &username)
            .map(|rule| Verdict::bot(Tier::AuthorIdentity, rule.id))
    }

    fn label_variant<D: Dom>(&self, dom: &D, element: &D::Node) -> Option<Verdict> {
        for label in dom.query_selector_all(Some(element), selectors::HEADER_LABELS) {
            if dom.closest(&label, selectors::EDIT_HISTORY).is_some() {
                continue;
            }
            let text = label_text(dom, &label);
            if let Some(rule) = self.rules.first_match(Tier::LabelVariant, Field::LabelText, &text) {
                return Some(Verdict::bot(Tier::LabelVariant, rule.id));
            }
        }
        None
    }

    fn boilerplate<D: Dom>(&self, dom: &D, element: &D::Node) -> Option<Verdict> {
        let body = dom.query_selector(Some(element), selectors::COMMENT_BODY)?;
        let text = dom.text_content(&body);
        self.rules
            .first_match(Tier::Boilerplate, Field::BodyText, &text)
            .map(|rule| Verdict::bot(Tier::Boilerplate, rule.id))
    }

    fn action_marker<D: Dom>(&self, dom: &D, element: &D::Node) -> Option<Verdict> {
        for marker in dom.query_selector_all(Some(element), selectors::ACTION_MARKER) {
            for name in selectors::ACTION_MARKER_ATTRIBUTES {
                let Some(value) = dom.attribute(&marker, name) else {
                    continue;
                };
                if let Some(rule) = self.rules.first_match(Tier::ActionMarker, Field::Attribute, &value) {
                    return Some(Verdict::bot(Tier::ActionMarker, rule.id));
                }
            }
        }
        None
    }
}

/// Is there an author link beside `label`: under its parent, immediately
/// before it, or inside its `<strong>` wrapper?
fn has_nearby_author<D: Dom>(dom: &D, label: &D::Node) -> bool {
    if let Some(parent) = dom.parent(label) {
        if dom.query_selector(Some(&parent), selectors::AUTHOR).is_some() {
            return true;
        }
    }
    if let Some(prev) = dom.previous_element_sibling(label) {
        if dom.has_class(&prev, selectors::AUTHOR_CLASS) {
            return true;
        }
    }
    dom.closest(label, selectors::AUTHOR_WRAPPER)
        .and_then(|wrapper| dom.query_selector(Some(&wrapper), selectors::AUTHOR))
        .is_some()
}

/// Whether `element` is the discussion's opening comment (the PR
/// description) or a wrapper around it.
pub fn is_first_comment<D: Dom>(dom: &D, element: &D::Node) -> bool {
    if dom.query_selector(Some(element), selectors::ISSUE_PERMALINK).is_some() {
        return true;
    }

    if let Some(timeline) = dom.query_selector(None, selectors::DISCUSSION) {
        if let Some(first) = dom.query_selector(Some(&timeline), selectors::TIMELINE_COMMENT) {
            if is_inclusive_ancestor(dom, element, &first) {
                return true;
            }
        }
    }

    let has_edit_button = dom.query_selector(Some(element), selectors::EDIT_BUTTON).is_some();
    if has_edit_button && dom.closest(element, selectors::DISCUSSION_ROOT).is_some() {
        if let Some(first) = dom.query_selector(None, selectors::TIMELINE_COMMENT) {
            if is_inclusive_ancestor(dom, element, &first) {
                return true;
            }
        }
    }

    // index 0 of every comment-like node, with or without a timeline
    dom.query_selector(None, selectors::WATCH)
        .is_some_and(|first| is_inclusive_ancestor(dom, element, &first))
}

fn is_inclusive_ancestor<D: Dom>(dom: &D, ancestor: &D::Node, node: &D::Node) -> bool {
    let mut cursor = Some(node.clone());
    while let Some(current) = cursor {
        if &current == ancestor {
            return true;
        }
        cursor = dom.parent(&current);
    }
    false
}

/// Structural roles `node` carries.
pub fn comment_role<D: Dom>(dom: &D, node: &D::Node) -> CommentRole {
    ROLE_SELECTORS
        .iter()
        .filter(|(_, selector)| dom.matches(node, selector))
        .fold(CommentRole::empty(), |acc, (role, _)| acc | *role)
}

/// Normalized text of `node`, as compared by label rules.
pub fn label_text<D: Dom>(dom: &D, node: &D::Node) -> String {
    normalize(&dom.text_content(node))
}
