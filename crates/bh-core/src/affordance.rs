//! Toggle Affordance
//!
//! The single on-page button showing the current state and, once bots were
//! found, how many. Placement tries the host anchors in order and falls back
//! to a floating container on `<body>`.

use crate::dom::Dom;

pub const BUTTON_CLASS: &str = "btn btn-sm bot-hider-toggle";
pub const CONTAINER_CLASS: &str = "bot-hider-container";

/// Where the button ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// PR header action bar; the button is appended directly
    HeaderActions,
    /// Discussion sidebar; wrapped and inserted first
    Sidebar,
    /// Top of the discussion timeline; wrapped and inserted first
    TimelineTop,
    /// Floating container appended to `<body>`
    Floating,
}

impl Anchor {
    pub const ORDER: [Anchor; 4] = [Anchor::HeaderActions, Anchor::Sidebar, Anchor::TimelineTop, Anchor::Floating];

    /// Host selector for the anchor; `None` for the body fallback.
    pub fn selector(self) -> Option<&'static str> {
        match self {
            Self::HeaderActions => Some(".gh-header-actions, .pr-toolbar .diffbar-item"),
            Self::Sidebar => Some(".discussion-sidebar-item, .discussion-sidebar"),
            Self::TimelineTop => Some(".js-discussion, .discussion-timeline"),
            Self::Floating => None,
        }
    }

    /// Extra class for the wrapping container, if the anchor uses one.
    fn container_class(self) -> Option<&'static str> {
        match self {
            Self::HeaderActions => None,
            Self::Sidebar => Some("discussion-sidebar-item"),
            Self::TimelineTop => Some("bot-hider-fixed"),
            Self::Floating => Some("bot-hider-floating"),
        }
    }
}

pub fn button_label(enabled: bool, count: usize) -> String {
    let verb = if enabled { "Show" } else { "Hide" };
    if count > 0 {
        format!("{verb} Bot Comments ({count})")
    } else {
        format!("{verb} Bot Comments")
    }
}

pub fn button_title(enabled: bool, count: usize) -> String {
    let verb = if enabled { "Show" } else { "Hide" };
    if count > 0 {
        format!("{verb} bot comments ({count} found)")
    } else {
        format!("{verb} bot comments")
    }
}

/// A mounted button. `root` is what was inserted into the page: the button
/// itself or its container.
#[derive(Debug, Clone, PartialEq)]
pub struct Affordance<N> {
    button: N,
    root: N,
    anchor: Anchor,
}

impl<N: Clone + PartialEq> Affordance<N> {
    /// Create the button and insert it at the first available anchor.
    /// `None` when the document has no body or refuses to create elements.
    pub fn mount<D: Dom<Node = N>>(dom: &mut D, enabled: bool, count: usize) -> Option<Self> {
        let button = dom.create_element("button")?;
        dom.set_attribute(&button, "type", "button");
        dom.set_attribute(&button, "class", BUTTON_CLASS);

        for anchor in Anchor::ORDER {
            let target = match anchor.selector() {
                Some(selector) => dom.query_selector(None, selector),
                None => dom.body(),
            };
            let Some(target) = target else {
                continue;
            };

            let root = match anchor.container_class() {
                None => {
                    dom.append_child(&target, &button);
                    button.clone()
                }
                Some(extra) => {
                    let container = dom.create_element("div")?;
                    dom.set_attribute(&container, "class", &format!("{CONTAINER_CLASS} {extra}"));
                    dom.append_child(&container, &button);
                    if anchor == Anchor::Floating {
                        dom.append_child(&target, &container);
                    } else {
                        dom.prepend_child(&target, &container);
                    }
                    container
                }
            };

            log::debug!("Mounted toggle at {:?}", anchor);
            let affordance = Self { button, root, anchor };
            affordance.render(dom, enabled, count);
            return Some(affordance);
        }

        log::warn!("No body to mount the toggle on");
        None
    }

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    pub fn button(&self) -> &N {
        &self.button
    }

    pub fn render<D: Dom<Node = N>>(&self, dom: &mut D, enabled: bool, count: usize) {
        dom.set_text_content(&self.button, &button_label(enabled, count));
        dom.set_attribute(&self.button, "title", &button_title(enabled, count));
    }

    pub fn unmount<D: Dom<Node = N>>(self, dom: &mut D) {
        dom.remove(&self.root);
    }
}
