//! Host markup builders
//!
//! Produces [`ElementSpec`] trees shaped like the pull-request timeline the
//! extension runs on. Shared by the tests, the benches and the CLI `demo`
//! page.

use crate::document::ElementSpec;

/// One timeline or review comment.
#[derive(Debug, Clone)]
pub struct CommentBuilder {
    class: String,
    header_class: String,
    author: String,
    href: Option<String>,
    body: String,
    author_labels: Vec<String>,
    header_labels: Vec<String>,
    edit_history_author: Option<String>,
    permalink: Option<u32>,
    action_marker: Option<String>,
}

impl CommentBuilder {
    /// A top-level timeline comment.
    pub fn new(author: &str) -> Self {
        Self {
            class: "timeline-comment js-comment".to_string(),
            header_class: "timeline-comment-header".to_string(),
            author: author.to_string(),
            href: None,
            body: String::new(),
            author_labels: Vec::new(),
            header_labels: Vec::new(),
            edit_history_author: None,
            permalink: None,
            action_marker: None,
        }
    }

    /// An inline review comment.
    pub fn review(author: &str) -> Self {
        Self {
            class: "review-comment js-comment".to_string(),
            header_class: "review-comment-header".to_string(),
            ..Self::new(author)
        }
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    pub fn href(mut self, href: &str) -> Self {
        self.href = Some(href.to_string());
        self
    }

    /// Secondary label rendered right after the author link.
    pub fn author_label(mut self, text: &str) -> Self {
        self.author_labels.push(text.to_string());
        self
    }

    /// Plain label elsewhere in the header.
    pub fn header_label(mut self, text: &str) -> Self {
        self.header_labels.push(text.to_string());
        self
    }

    /// Edit-history entry naming a (labelled) editor.
    pub fn edited_by(mut self, editor: &str) -> Self {
        self.edit_history_author = Some(editor.to_string());
        self
    }

    /// Issue permalink anchor carried by the description.
    pub fn permalink(mut self, number: u32) -> Self {
        self.permalink = Some(number);
        self
    }

    /// Avatar whose `alt` names a CI identity.
    pub fn action_marker(mut self, alt: &str) -> Self {
        self.action_marker = Some(alt.to_string());
        self
    }

    pub fn build(self) -> ElementSpec {
        let href = self.href.unwrap_or_else(|| format!("/{}", self.author));
        let mut strong = ElementSpec::new("strong")
            .child(ElementSpec::new("a").class("author Link--primary").attr("href", &href).text(&self.author));
        for label in &self.author_labels {
            strong = strong.child(ElementSpec::new("span").class("Label Label--secondary").text(label));
        }

        let mut header = ElementSpec::new("div").class(&self.header_class);
        if let Some(number) = self.permalink {
            header = header.child(
                ElementSpec::new("a").attr("id", &format!("issue-{number}-permalink")).text("opened"),
            );
        }
        header = header.child(ElementSpec::new("h3").child(strong));
        for label in &self.header_labels {
            header = header.child(ElementSpec::new("span").class("Label").text(label));
        }
        if let Some(editor) = &self.edit_history_author {
            header = header.child(
                ElementSpec::new("details").class("js-comment-edit-history").child(
                    ElementSpec::new("strong")
                        .child(ElementSpec::new("a").class("author").attr("href", &format!("/{editor}")).text(editor))
                        .child(ElementSpec::new("span").class("Label Label--secondary").text("bot")),
                ),
            );
        }
        header = header.child(ElementSpec::new("button").class("js-comment-edit-button").text("Edit"));

        let mut comment = ElementSpec::new("div").class(&self.class);
        if let Some(alt) = &self.action_marker {
            comment = comment.child(ElementSpec::new("img").class("avatar").attr("alt", alt));
        }
        comment
            .child(header)
            .child(ElementSpec::new("div").class("comment-body").text(&self.body))
    }
}

/// `.js-discussion` timeline holding `items`.
pub fn discussion(items: Vec<ElementSpec>) -> ElementSpec {
    let mut timeline = ElementSpec::new("div").class("js-discussion discussion-timeline");
    for item in items {
        timeline = timeline.child(item);
    }
    timeline
}

/// Header action bar, the preferred anchor for the toggle.
pub fn header_actions() -> ElementSpec {
    ElementSpec::new("div").class("gh-header-actions")
}

/// A pull-request page body: header actions above the discussion.
pub fn pull_request_page(items: Vec<ElementSpec>) -> Vec<ElementSpec> {
    vec![header_actions(), discussion(items)]
}

/// Description plus a mix of human and bot comments.
pub fn sample_page() -> Vec<ElementSpec> {
    pull_request_page(vec![
        CommentBuilder::new("alice").permalink(1).body("Adds retry support to the uploader.").build(),
        CommentBuilder::new("dependabot[bot]").href("/apps/dependabot").body("Bumps serde from 1.0.1 to 1.0.2.").build(),
        CommentBuilder::new("bob").body("Looks good, one nit inline.").build(),
        CommentBuilder::new("codecov").author_label("bot").body("Coverage is unchanged.").build(),
        CommentBuilder::new("carol").body("Merging once CI is green.").build(),
    ])
}
