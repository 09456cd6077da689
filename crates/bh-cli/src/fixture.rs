//! Page fixtures
//!
//! A fixture is the page as first rendered plus optional batches inserted
//! later, replayed through a full session the way the content script sees
//! them.

use std::fs;

use bh_core::config::Config;
use bh_core::document::{Document, ElementSpec};
use bh_core::dom::Dom;
use bh_core::error::HiderError;
use bh_core::popup::{count_directly, DirectCount};
use bh_core::rules::selectors;
use bh_core::selector::SelectorList;
use bh_core::session::Session;
use bh_core::types::Stats;
use bh_core::visibility::MemoryStore;
use serde::{Deserialize, Serialize};

/// Elements appended under the first match of `parent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insertion {
    pub parent: String,
    pub elements: Vec<ElementSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fixture {
    Page {
        body: Vec<ElementSpec>,
        #[serde(default)]
        later: Vec<Insertion>,
    },
    Body(Vec<ElementSpec>),
}

impl Fixture {
    pub fn load(path: &str) -> Result<Self, String> {
        let content = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
        serde_json::from_str(&content).map_err(|e| format!("Invalid fixture '{}': {}", path, e))
    }

    fn parts(&self) -> (&[ElementSpec], &[Insertion]) {
        match self {
            Self::Page { body, later } => (body, later),
            Self::Body(body) => (body, &[]),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HiddenComment {
    pub key: String,
    pub author: String,
    pub tier: &'static str,
    pub rule: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub stats: Stats,
    /// What the popup counts when the page script does not answer.
    pub direct: DirectCount,
    pub button: Option<String>,
    pub comments: Vec<HiddenComment>,
}

pub fn replay(fixture: &Fixture, config: &Config, enabled: bool) -> Result<ScanReport, String> {
    let (body, later) = fixture.parts();
    let mut session = Session::start(Document::from_specs(body), MemoryStore::with_value(enabled), config, enabled, 1);

    for (batch, insertion) in later.iter().enumerate() {
        // a bad selector would otherwise read as "no match"
        SelectorList::parse(&insertion.parent)
            .map_err(|e| format!("Insertion {}: {}", batch, HiderError::from(e)))?;
        let parent = session
            .dom()
            .query_selector(None, &insertion.parent)
            .ok_or_else(|| format!("Insertion {}: no element matches '{}'", batch, insertion.parent))?;
        for spec in &insertion.elements {
            session.dom_mut().insert(&parent, spec);
        }
        let added = session.dom_mut().take_mutations();
        let found = session.handle_mutations(&added);
        log::info!("Insertion {}: {} element(s), {} new bot comment(s)", batch, added.len(), found);
    }

    Ok(report(&session, config))
}

fn report(session: &Session<Document, MemoryStore>, config: &Config) -> ScanReport {
    let dom = session.dom();
    let comments = session
        .registry()
        .entries()
        .iter()
        .map(|entry| {
            let selector = bh_core::dom::attribute_selector(&config.key_attribute, &entry.key);
            let author = dom
                .query_selector(None, &selector)
                .and_then(|node| dom.query_selector(Some(&node), selectors::MAIN_AUTHOR))
                .map(|author| dom.text_content(&author).trim().to_string())
                .unwrap_or_default();
            HiddenComment {
                key: entry.key.clone(),
                author,
                tier: entry.verdict.tier.map_or("-", |t| t.name()),
                rule: entry.verdict.rule_id.unwrap_or("-"),
            }
        })
        .collect();

    ScanReport {
        stats: session.stats(),
        direct: count_directly(dom),
        button: session.affordance().map(|a| dom.text_content(a.button())),
        comments,
    }
}

#[cfg(test)]
mod tests {
    use bh_core::markup::{sample_page, CommentBuilder};
    use serde_json::json;

    use super::*;

    #[test]
    fn test_bare_body_fixture() {
        let fixture: Fixture = serde_json::from_value(serde_json::to_value(sample_page()).unwrap()).unwrap();
        let report = replay(&fixture, &Config::default(), true).unwrap();
        assert_eq!(report.stats, Stats { hidden_count: 2, total_count: 5, enabled: true });
        assert_eq!(report.direct, DirectCount { total: 5, hidden: 2 });
        assert_eq!(report.button.as_deref(), Some("Show Bot Comments (2)"));
        assert_eq!(report.comments[0].author, "dependabot[bot]");
        assert_eq!(report.comments[0].rule, "author.apps-link");
        assert_eq!(report.comments[1].rule, "label.colocated-bot");
    }

    #[test]
    fn test_later_insertions_are_replayed() {
        let fixture = Fixture::Page {
            body: sample_page(),
            later: vec![Insertion {
                parent: ".js-discussion".to_string(),
                elements: vec![CommentBuilder::new("vercel").body("Preview ready").build()],
            }],
        };
        let report = replay(&fixture, &Config::default(), false).unwrap();
        assert_eq!(report.stats.hidden_count, 3);
        assert!(!report.stats.enabled);
        assert_eq!(report.button.as_deref(), Some("Hide Bot Comments (3)"));
        assert_eq!(report.direct, DirectCount { total: 6, hidden: 0 });
    }

    #[test]
    fn test_insertion_without_parent_fails() {
        let fixture: Fixture = serde_json::from_value(json!({
            "body": [],
            "later": [{"parent": ".missing", "elements": []}]
        }))
        .unwrap();
        let err = replay(&fixture, &Config::default(), true).unwrap_err();
        assert!(err.contains(".missing"));
    }

    #[test]
    fn test_insertion_with_invalid_selector_fails() {
        let fixture: Fixture = serde_json::from_value(json!({
            "body": [],
            "later": [{"parent": "[data-thread", "elements": []}]
        }))
        .unwrap();
        let err = replay(&fixture, &Config::default(), true).unwrap_err();
        assert!(err.starts_with("Insertion 0: Invalid selector"), "{}", err);
    }
}
