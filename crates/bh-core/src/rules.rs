//! Rule Table
//!
//! Bot detection is pure policy: an ordered table of `(id, field, pattern,
//! tier)` rows plus the structural selectors used to find comments and the
//! signals inside them. The classifier walks tiers in order and asks the
//! compiled [`RuleSet`] whether a row of that tier matches the text it
//! extracted for the row's field.

use once_cell::sync::Lazy;
use regex::{RegexSet, RegexSetBuilder};

use crate::types::{CommentRole, Tier};

// =============================================================================
// Rule rows
// =============================================================================

/// Which piece of a comment a rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Displayed text of the primary author link
    AccountName,
    /// Text of a label element
    LabelText,
    /// `href` of the primary author link
    Url,
    /// Text of the comment body
    BodyText,
    /// `title`/`alt` attribute of an element matching [`selectors::ACTION_MARKER`]
    Attribute,
}

/// How a rule compares against the extracted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// Case-insensitive regular expression over the trimmed text
    Regex(&'static str),
    /// Exact match against the trimmed text
    Exact(&'static str),
    /// Case-sensitive substring
    Contains(&'static str),
    /// Substring of the lowercased text (needle is lowercase)
    ContainsFolded(&'static str),
    /// Equality with the trimmed, lowercased text
    Normalized(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    pub id: &'static str,
    pub field: Field,
    pub pattern: Pattern,
    pub tier: Tier,
}

/// Built-in rules, in evaluation order within each tier.
pub static RULES: &[Rule] = &[
    // Labels next to an author link, then inside the main author's container
    Rule { id: "label.colocated-bot", field: Field::LabelText, pattern: Pattern::Normalized("bot"), tier: Tier::CoLocatedLabel },
    Rule { id: "label.main-author-bot", field: Field::LabelText, pattern: Pattern::Normalized("bot"), tier: Tier::MainAuthorLabel },
    // Author identity
    Rule { id: "author.apps-link", field: Field::Url, pattern: Pattern::Contains("/apps/"), tier: Tier::AuthorIdentity },
    Rule { id: "author.suffix-bracket-bot", field: Field::AccountName, pattern: Pattern::Regex(r"\[bot\]$"), tier: Tier::AuthorIdentity },
    Rule { id: "author.suffix-bot", field: Field::AccountName, pattern: Pattern::Regex("bot$"), tier: Tier::AuthorIdentity },
    Rule { id: "author.suffix-dash-bot", field: Field::AccountName, pattern: Pattern::Regex("-bot$"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.dependabot", field: Field::AccountName, pattern: Pattern::Regex("^dependabot"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.renovate", field: Field::AccountName, pattern: Pattern::Regex("^renovate"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.github-actions", field: Field::AccountName, pattern: Pattern::Regex("^github-actions"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.codecov", field: Field::AccountName, pattern: Pattern::Regex("^codecov"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.sonarcloud", field: Field::AccountName, pattern: Pattern::Regex("^sonarcloud"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.vercel", field: Field::AccountName, pattern: Pattern::Regex("^vercel"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.netlify", field: Field::AccountName, pattern: Pattern::Regex("^netlify"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.circleci", field: Field::AccountName, pattern: Pattern::Regex("^circleci"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.travis", field: Field::AccountName, pattern: Pattern::Regex("^travis"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.jenkins", field: Field::AccountName, pattern: Pattern::Regex("^jenkins"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.azure-pipelines", field: Field::AccountName, pattern: Pattern::Regex("^azure-pipelines"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.gitguardian", field: Field::AccountName, pattern: Pattern::Regex("^gitguardian"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.snyk", field: Field::AccountName, pattern: Pattern::Regex("^snyk"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.deepsource", field: Field::AccountName, pattern: Pattern::Regex("^deepsource"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.codeclimate", field: Field::AccountName, pattern: Pattern::Regex("^codeclimate"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.lighthouse", field: Field::AccountName, pattern: Pattern::Regex("^lighthouse"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.bundlesize", field: Field::AccountName, pattern: Pattern::Regex("^bundlesize"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.size-limit", field: Field::AccountName, pattern: Pattern::Regex("^size-limit"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.semantic-release", field: Field::AccountName, pattern: Pattern::Regex("^semantic-release"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.greenkeeper", field: Field::AccountName, pattern: Pattern::Regex("^greenkeeper"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.pyup", field: Field::AccountName, pattern: Pattern::Regex("^pyup"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.safety", field: Field::AccountName, pattern: Pattern::Regex("^safety"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.whitesource", field: Field::AccountName, pattern: Pattern::Regex("^whitesource"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.mend", field: Field::AccountName, pattern: Pattern::Regex("^mend"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.fossabot", field: Field::AccountName, pattern: Pattern::Regex("^fossabot"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.allcontributors", field: Field::AccountName, pattern: Pattern::Regex("^allcontributors"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.stale", field: Field::AccountName, pattern: Pattern::Regex("^stale"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.lock", field: Field::AccountName, pattern: Pattern::Regex("^lock"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.mergify", field: Field::AccountName, pattern: Pattern::Regex("^mergify"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.bors", field: Field::AccountName, pattern: Pattern::Regex("^bors"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.homu", field: Field::AccountName, pattern: Pattern::Regex("^homu"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.bulldozer", field: Field::AccountName, pattern: Pattern::Regex("^bulldozer"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.danger", field: Field::AccountName, pattern: Pattern::Regex("^danger"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.hound", field: Field::AccountName, pattern: Pattern::Regex("^hound"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.pronto", field: Field::AccountName, pattern: Pattern::Regex("^pronto"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.rubocop", field: Field::AccountName, pattern: Pattern::Regex("^rubocop"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.eslint", field: Field::AccountName, pattern: Pattern::Regex("^eslint"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.prettier", field: Field::AccountName, pattern: Pattern::Regex("^prettier"), tier: Tier::AuthorIdentity },
    Rule { id: "author.prefix.stylelint", field: Field::AccountName, pattern: Pattern::Regex("^stylelint"), tier: Tier::AuthorIdentity },
    Rule { id: "author.user.sd-111029", field: Field::AccountName, pattern: Pattern::Exact("SD-111029"), tier: Tier::AuthorIdentity },
    // Header labels not tied to a specific author
    Rule { id: "label.variant-bot", field: Field::LabelText, pattern: Pattern::Normalized("bot"), tier: Tier::LabelVariant },
    Rule { id: "label.variant-app", field: Field::LabelText, pattern: Pattern::Normalized("app"), tier: Tier::LabelVariant },
    Rule { id: "label.variant-service", field: Field::LabelText, pattern: Pattern::Normalized("service"), tier: Tier::LabelVariant },
    // Automated-disclosure boilerplate
    Rule { id: "body.automatically-generated", field: Field::BodyText, pattern: Pattern::ContainsFolded("automatically generated"), tier: Tier::Boilerplate },
    Rule { id: "body.auto-generated", field: Field::BodyText, pattern: Pattern::ContainsFolded("auto-generated"), tier: Tier::Boilerplate },
    Rule { id: "body.this-is-an-automated", field: Field::BodyText, pattern: Pattern::ContainsFolded("this is an automated"), tier: Tier::Boilerplate },
    Rule { id: "body.automated-comment", field: Field::BodyText, pattern: Pattern::ContainsFolded("automated comment"), tier: Tier::Boilerplate },
    Rule { id: "body.bot-comment", field: Field::BodyText, pattern: Pattern::ContainsFolded("bot comment"), tier: Tier::Boilerplate },
    // CI action identifiers in title/alt
    Rule { id: "marker.github-actions", field: Field::Attribute, pattern: Pattern::Contains("github-actions"), tier: Tier::ActionMarker },
];

// =============================================================================
// Structural selectors
// =============================================================================

pub mod selectors {
    /// Comment-like elements examined on the initial scan.
    pub const SCAN: &str = concat!(
        ".timeline-comment, ",
        ".timeline-comment-group, ",
        ".review-comment, ",
        ".js-review-comment, ",
        ".js-comment, ",
        ".discussion-item, ",
        ".js-discussion-item, ",
        "[data-testid=\"review-comment\"], ",
        ".js-timeline-item, ",
        ".js-review-thread, ",
        ".review-thread-component, ",
        "[data-review-comment-id], ",
        ".js-review-comment-component",
    );

    /// Comment-like elements examined as they are inserted, and counted as
    /// the page total.
    pub const WATCH: &str = concat!(
        ".timeline-comment, ",
        ".timeline-comment-group, ",
        ".review-comment, ",
        ".js-review-comment, ",
        ".js-comment, ",
        ".discussion-item, ",
        ".js-discussion-item, ",
        "[data-testid=\"review-comment\"], ",
        ".js-timeline-item",
    );

    pub const ISSUE_PERMALINK: &str = "[id*=\"issue-\"][id*=\"-permalink\"]";
    pub const DISCUSSION: &str = ".js-discussion, .discussion-timeline";
    pub const DISCUSSION_ROOT: &str = ".js-discussion";
    pub const TIMELINE_COMMENT: &str = ".timeline-comment";
    pub const EDIT_BUTTON: &str = ".js-comment-edit-button";
    pub const EDIT_HISTORY: &str = ".js-comment-edit-history";

    pub const SECONDARY_LABEL: &str = ".Label--secondary";
    pub const AUTHOR: &str = ".author";
    pub const AUTHOR_CLASS: &str = "author";
    pub const AUTHOR_WRAPPER: &str = "strong";

    pub const MAIN_AUTHOR: &str = concat!(
        ".timeline-comment-header h3 .author, ",
        ".timeline-comment-header .author, ",
        ".flex-auto .author, ",
        ".review-comment-header .author, ",
        ".discussion-item-header .author",
    );

    pub const HEADER_LABELS: &str = concat!(
        ".timeline-comment-header h3 .Label, ",
        ".timeline-comment-header .Label, ",
        ".flex-auto .Label, ",
        ".review-comment-header .Label, ",
        ".discussion-item-header .Label, ",
        "strong .Label",
    );

    pub const COMMENT_BODY: &str = ".comment-body, .timeline-comment-text";
    pub const ACTION_MARKER: &str = "[title*=\"github-actions\"], [alt*=\"github-actions\"]";
    pub const ACTION_MARKER_ATTRIBUTES: [&str; 2] = ["title", "alt"];
}

/// Selector for each structural role a comment-like element can carry.
pub static ROLE_SELECTORS: &[(CommentRole, &str)] = &[
    (CommentRole::TOP_LEVEL, ".timeline-comment, .js-comment"),
    (CommentRole::GROUP, ".timeline-comment-group"),
    (
        CommentRole::REVIEW_COMMENT,
        ".review-comment, .js-review-comment, [data-testid=\"review-comment\"], [data-review-comment-id], .js-review-comment-component",
    ),
    (CommentRole::REVIEW_THREAD, ".js-review-thread, .review-thread-component"),
    (CommentRole::DISCUSSION_ITEM, ".discussion-item, .js-discussion-item"),
    (CommentRole::TIMELINE_ITEM, ".js-timeline-item"),
];

// =============================================================================
// Compiled rule set
// =============================================================================

/// The rule table with its regular expressions compiled once.
pub struct RuleSet {
    rules: &'static [Rule],
    /// All `Pattern::Regex` rows, compiled case-insensitively
    regexes: RegexSet,
    /// `regex_rows[i]` is the table index of set pattern `i`
    regex_rows: Vec<usize>,
}

static BUILTIN: Lazy<RuleSet> =
    Lazy::new(|| RuleSet::compile(RULES).expect("built-in rule table must compile"));

impl RuleSet {
    /// The compiled built-in table.
    pub fn builtin() -> &'static RuleSet {
        &BUILTIN
    }

    pub fn compile(rules: &'static [Rule]) -> Result<Self, regex::Error> {
        let mut patterns = Vec::new();
        let mut regex_rows = Vec::new();
        for (index, rule) in rules.iter().enumerate() {
            if let Pattern::Regex(pattern) = rule.pattern {
                patterns.push(pattern);
                regex_rows.push(index);
            }
        }

        let regexes = RegexSetBuilder::new(&patterns).case_insensitive(true).build()?;

        Ok(Self { rules, regexes, regex_rows })
    }

    pub fn rules(&self) -> &'static [Rule] {
        self.rules
    }

    /// First row of `tier` inspecting `field` that matches `text`.
    pub fn first_match(&self, tier: Tier, field: Field, text: &str) -> Option<&'static Rule> {
        let trimmed = text.trim();
        let mut regex_hits: Option<Vec<usize>> = None;
        let mut folded: Option<String> = None;

        for (index, rule) in self.rules.iter().enumerate() {
            if rule.tier != tier || rule.field != field {
                continue;
            }
            let hit = match rule.pattern {
                Pattern::Regex(_) => {
                    let hits = regex_hits.get_or_insert_with(|| {
                        self.regexes
                            .matches(trimmed)
                            .into_iter()
                            .map(|i| self.regex_rows[i])
                            .collect()
                    });
                    hits.contains(&index)
                }
                Pattern::Exact(expected) => trimmed == expected,
                Pattern::Contains(needle) => text.contains(needle),
                Pattern::ContainsFolded(needle) => {
                    folded.get_or_insert_with(|| text.to_lowercase()).contains(needle)
                }
                Pattern::Normalized(expected) => normalize(text) == expected,
            };
            if hit {
                return Some(rule);
            }
        }
        None
    }
}

/// Label normalization: trimmed and lowercased.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::SelectorList;

    #[test]
    fn test_builtin_compiles() {
        let set = RuleSet::builtin();
        assert_eq!(set.rules().len(), RULES.len());
    }

    #[test]
    fn test_rule_ids_unique() {
        let mut ids: Vec<&str> = RULES.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), RULES.len());
    }

    #[test]
    fn test_every_account_pattern_matches_its_own_prefix() {
        let set = RuleSet::builtin();
        for rule in RULES.iter().filter(|r| r.field == Field::AccountName) {
            let sample = match rule.pattern {
                Pattern::Regex(p) => p.trim_start_matches('^').trim_end_matches('$').replace('\\', ""),
                Pattern::Exact(s) => s.to_string(),
                other => panic!("unexpected account pattern {:?}", other),
            };
            assert!(
                set.first_match(Tier::AuthorIdentity, Field::AccountName, &sample).is_some(),
                "{} did not match {:?}",
                rule.id,
                sample
            );
        }
    }

    #[test]
    fn test_account_patterns() {
        let set = RuleSet::builtin();
        let hit = |name: &str| set.first_match(Tier::AuthorIdentity, Field::AccountName, name).map(|r| r.id);

        assert_eq!(hit("dependabot[bot]"), Some("author.suffix-bracket-bot"));
        assert_eq!(hit("  Renovate-Runner "), Some("author.prefix.renovate"));
        assert_eq!(hit("my-cool-BOT"), Some("author.suffix-bot"));
        assert_eq!(hit("SD-111029"), Some("author.user.sd-111029"));
        assert_eq!(hit("sd-111029"), None);
        assert_eq!(hit("alice"), None);
        assert_eq!(hit("bottleneck"), None);
    }

    #[test]
    fn test_url_and_body_patterns() {
        let set = RuleSet::builtin();
        assert!(set.first_match(Tier::AuthorIdentity, Field::Url, "/apps/github-actions").is_some());
        assert!(set.first_match(Tier::AuthorIdentity, Field::Url, "/APPS/x").is_none());
        assert_eq!(
            set.first_match(Tier::Boilerplate, Field::BodyText, "This comment was AUTOMATICALLY generated")
                .map(|r| r.id),
            Some("body.automatically-generated")
        );
        assert!(set.first_match(Tier::Boilerplate, Field::BodyText, "looks good to me").is_none());
    }

    #[test]
    fn test_label_tiers_are_separate() {
        let set = RuleSet::builtin();
        assert!(set.first_match(Tier::CoLocatedLabel, Field::LabelText, " Bot ").is_some());
        assert!(set.first_match(Tier::CoLocatedLabel, Field::LabelText, "app").is_none());
        assert_eq!(
            set.first_match(Tier::LabelVariant, Field::LabelText, "Service").map(|r| r.id),
            Some("label.variant-service")
        );
    }

    #[test]
    fn test_selectors_parse() {
        let all = [
            selectors::SCAN,
            selectors::WATCH,
            selectors::ISSUE_PERMALINK,
            selectors::DISCUSSION,
            selectors::DISCUSSION_ROOT,
            selectors::TIMELINE_COMMENT,
            selectors::EDIT_BUTTON,
            selectors::EDIT_HISTORY,
            selectors::SECONDARY_LABEL,
            selectors::AUTHOR,
            selectors::AUTHOR_WRAPPER,
            selectors::MAIN_AUTHOR,
            selectors::HEADER_LABELS,
            selectors::COMMENT_BODY,
            selectors::ACTION_MARKER,
        ];
        for selector in all.into_iter().chain(ROLE_SELECTORS.iter().map(|(_, s)| *s)) {
            assert!(SelectorList::parse(selector).is_ok(), "failed to parse {selector}");
        }
        assert_eq!(SelectorList::parse(selectors::SCAN).unwrap().selectors.len(), 13);
        assert_eq!(SelectorList::parse(selectors::WATCH).unwrap().selectors.len(), 9);
    }
}
