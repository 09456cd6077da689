//! Core type definitions for BotHider
//!
//! These types flow between the classifier, the registry and the bridge.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// =============================================================================
// Tiers
// =============================================================================

/// One priority level of the classifier. Lower tiers are evaluated first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Tier {
    /// Issue/PR description; never a bot comment
    Exemption = 0,
    /// `bot` label sitting next to an author link
    CoLocatedLabel = 1,
    /// `bot` label inside the main author's container
    MainAuthorLabel = 2,
    /// App link, account-name pattern or literal bot user
    AuthorIdentity = 3,
    /// Any header label reading bot/app/service
    LabelVariant = 4,
    /// Automated-disclosure phrase in the comment body
    Boilerplate = 5,
    /// CI action identifier in a title/alt attribute
    ActionMarker = 6,
}

impl Tier {
    pub const ALL: [Tier; 7] = [
        Tier::Exemption,
        Tier::CoLocatedLabel,
        Tier::MainAuthorLabel,
        Tier::AuthorIdentity,
        Tier::LabelVariant,
        Tier::Boilerplate,
        Tier::ActionMarker,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Exemption => "exemption",
            Self::CoLocatedLabel => "co-located-label",
            Self::MainAuthorLabel => "main-author-label",
            Self::AuthorIdentity => "author-identity",
            Self::LabelVariant => "label-variant",
            Self::Boilerplate => "boilerplate",
            Self::ActionMarker => "action-marker",
        }
    }
}

impl TryFrom<u8> for Tier {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL.get(value as usize).copied().ok_or(())
    }
}

// =============================================================================
// Structural roles
// =============================================================================

bitflags::bitflags! {
    /// Structural role(s) of a comment-like element. A node can carry
    /// several, e.g. `.timeline-comment.js-comment`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CommentRole: u8 {
        /// `.timeline-comment` / `.js-comment`
        const TOP_LEVEL = 1 << 0;
        /// `.timeline-comment-group`
        const GROUP = 1 << 1;
        /// Review comments and their components
        const REVIEW_COMMENT = 1 << 2;
        /// Review threads
        const REVIEW_THREAD = 1 << 3;
        /// `.discussion-item` / `.js-discussion-item`
        const DISCUSSION_ITEM = 1 << 4;
        /// `.js-timeline-item` wrappers
        const TIMELINE_ITEM = 1 << 5;
    }
}

// =============================================================================
// Verdict
// =============================================================================

/// Outcome of classifying one element. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub is_bot: bool,
    /// Tier that decided the verdict; `None` when nothing matched
    pub tier: Option<Tier>,
    /// Identifier of the rule-table row that fired, if any
    pub rule_id: Option<&'static str>,
}

impl Verdict {
    pub const fn human() -> Self {
        Self { is_bot: false, tier: None, rule_id: None }
    }

    pub const fn exempt() -> Self {
        Self { is_bot: false, tier: Some(Tier::Exemption), rule_id: None }
    }

    pub const fn bot(tier: Tier, rule_id: &'static str) -> Self {
        Self { is_bot: true, tier: Some(tier), rule_id: Some(rule_id) }
    }
}

// =============================================================================
// Stats
// =============================================================================

/// Counters reported to the popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Stats {
    pub hidden_count: u32,
    pub total_count: u32,
    pub enabled: bool,
}
