//! Bot Hider Core Library
//!
//! This crate holds everything the bot comment hider does that does not need
//! a browser: classifying comments, tracking the ones found, toggling their
//! visibility, the popup/page message protocol and navigation handling.
//!
//! # Architecture
//!
//! All page access goes through the [`dom::Dom`] trait. The wasm crate
//! implements it over the live page; [`document::Document`] implements it
//! in memory so the whole pipeline runs natively in tests and the CLI.
//!
//! # Modules
//!
//! - `types`: Shared type definitions (tiers, verdicts, stats)
//! - `selector`: CSS selector subset used against the in-memory document
//! - `dom` / `document`: document abstraction and in-memory implementation
//! - `rules` / `classifier`: declarative rule table and tiered classifier
//! - `registry`: stable keys for comments found so far
//! - `visibility` / `affordance`: the hide flag and its on-page button
//! - `session` / `lifecycle`: one active hider and its navigation handling
//! - `bridge` / `popup`: popup messages and popup-side logic

pub mod affordance;
pub mod bridge;
pub mod classifier;
pub mod config;
pub mod document;
pub mod dom;
pub mod error;
pub mod lifecycle;
pub mod markup;
pub mod popup;
pub mod registry;
pub mod rules;
pub mod selector;
pub mod session;
pub mod types;
pub mod visibility;

// Re-export commonly used types
pub use bridge::{dispatch, Request, Response};
pub use classifier::Classifier;
pub use config::Config;
pub use document::{Document, ElementSpec};
pub use dom::{Dom, Subscription};
pub use error::HiderError;
pub use lifecycle::{Lifecycle, NavigationAction};
pub use rules::RuleSet;
pub use session::Session;
pub use types::{CommentRole, Stats, Tier, Verdict};
pub use visibility::FlagStore;
