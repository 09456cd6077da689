//! Bot Hider CLI
//!
//! Developer tool for inspecting the rule table, classifying synthetic
//! comments and replaying page fixtures through a full hider session.

use std::fs;

use bh_core::bridge::{Request, Response};
use bh_core::classifier::Classifier;
use bh_core::config::Config;
use bh_core::document::Document;
use bh_core::dom::Dom;
use bh_core::markup::{pull_request_page, sample_page, CommentBuilder};
use bh_core::popup::{DirectCount, StatsView};
use bh_core::rules::{selectors, Pattern, RuleSet};
use bh_core::types::{Stats, Tier};
use clap::{Parser, Subcommand};
use ts_rs::TS;

mod fixture;

#[cfg(feature = "e2e")]
mod e2e;

use fixture::{replay, Fixture};

#[derive(Parser)]
#[command(name = "bh-cli")]
#[command(about = "Bot comment hider rule inspection and page replay tools")]
struct Cli {
    /// Log level filter (overrides RUST_LOG)
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in detection rules
    Rules {
        /// Only rules of this tier (0-6)
        #[arg(short, long)]
        tier: Option<u8>,
    },

    /// Classify one synthetic comment
    Classify {
        /// Displayed author name
        #[arg(short, long)]
        author: String,

        /// Author profile link
        #[arg(long)]
        href: Option<String>,

        /// Secondary label next to the author (repeatable)
        #[arg(short, long)]
        label: Vec<String>,

        /// Comment body text
        #[arg(short, long, default_value = "")]
        body: String,

        /// Render as an inline review comment
        #[arg(long)]
        review: bool,
    },

    /// Replay a page fixture and report what would be hidden
    Scan {
        /// Fixture JSON file
        #[arg(short, long)]
        input: String,

        /// Config JSON file
        #[arg(short, long)]
        config: Option<String>,

        /// Start with hiding switched off
        #[arg(long)]
        disabled: bool,

        /// Print every hidden comment
        #[arg(short, long)]
        verbose: bool,
    },

    /// Write the built-in sample page as a fixture
    Demo {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Export TypeScript declarations for the bridge types
    Types {
        /// Output directory
        #[arg(short, long, default_value = "bindings")]
        output: String,
    },

    /// Run the extension end to end in Chrome
    #[cfg(feature = "e2e")]
    E2e {
        /// chromedriver URL
        #[arg(long, default_value = "http://localhost:9515")]
        chromedriver: String,

        /// Unpacked extension directory
        #[arg(long)]
        extension: String,

        /// Extension id, when it cannot be discovered
        #[arg(long)]
        extension_id: Option<String>,

        /// Pull request page with at least one bot comment
        #[arg(long)]
        pr_url: String,

        #[arg(long)]
        headless: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(filter) = &cli.log {
        logger.parse_filters(filter);
    }
    logger.init();

    let result = match cli.command {
        Commands::Rules { tier } => cmd_rules(tier),
        Commands::Classify {
            author,
            href,
            label,
            body,
            review,
        } => cmd_classify(&author, href.as_deref(), &label, &body, review),
        Commands::Scan {
            input,
            config,
            disabled,
            verbose,
        } => cmd_scan(&input, config.as_deref(), disabled, verbose),
        Commands::Demo { output } => cmd_demo(output.as_deref()),
        Commands::Types { output } => cmd_types(&output),
        #[cfg(feature = "e2e")]
        Commands::E2e {
            chromedriver,
            extension,
            extension_id,
            pr_url,
            headless,
        } => e2e::run_e2e(e2e::E2eOptions {
            chromedriver_url: chromedriver,
            extension_path: extension,
            extension_id,
            pr_url,
            headless,
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn pattern_text(pattern: &Pattern) -> String {
    match pattern {
        Pattern::Regex(p) => format!("/{}/i", p),
        Pattern::Exact(p) => format!("== {:?}", p),
        Pattern::Contains(p) => format!("contains {:?}", p),
        Pattern::ContainsFolded(p) => format!("contains (folded) {:?}", p),
        Pattern::Normalized(p) => format!("normalized {:?}", p),
    }
}

fn cmd_rules(tier: Option<u8>) -> Result<(), String> {
    let filter = tier
        .map(|t| Tier::try_from(t).map_err(|_| format!("No tier {}, expected 0-6", t)))
        .transpose()?;

    let rules = RuleSet::builtin().rules();
    let mut shown = 0usize;
    for rule in rules.iter().filter(|r| filter.map_or(true, |t| r.tier == t)) {
        println!(
            "  {} {:<18} {:<36} {:<12} {}",
            rule.tier as u8,
            rule.tier.name(),
            rule.id,
            format!("{:?}", rule.field),
            pattern_text(&rule.pattern)
        );
        shown += 1;
    }
    println!("{} of {} rules", shown, rules.len());
    Ok(())
}

fn cmd_classify(author: &str, href: Option<&str>, labels: &[String], body: &str, review: bool) -> Result<(), String> {
    let mut comment = if review {
        CommentBuilder::review(author)
    } else {
        CommentBuilder::new(author)
    };
    comment = comment.body(body);
    if let Some(href) = href {
        comment = comment.href(href);
    }
    for label in labels {
        comment = comment.author_label(label);
    }

    // The first comment on a page is always exempt, so put a description first.
    let description = CommentBuilder::new("author").permalink(1).body("Description").build();
    let doc = Document::from_specs(&pull_request_page(vec![description, comment.build()]));
    let nodes = doc.query_selector_all(None, selectors::WATCH);
    let node = nodes.get(1).ok_or("Comment markup did not match any watched selector")?;

    let verdict = Classifier::new(RuleSet::builtin()).classify(&doc, node);
    if verdict.is_bot {
        println!("bot");
    } else {
        println!("human");
    }
    if let Some(tier) = verdict.tier {
        println!("  Tier:  {} ({})", tier as u8, tier.name());
    }
    if let Some(rule) = verdict.rule_id {
        println!("  Rule:  {}", rule);
    }
    Ok(())
}

fn cmd_scan(input: &str, config_path: Option<&str>, disabled: bool, verbose: bool) -> Result<(), String> {
    let config = match config_path {
        Some(path) => {
            let json = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
            Config::from_json(&json).map_err(|e| format!("Invalid config '{}': {}", path, e))?
        }
        None => Config::default(),
    };

    let fixture = Fixture::load(input)?;
    let report = replay(&fixture, &config, !disabled)?;

    if verbose {
        for comment in &report.comments {
            println!("  {:<8} {:<24} {:<18} {}", comment.key, comment.author, comment.tier, comment.rule);
        }
    }
    let json = serde_json::to_string_pretty(&report).map_err(|e| format!("Failed to encode report: {}", e))?;
    println!("{}", json);
    Ok(())
}

fn cmd_demo(output: Option<&str>) -> Result<(), String> {
    let json = serde_json::to_string_pretty(&sample_page()).map_err(|e| format!("Failed to encode page: {}", e))?;
    match output {
        Some(path) => {
            fs::write(path, json).map_err(|e| format!("Failed to write '{}': {}", path, e))?;
            println!("Wrote sample page to '{}'", path);
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn cmd_types(output: &str) -> Result<(), String> {
    let export = |result: Result<(), ts_rs::ExportError>| result.map_err(|e| format!("Failed to export bindings: {}", e));
    export(Request::export_all_to(output))?;
    export(Response::export_all_to(output))?;
    export(Stats::export_all_to(output))?;
    export(StatsView::export_all_to(output))?;
    export(DirectCount::export_all_to(output))?;
    println!("Exported TypeScript bindings to '{}'", output);
    Ok(())
}
