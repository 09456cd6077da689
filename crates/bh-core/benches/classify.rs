//! Classification benchmarks
//!
//! Synthetic pull-request pages with a fixed bot/human mix, scanned from
//! scratch and classified comment by comment.

use bh_core::classifier::Classifier;
use bh_core::config::Config;
use bh_core::document::{Document, ElementSpec};
use bh_core::dom::Dom;
use bh_core::markup::{pull_request_page, CommentBuilder};
use bh_core::rules::{selectors, RuleSet};
use bh_core::session::Session;
use bh_core::visibility::MemoryStore;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

/// Every fourth comment is a bot, cycling through the identity signals.
fn synthetic_page(comments: usize) -> Vec<ElementSpec> {
    let items = (0..comments)
        .map(|i| match i % 8 {
            1 => CommentBuilder::new("renovate[bot]").href("/apps/renovate").body("Update dependency").build(),
            3 => CommentBuilder::new("ci-helper").author_label("bot").body("Build passed").build(),
            5 => CommentBuilder::new("netlify").body("Deploy preview ready").build(),
            7 => CommentBuilder::new("sonarcloud").body("Quality Gate passed").build(),
            _ if i == 0 => CommentBuilder::new("author").permalink(1).body("Description").build(),
            _ => CommentBuilder::new(&format!("user{i}")).body("Looks reasonable to me.").build(),
        })
        .collect();
    pull_request_page(items)
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    let classifier = Classifier::new(RuleSet::builtin());

    for size in [50usize, 500] {
        let doc = Document::from_specs(&synthetic_page(size));
        let comments = doc.query_selector_all(None, selectors::WATCH);
        group.throughput(Throughput::Elements(comments.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &comments, |b, comments| {
            b.iter(|| comments.iter().filter(|c| classifier.is_bot(&doc, black_box(c))).count());
        });
    }
    group.finish();
}

fn bench_session_start(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_start");
    let config = Config::default();

    for size in [50usize, 500] {
        let specs = synthetic_page(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &specs, |b, specs| {
            b.iter(|| {
                let session = Session::start(Document::from_specs(specs), MemoryStore::new(), &config, true, 0);
                black_box(session.hidden_count())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_classify, bench_session_start);
criterion_main!(benches);
