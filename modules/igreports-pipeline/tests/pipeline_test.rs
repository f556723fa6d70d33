// End-to-end pipeline tests against an in-memory store and mocked
// collaborators. Each test drives the real stage functions; nothing
// here touches the network.

use std::sync::Arc;

use chrono::{Duration, Utc};

use igreports_common::{Config, ReportState, TokenUsage};
use igreports_store::ReportStore;

use igreports_pipeline::run::{run, PipelineOptions, RunContext};
use igreports_pipeline::scheduler::run_publish;
use igreports_pipeline::stats::RunStats;
use igreports_pipeline::testing::{
    facts, newsworthy_verdict, routine_verdict, test_config, test_usage, MockClassifier,
    MockPublisher, MockSource, MockSummarizer,
};
use igreports_pipeline::traits::{ClassifyOutcome, PublishOutcome, SummarizeOutcome};

struct Harness {
    ctx: RunContext,
    classifier: Arc<MockClassifier>,
    summarizer: Arc<MockSummarizer>,
    publisher: Arc<MockPublisher>,
}

async fn harness(
    config: Config,
    source: MockSource,
    classifier: MockClassifier,
    summarizer: MockSummarizer,
    publisher: MockPublisher,
) -> Harness {
    let store = ReportStore::in_memory().await.unwrap();
    let classifier = Arc::new(classifier);
    let summarizer = Arc::new(summarizer);
    let publisher = Arc::new(publisher);
    let ctx = RunContext::new(
        config,
        store,
        Arc::new(source),
        classifier.clone(),
        summarizer.clone(),
        publisher.clone(),
        false,
    );
    Harness {
        ctx,
        classifier,
        summarizer,
        publisher,
    }
}

fn opts() -> PipelineOptions {
    PipelineOptions::default()
}

#[tokio::test]
async fn newsworthy_report_flows_to_a_bounded_published_post() {
    let long_summary: String = "HHS OIG found $50 million in fraudulent Medicare billing. "
        .repeat(6)
        .chars()
        .take(310)
        .collect();
    assert_eq!(long_summary.chars().count(), 310);

    let h = harness(
        test_config(),
        MockSource::new(vec![facts("hhs-001", "Investigation of Medicare Fraud Scheme")]),
        MockClassifier::new().on(
            "hhs-001",
            vec![ClassifyOutcome::Classified {
                verdict: newsworthy_verdict(9),
                usage: test_usage(),
            }],
        ),
        MockSummarizer::new().with_text(&long_summary),
        MockPublisher::new(),
    )
    .await;

    let stats = run(&h.ctx, &opts()).await;
    assert_eq!(stats.ingested_new, 1);
    assert_eq!(stats.keyword_passed, 1);
    assert_eq!(stats.classified_newsworthy, 1);
    assert_eq!(stats.summarized, 1);
    assert_eq!(stats.scheduled, 1);
    assert_eq!(stats.failures(), 0);

    // The slot lies in the future, so nothing was dispatched yet.
    assert_eq!(h.publisher.call_count(), 0);

    let mut later = RunStats::default();
    run_publish(&h.ctx, Utc::now() + Duration::days(2), &mut later)
        .await
        .unwrap();
    assert_eq!(later.published, 1);

    let report = h.ctx.store.find("hhs-001").await.unwrap().unwrap();
    assert_eq!(report.state, ReportState::Published);
    assert!(report.published_at.is_some());
    assert!(report.publish_reference.is_some());

    let posts = h.publisher.published_texts();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].chars().count() <= 300);
    assert!(posts[0].contains("https://www.oversight.gov/report/hhs-001"));
    assert!(posts[0].contains('…'));
}

#[tokio::test]
async fn routine_report_never_reaches_the_classifier() {
    let h = harness(
        test_config(),
        MockSource::new(vec![facts("gsa-002", "Semiannual Report to Congress")]),
        MockClassifier::new(),
        MockSummarizer::new(),
        MockPublisher::new(),
    )
    .await;

    let stats = run(&h.ctx, &opts()).await;
    assert_eq!(stats.keyword_rejected, 1);
    assert_eq!(stats.keyword_passed, 0);
    assert_eq!(h.classifier.call_count(), 0);

    let report = h.ctx.store.find("gsa-002").await.unwrap().unwrap();
    assert_eq!(report.state, ReportState::KeywordRejected);
    assert!(report.state.is_terminal());
}

#[tokio::test]
async fn not_newsworthy_verdict_is_terminal() {
    let h = harness(
        test_config(),
        MockSource::new(vec![facts("ed-003", "Audit finds improper payments")]),
        MockClassifier::new().on(
            "ed-003",
            vec![ClassifyOutcome::Classified {
                verdict: routine_verdict(),
                usage: test_usage(),
            }],
        ),
        MockSummarizer::new(),
        MockPublisher::new(),
    )
    .await;

    let stats = run(&h.ctx, &opts()).await;
    assert_eq!(stats.classified_not_newsworthy, 1);
    assert_eq!(h.summarizer.call_count(), 0);

    let report = h.ctx.store.find("ed-003").await.unwrap().unwrap();
    assert_eq!(report.state, ReportState::ClassifiedNotNewsworthy);
}

#[tokio::test]
async fn malformed_classifier_output_retries_and_lands_in_the_ledger() {
    let malformed = ClassifyOutcome::Malformed {
        detail: "missing required field: score".to_string(),
        usage: TokenUsage {
            prompt_tokens: 100,
            completion_tokens: 10,
        },
    };
    let h = harness(
        test_config(),
        MockSource::new(vec![facts("dod-004", "Investigation of contract fraud")]),
        MockClassifier::new().on(
            "dod-004",
            vec![
                malformed.clone(),
                malformed,
                ClassifyOutcome::Classified {
                    verdict: newsworthy_verdict(7),
                    usage: test_usage(),
                },
            ],
        ),
        MockSummarizer::new(),
        MockPublisher::new(),
    )
    .await;

    let mut options = opts();
    options.skip_summarize = true;
    options.skip_publish = true;
    let stats = run(&h.ctx, &options).await;

    assert_eq!(stats.classified_newsworthy, 1);
    assert_eq!(stats.classify_exhausted, 0);
    assert_eq!(h.classifier.call_count(), 3);

    // All three attempts are in the ledger, the failed ones included.
    let calls = h
        .ctx
        .store
        .usage_call_count(&h.ctx.run_id, "classifier")
        .await
        .unwrap();
    assert_eq!(calls, 3);
    assert_eq!(h.ctx.store.run_cost_cents(&h.ctx.run_id).await.unwrap(), 3);
}

#[tokio::test]
async fn exhausted_retries_leave_the_report_for_the_next_run() {
    let transient = ClassifyOutcome::Transient {
        detail: "connection reset".to_string(),
    };
    let h = harness(
        test_config(),
        MockSource::new(vec![facts("va-005", "Whistleblower complaint substantiated")]),
        MockClassifier::new()
            .with_default(transient.clone())
            .on("va-005", vec![transient.clone(), transient.clone(), transient]),
        MockSummarizer::new(),
        MockPublisher::new(),
    )
    .await;

    let mut options = opts();
    options.skip_summarize = true;
    options.skip_publish = true;
    let stats = run(&h.ctx, &options).await;

    assert_eq!(stats.classify_exhausted, 1);
    assert!(stats.failures() > 0);

    let report = h.ctx.store.find("va-005").await.unwrap().unwrap();
    assert_eq!(report.state, ReportState::KeywordPassed);
}

#[tokio::test]
async fn dead_source_is_retried_then_fails_the_run() {
    let store = ReportStore::in_memory().await.unwrap();
    let source = Arc::new(MockSource::failing("connection refused"));
    let ctx = RunContext::new(
        test_config(),
        store,
        source.clone(),
        Arc::new(MockClassifier::new()),
        Arc::new(MockSummarizer::new()),
        Arc::new(MockPublisher::new()),
        false,
    );

    let stats = run(&ctx, &opts()).await;

    // Bounded backoff on the fetch, then the stage error makes the run fail.
    assert_eq!(source.call_count(), 3);
    assert_eq!(stats.fetched, 0);
    assert_eq!(stats.stage_errors, 1);
    assert!(stats.failures() > 0);
}

#[tokio::test]
async fn ingestion_is_idempotent_across_runs() {
    let batch = vec![facts("hud-006", "Fraud in housing grants")];
    let store = ReportStore::in_memory().await.unwrap();

    let classifier = Arc::new(MockClassifier::new().with_default(ClassifyOutcome::Classified {
        verdict: newsworthy_verdict(8),
        usage: test_usage(),
    }));
    let ctx = RunContext::new(
        test_config(),
        store.clone(),
        Arc::new(MockSource::new(batch.clone())),
        classifier,
        Arc::new(MockSummarizer::new()),
        Arc::new(MockPublisher::new()),
        false,
    );

    let first = run(&ctx, &opts()).await;
    assert_eq!(first.ingested_new, 1);

    // Same feed again: known, and the report's pipeline position is kept.
    let ctx2 = RunContext::new(
        test_config(),
        store.clone(),
        Arc::new(MockSource::new(batch)),
        Arc::new(MockClassifier::new()),
        Arc::new(MockSummarizer::new()),
        Arc::new(MockPublisher::new()),
        false,
    );
    let second = run(&ctx2, &opts()).await;
    assert_eq!(second.ingested_new, 0);
    assert_eq!(second.ingested_known, 1);

    let report = store.find("hud-006").await.unwrap().unwrap();
    assert_eq!(report.state, ReportState::Summarized);
}

#[tokio::test]
async fn failed_publish_is_retried_on_a_later_run_with_one_reference() {
    let h = harness(
        test_config(),
        MockSource::new(vec![facts("ssa-007", "Embezzlement by field office staff")]),
        MockClassifier::new().with_default(ClassifyOutcome::Classified {
            verdict: newsworthy_verdict(8),
            usage: test_usage(),
        }),
        MockSummarizer::new(),
        MockPublisher::new().then_fail("502 from the PDS"),
    )
    .await;

    let stats = run(&h.ctx, &opts()).await;
    assert_eq!(stats.summarized, 1);
    assert_eq!(stats.scheduled, 1);

    // Force dispatch: first attempt fails.
    let mut attempt1 = RunStats::default();
    run_publish(&h.ctx, Utc::now() + Duration::days(2), &mut attempt1)
        .await
        .unwrap();
    assert_eq!(attempt1.publish_failed, 1);

    let report = h.ctx.store.find("ssa-007").await.unwrap().unwrap();
    assert_eq!(report.state, ReportState::PublishFailed);
    assert_eq!(report.publish_attempts, 1);
    assert!(report.publish_reference.is_none());

    // Next run: the retry path picks it up and succeeds.
    let mut attempt2 = RunStats::default();
    run_publish(&h.ctx, Utc::now() + Duration::days(2), &mut attempt2)
        .await
        .unwrap();
    assert_eq!(attempt2.published, 1);

    let report = h.ctx.store.find("ssa-007").await.unwrap().unwrap();
    assert_eq!(report.state, ReportState::Published);
    assert_eq!(report.publish_attempts, 2);
    assert!(report.publish_reference.is_some());
    assert_eq!(h.publisher.published_texts().len(), 1);
}

#[tokio::test]
async fn budget_ceiling_halts_classification_mid_batch() {
    let mut config = test_config();
    config.daily_budget_cents = 2;

    let h = harness(
        config,
        MockSource::new(vec![
            facts("a-1", "Fraud finding one"),
            facts("a-2", "Fraud finding two"),
            facts("a-3", "Fraud finding three"),
        ]),
        MockClassifier::new().with_default(ClassifyOutcome::Classified {
            verdict: routine_verdict(),
            usage: test_usage(),
        }),
        MockSummarizer::new(),
        MockPublisher::new(),
    )
    .await;

    let stats = run(&h.ctx, &opts()).await;
    assert!(stats.budget_stopped);
    assert_eq!(h.classifier.call_count(), 2);
    assert_eq!(stats.spent_cents, 2);

    // The unclassified report is untouched, ready for the next run.
    let report = h.ctx.store.find("a-3").await.unwrap().unwrap();
    assert_eq!(report.state, ReportState::KeywordPassed);
}

#[tokio::test]
async fn dry_run_writes_nothing_and_publishes_nothing() {
    let store = ReportStore::in_memory().await.unwrap();
    let publisher = Arc::new(MockPublisher::new());
    let ctx = RunContext::new(
        test_config(),
        store.clone(),
        Arc::new(MockSource::new(vec![facts("epa-008", "Criminal referral issued")])),
        Arc::new(MockClassifier::new()),
        Arc::new(MockSummarizer::new()),
        publisher.clone(),
        true,
    );

    let stats = run(&ctx, &opts()).await;
    assert_eq!(stats.ingested_new, 1);
    assert!(store.find("epa-008").await.unwrap().is_none());
    assert_eq!(publisher.call_count(), 0);
    assert_eq!(store.total_cost_cents().await.unwrap(), 0);
}

#[tokio::test]
async fn empty_summary_falls_back_to_stored_facts() {
    let h = harness(
        test_config(),
        MockSource::new(vec![facts("doj-009", "Bribery investigation closed")]),
        MockClassifier::new().with_default(ClassifyOutcome::Classified {
            verdict: newsworthy_verdict(6),
            usage: test_usage(),
        }),
        MockSummarizer::new().on(
            "doj-009",
            vec![SummarizeOutcome::Summary {
                text: "   ".to_string(),
                usage: test_usage(),
            }],
        ),
        MockPublisher::new(),
    )
    .await;

    let mut options = opts();
    options.skip_publish = true;
    let stats = run(&h.ctx, &options).await;
    assert_eq!(stats.summarized, 1);

    let report = h.ctx.store.find("doj-009").await.unwrap().unwrap();
    let summary = report.summary_text.unwrap();
    assert!(summary.contains("Bribery investigation closed"));
    assert!(summary.contains("https://www.oversight.gov/report/doj-009"));
}

#[tokio::test]
async fn scheduled_slots_are_spread_not_re_rolled() {
    let h = harness(
        test_config(),
        MockSource::new(vec![
            facts("b-1", "Fraud one"),
            facts("b-2", "Fraud two"),
            facts("b-3", "Fraud three"),
        ]),
        MockClassifier::new().with_default(ClassifyOutcome::Classified {
            verdict: newsworthy_verdict(8),
            usage: test_usage(),
        }),
        MockSummarizer::new(),
        MockPublisher::new(),
    )
    .await;

    let mut options = opts();
    let stats = run(&h.ctx, &options).await;
    assert_eq!(stats.scheduled, 3);

    let mut slots: Vec<_> = Vec::new();
    for id in ["b-1", "b-2", "b-3"] {
        let report = h.ctx.store.find(id).await.unwrap().unwrap();
        slots.push((id, report.scheduled_at.unwrap()));
    }
    // Three distinct slot times.
    let mut times: Vec<_> = slots.iter().map(|(_, t)| *t).collect();
    times.sort();
    times.dedup();
    assert_eq!(times.len(), 3);

    // A second pass keeps the assignments.
    options.skip_ingest = true;
    options.skip_prefilter = true;
    options.skip_classify = true;
    options.skip_summarize = true;
    let again = run(&h.ctx, &options).await;
    assert_eq!(again.scheduled, 0);
    for (id, slot) in &slots {
        let report = h.ctx.store.find(id).await.unwrap().unwrap();
        assert_eq!(report.scheduled_at.unwrap(), *slot);
    }
}

#[tokio::test]
async fn publish_retry_budget_is_exhausted_after_three_attempts() {
    let h = harness(
        test_config(),
        MockSource::new(vec![facts("irs-010", "Theft of taxpayer remittances")]),
        MockClassifier::new().with_default(ClassifyOutcome::Classified {
            verdict: newsworthy_verdict(9),
            usage: test_usage(),
        }),
        MockSummarizer::new(),
        MockPublisher::new()
            .then_fail("outage")
            .then_fail("outage")
            .then_fail("outage")
            .then(PublishOutcome::Published {
                reference: "at://never".to_string(),
            }),
    )
    .await;

    run(&h.ctx, &opts()).await;
    let dispatch_at = Utc::now() + Duration::days(2);
    for _ in 0..4 {
        let mut stats = RunStats::default();
        run_publish(&h.ctx, dispatch_at, &mut stats).await.unwrap();
    }

    // Three attempts consumed the budget; the fourth pass found nothing.
    assert_eq!(h.publisher.call_count(), 3);
    let report = h.ctx.store.find("irs-010").await.unwrap().unwrap();
    assert_eq!(report.state, ReportState::PublishFailed);
    assert_eq!(report.publish_attempts, 3);
}
