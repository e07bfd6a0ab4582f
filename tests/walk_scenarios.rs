//! End-to-end walks against in-memory pages.

use async_trait::async_trait;
use journal_swiper::fetch::{FetchError, Fetcher, MockFetcher};
use journal_swiper::mode::{Mode, ModeError, StepDecl};
use journal_swiper::models::Field;
use journal_swiper::walker::{BranchState, CancelToken, WalkError, WalkOptions, Walker};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const ROOT: &str = "http://journal.test/toc";

const TOC: &str = r#"<html><body>
  <h1>Journal of Testing</h1>
  <ul>
    <li><a class="issue-link" href="/issue/1">Issue 1</a></li>
    <li><a class="issue-link" href="/issue/2">Issue 2</a></li>
  </ul>
</body></html>"#;

fn article_page(title: &str, pdf: &str) -> String {
    format!(
        r#"<html><body><h1>{}</h1><a class="pdf" href="{}">PDF</a></body></html>"#,
        title, pdf
    )
}

/// Two steps: issue links on the TOC, title and PDF on each issue page
fn two_step_mode() -> Arc<Mode> {
    Arc::new(
        Mode::new(
            "Scenario",
            2,
            vec![
                StepDecl::html(0).link("a.issue-link@href").unwrap(),
                StepDecl::html(1)
                    .field(Field::Title, "h1")
                    .unwrap()
                    .field(Field::Pdf, "a.pdf@href")
                    .unwrap(),
            ],
        )
        .unwrap(),
    )
}

fn issue_pages() -> MockFetcher {
    MockFetcher::new()
        .with_page(
            "http://journal.test/issue/1",
            article_page("First Article", "/pdf/1.pdf"),
        )
        .with_page(
            "http://journal.test/issue/2",
            article_page("Second Article", "/pdf/2.pdf"),
        )
}

fn walker(fetcher: Arc<dyn Fetcher>, options: WalkOptions) -> Walker {
    Walker::new(fetcher, options)
}

#[tokio::test]
async fn test_two_issue_links_yield_two_articles() {
    let fetcher = Arc::new(issue_pages());
    let report = walker(fetcher.clone(), WalkOptions::default())
        .run_document(two_step_mode(), ROOT, TOC)
        .await;

    assert_eq!(report.articles.len(), 2);
    let titles: Vec<_> = report
        .articles
        .iter()
        .map(|a| a.title.as_deref().unwrap())
        .collect();
    assert_eq!(titles, vec!["First Article", "Second Article"]);
    assert_eq!(
        report.articles[1].pdf_link.as_deref(),
        Some("http://journal.test/pdf/2.pdf")
    );
    assert_eq!(
        report.articles[0].source_link.as_deref(),
        Some("http://journal.test/issue/1")
    );

    assert!(report.summary.is_clean());
    assert_eq!(report.summary.branches, 3);
    assert!(report.tree.depth() <= 2);
    assert_eq!(
        report.tree.get(&[]).unwrap().state,
        BranchState::Expanded { children: 2 }
    );
    assert!(report.tree.iter().all(|node| !matches!(
        node.state,
        BranchState::Pending | BranchState::Fetched | BranchState::FieldsResolved
    )));
    // The root body was supplied, so only the issue pages were fetched
    assert_eq!(fetcher.fetched().len(), 2);
}

#[tokio::test]
async fn test_failed_fetch_is_isolated() {
    let fetcher = Arc::new(MockFetcher::new().with_page(
        "http://journal.test/issue/1",
        article_page("First Article", "/pdf/1.pdf"),
    ));
    fetcher.add_failure(
        "http://journal.test/issue/2",
        FetchError::Status { status: 503 },
    );

    let report = walker(fetcher, WalkOptions::default())
        .run_document(two_step_mode(), ROOT, TOC)
        .await;

    assert_eq!(report.articles.len(), 1);
    assert_eq!(report.articles[0].title.as_deref(), Some("First Article"));

    assert_eq!(report.summary.failed.len(), 1);
    let failure = &report.summary.failed[0];
    assert_eq!(failure.link, "http://journal.test/issue/2");
    assert_eq!(failure.step_index, 1);
    assert_eq!(
        failure.error,
        WalkError::FetchFailed {
            link: "http://journal.test/issue/2".to_string(),
            source: FetchError::Status { status: 503 },
        }
    );
    assert!(matches!(
        report.tree.get(&[1]).unwrap().state,
        BranchState::Failed(WalkError::FetchFailed { .. })
    ));
}

#[test]
fn test_missing_link_fails_before_walking() {
    let result = Mode::new(
        "Broken",
        2,
        vec![
            StepDecl::html(0),
            StepDecl::html(1).field(Field::Title, "h1").unwrap(),
        ],
    );
    assert_eq!(result, Err(ModeError::MissingLink { step: 0 }));
}

#[tokio::test]
async fn test_insubstantial_leaf_is_dropped() {
    let toc = r#"<a class="issue-link" href="/issue/1">1</a>
        <a class="issue-link" href="/advert">Buy now</a>
        <a class="issue-link" href="/issue/2">2</a>"#;
    let fetcher = issue_pages().with_page(
        "http://journal.test/advert",
        "<html><body><p>Subscribe today</p></body></html>",
    );

    let report = walker(Arc::new(fetcher), WalkOptions::default())
        .run_document(two_step_mode(), ROOT, toc)
        .await;

    assert_eq!(report.articles.len(), 2);
    assert_eq!(report.tree.finalized().count(), 3);
    assert_eq!(report.summary.dropped_records, 1);
    assert!(report
        .articles
        .iter()
        .all(|a| a.source_link.as_deref() != Some("http://journal.test/advert")));
}

#[tokio::test]
async fn test_root_is_fetched_when_not_supplied() {
    let fetcher = Arc::new(issue_pages().with_page(ROOT, TOC));
    let report = walker(fetcher.clone(), WalkOptions::default())
        .run(two_step_mode(), ROOT)
        .await;

    assert_eq!(report.articles.len(), 2);
    assert_eq!(fetcher.fetched()[0], ROOT);
    assert_eq!(report.summary.root_link, ROOT);
}

#[tokio::test]
async fn test_empty_expansion_is_recorded() {
    let fetcher = Arc::new(issue_pages());
    let report = walker(fetcher.clone(), WalkOptions::default())
        .run_document(two_step_mode(), ROOT, "<html><body>No issues yet</body></html>")
        .await;

    assert!(report.articles.is_empty());
    assert!(report.summary.failed.is_empty());
    assert_eq!(report.summary.empty_expansions.len(), 1);
    assert_eq!(
        report.summary.empty_expansions[0].error,
        WalkError::EmptyExpansion {
            link: ROOT.to_string(),
            step_index: 0
        }
    );
    assert!(fetcher.fetched().is_empty());
}

#[tokio::test]
async fn test_parse_failure_is_recorded() {
    let fetcher = issue_pages();
    fetcher.add_page("http://journal.test/issue/2", "");

    let report = walker(Arc::new(fetcher), WalkOptions::default())
        .run_document(two_step_mode(), ROOT, TOC)
        .await;

    assert_eq!(report.articles.len(), 1);
    assert!(matches!(
        report.summary.failed[0].error,
        WalkError::ParseFailed { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_order_survives_out_of_order_completion() {
    let toc = r#"<a class="issue-link" href="/issue/1">1</a>
        <a class="issue-link" href="/issue/2">2</a>
        <a class="issue-link" href="/issue/3">3</a>"#;
    let fetcher = issue_pages()
        .with_page(
            "http://journal.test/issue/3",
            article_page("Third Article", "/pdf/3.pdf"),
        )
        .with_latency_for("http://journal.test/issue/1", Duration::from_millis(300))
        .with_latency_for("http://journal.test/issue/2", Duration::from_millis(200))
        .with_latency_for("http://journal.test/issue/3", Duration::from_millis(100));

    let report = walker(Arc::new(fetcher), WalkOptions::default().workers(3))
        .run_document(two_step_mode(), ROOT, toc)
        .await;

    let titles: Vec<_> = report
        .articles
        .iter()
        .map(|a| a.title.clone().unwrap_or_default())
        .collect();
    assert_eq!(
        titles,
        vec!["First Article", "Second Article", "Third Article"]
    );
}

#[tokio::test]
async fn test_cancelled_walk_fetches_nothing() {
    let fetcher = Arc::new(issue_pages().with_page(ROOT, TOC));
    let cancel = CancelToken::new();
    cancel.cancel();

    let report = walker(fetcher.clone(), WalkOptions::default())
        .run_with_cancel(two_step_mode(), ROOT, cancel)
        .await;

    assert!(report.articles.is_empty());
    assert!(fetcher.fetched().is_empty());
    assert!(report.summary.cancelled);
    assert_eq!(report.summary.skipped, 1);
    assert_eq!(report.tree.get(&[]).unwrap().state, BranchState::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_time_budget_cancels_remaining_branches() {
    let toc = r#"<a class="issue-link" href="/issue/1">1</a>
        <a class="issue-link" href="/issue/2">2</a>
        <a class="issue-link" href="/issue/3">3</a>"#;
    let fetcher = Arc::new(
        issue_pages()
            .with_page(
                "http://journal.test/issue/3",
                article_page("Third Article", "/pdf/3.pdf"),
            )
            .with_latency(Duration::from_millis(100)),
    );

    let options = WalkOptions::default()
        .workers(1)
        .time_budget(Duration::from_millis(150));
    let report = walker(fetcher.clone(), options)
        .run_document(two_step_mode(), ROOT, toc)
        .await;

    // Issue 1 finishes in budget, issue 2 is in flight when it runs out and
    // issue 3 is never fetched
    assert_eq!(report.articles.len(), 1);
    assert_eq!(report.articles[0].title.as_deref(), Some("First Article"));
    assert!(report.summary.cancelled);
    assert!(report.summary.budget_exhausted);
    assert_eq!(report.summary.discarded, 1);
    assert_eq!(report.summary.skipped, 1);
    assert_eq!(
        fetcher.fetched(),
        vec!["http://journal.test/issue/1", "http://journal.test/issue/2"]
    );
}

/// Fetcher that tracks how many requests run at once
#[derive(Debug, Default)]
struct CountingFetcher {
    inner: MockFetcher,
    current: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl Fetcher for CountingFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let result = self.inner.fetch(url, timeout).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[tokio::test(start_paused = true)]
async fn test_workers_bound_concurrent_fetches() {
    let toc: String = (1..=6)
        .map(|i| format!(r#"<a class="issue-link" href="/issue/{i}">{i}</a>"#))
        .collect();
    let inner = MockFetcher::new();
    for i in 1..=6 {
        inner.add_page(
            format!("http://journal.test/issue/{i}"),
            article_page(&format!("Article {i}"), &format!("/pdf/{i}.pdf")),
        );
    }
    let fetcher = Arc::new(CountingFetcher {
        inner,
        ..Default::default()
    });

    let report = walker(fetcher.clone(), WalkOptions::default().workers(2))
        .run_document(two_step_mode(), ROOT, toc)
        .await;

    assert_eq!(report.articles.len(), 6);
    assert_eq!(fetcher.peak.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_three_steps_inherit_fields() {
    let mode = Arc::new(
        Mode::new(
            "Deep",
            3,
            vec![
                StepDecl::html(0)
                    .link("a.issue-link@href")
                    .unwrap()
                    .field(Field::Journal, "h1")
                    .unwrap(),
                StepDecl::html(1)
                    .link("div.toc a.article@href")
                    .unwrap()
                    .field(Field::Volume, "span.volume")
                    .unwrap()
                    .article_link(),
                StepDecl::html(2)
                    .field(Field::Title, "h1")
                    .unwrap()
                    .field(Field::Authors, "span.author")
                    .unwrap()
                    .field(Field::Pdf, "a.pdf@href")
                    .unwrap()
                    // Already located at step 0
                    .field(Field::Journal, "span.journal")
                    .unwrap(),
            ],
        )
        .unwrap(),
    );

    let issue = r#"<span class="volume">12</span>
        <div class="toc">
          <a class="article" href="articles/a">A</a>
          <a class="article" href="articles/b">B</a>
        </div>"#;
    let article = |title: &str| {
        format!(
            r#"<h1>{title}</h1><span class="journal">Wrong</span>
               <span class="author">Ada</span><span class="author">Grace</span>
               <a class="pdf" href="{title}.pdf">PDF</a>"#
        )
    };
    let fetcher = MockFetcher::new()
        .with_page("http://journal.test/issue/1", issue)
        .with_page("http://journal.test/issue/2", "<p>empty issue</p>")
        .with_page("http://journal.test/issue/articles/a", article("Alpha"))
        .with_page("http://journal.test/issue/articles/b", article("Beta"));

    let report = walker(Arc::new(fetcher), WalkOptions::default())
        .run_document(mode, ROOT, TOC)
        .await;

    assert_eq!(report.articles.len(), 2);
    let alpha = &report.articles[0];
    assert_eq!(alpha.title.as_deref(), Some("Alpha"));
    assert_eq!(alpha.authors, vec!["Ada", "Grace"]);
    assert_eq!(alpha.citation.journal.as_deref(), Some("Journal of Testing"));
    assert_eq!(alpha.citation.volume.as_deref(), Some("12"));
    assert_eq!(
        alpha.article_page_link.as_deref(),
        Some("http://journal.test/issue/articles/a")
    );
    assert_eq!(
        alpha.pdf_link.as_deref(),
        Some("http://journal.test/issue/articles/Alpha.pdf")
    );

    assert_eq!(report.tree.depth(), 3);
    assert!(report.tree.iter().all(|node| node.path.len() < 3));
    assert_eq!(report.summary.empty_expansions.len(), 1);
}

#[tokio::test]
async fn test_nested_link_containers_fetch_each_page_once() {
    let fetcher = Arc::new(issue_pages());
    let mode = Arc::new(
        Mode::new(
            "Nested",
            2,
            vec![
                StepDecl::html(0).link("div.issue a@href").unwrap(),
                StepDecl::html(1).field(Field::Title, "h1").unwrap(),
            ],
        )
        .unwrap(),
    );
    let toc = r#"<div class="issue">
          <div class="issue"><a href="/issue/1">Issue 1</a></div>
          <a href="/issue/2">Issue 2</a>
        </div>"#;

    let report = walker(fetcher.clone(), WalkOptions::default())
        .run_document(mode, ROOT, toc)
        .await;

    assert_eq!(report.articles.len(), 2);
    assert_eq!(fetcher.fetch_count("http://journal.test/issue/1"), 1);
    assert_eq!(
        fetcher.fetched().len(),
        2,
        "fetched: {:?}",
        fetcher.fetched()
    );
}

#[tokio::test]
async fn test_xml_issue_feed_step() {
    let mode = Arc::new(
        Mode::new(
            "Feed",
            3,
            vec![
                StepDecl::html(0).link("a.issue-link@href").unwrap(),
                StepDecl::xml(1)
                    .link("item link@href")
                    .unwrap()
                    .field(Field::Volume, "issue volume")
                    .unwrap()
                    .article_link(),
                StepDecl::html(2)
                    .field(Field::Title, "h1")
                    .unwrap()
                    .field(Field::Pdf, "a.pdf@href")
                    .unwrap(),
            ],
        )
        .unwrap(),
    );
    let feed = r#"<?xml version="1.0" encoding="UTF-8"?>
<issue>
  <volume>7</volume>
  <item><title>ignored</title><link href="art/1"/></item>
  <item><link href="/issue/1/art/2"/></item>
</issue>"#;
    let fetcher = MockFetcher::new()
        .with_page("http://journal.test/issue/1", feed)
        .with_page("http://journal.test/issue/2", "<issue><volume>8</volume></issue>")
        .with_page(
            "http://journal.test/issue/art/1",
            article_page("Feed One", "one.pdf"),
        )
        .with_page(
            "http://journal.test/issue/1/art/2",
            article_page("Feed Two", "two.pdf"),
        );

    let report = walker(Arc::new(fetcher), WalkOptions::default())
        .run_document(mode, ROOT, TOC)
        .await;

    let titles: Vec<_> = report
        .articles
        .iter()
        .map(|a| a.title.as_deref().unwrap())
        .collect();
    assert_eq!(titles, vec!["Feed One", "Feed Two"]);
    assert!(report
        .articles
        .iter()
        .all(|a| a.citation.volume.as_deref() == Some("7")));
    assert_eq!(
        report.articles[0].article_page_link.as_deref(),
        Some("http://journal.test/issue/art/1")
    );
    assert_eq!(
        report.articles[1].pdf_link.as_deref(),
        Some("http://journal.test/issue/1/art/two.pdf")
    );
    // The second feed has no items to follow
    assert_eq!(report.summary.empty_expansions.len(), 1);
}

#[tokio::test]
async fn test_malformed_xml_page_fails_its_branch() {
    let mode = Arc::new(
        Mode::new(
            "Feed",
            2,
            vec![
                StepDecl::html(0).link("a.issue-link@href").unwrap(),
                StepDecl::xml(1).field(Field::Title, "item title").unwrap(),
            ],
        )
        .unwrap(),
    );
    let fetcher = MockFetcher::new()
        .with_page(
            "http://journal.test/issue/1",
            "<item><title>Well formed</title></item>",
        )
        .with_page("http://journal.test/issue/2", "<item><title>Broken</item>");

    let report = walker(Arc::new(fetcher), WalkOptions::default())
        .run_document(mode, ROOT, TOC)
        .await;

    assert_eq!(report.articles.len(), 1);
    assert_eq!(report.articles[0].title.as_deref(), Some("Well formed"));
    assert_eq!(report.summary.failed.len(), 1);
    assert!(matches!(
        report.summary.failed[0].error,
        WalkError::ParseFailed { .. }
    ));
}
