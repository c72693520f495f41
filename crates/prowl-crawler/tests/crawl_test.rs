mod common;

use common::{config_for, MockDriver, MockPage, MockSessions};
use prowl_core::{AppConfig, CrawlStatus, Domain};
use prowl_crawler::{CrawlEngine, DomainReport};
use prowl_rules::Rulebook;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const ENTRY: &str = "https://www.shop.example/";

fn engine(config: AppConfig, driver: &MockDriver) -> CrawlEngine {
    CrawlEngine::new(config, Arc::new(Rulebook::builtin().unwrap())).with_sessions(Arc::new(
        MockSessions {
            driver: driver.clone(),
        },
    ))
}

async fn crawl(config: AppConfig, driver: &MockDriver) -> (DomainReport, Vec<String>) {
    let engine = engine(config, driver);
    let mut reports = engine.run(&CancellationToken::new()).await;
    assert_eq!(reports.len(), 1);
    let report = reports.remove(0);
    let urls = engine.store().urls(&report.domain);
    (report, urls)
}

fn shop_site() -> MockDriver {
    MockDriver::new()
        .page(
            ENTRY,
            MockPage::new("<nav>Kitchen</nav>").links(&[
                "https://www.shop.example/c/kettles",
                "https://www.shop.example/about-us",
                "https://www.shop.example/p/kettle-1",
                "https://other.example/p/elsewhere",
                "mailto:help@shop.example",
            ]),
        )
        .page(
            "https://www.shop.example/c/kettles",
            MockPage::new("<h1>Kettles</h1>").links(&[
                "https://www.shop.example/",
                "https://www.shop.example/p/kettle-2#reviews",
                "https://www.shop.example/c/toasters",
            ]),
        )
        .page(
            "https://www.shop.example/c/toasters",
            MockPage::new("<h1>Toasters</h1>"),
        )
        .page(
            "https://www.shop.example/p/kettle-1",
            MockPage::new("<button>Add to Cart</button>")
                .links(&["https://www.shop.example/p/kettle-1-related"]),
        )
        .page(
            "https://www.shop.example/p/kettle-2",
            MockPage::new("<h1>Kettle 2</h1>"),
        )
        .page(
            "https://www.shop.example/about-us",
            MockPage::new("<h1>About</h1>"),
        )
}

#[tokio::test(start_paused = true)]
async fn test_crawl_records_products_and_respects_exclusions() {
    let driver = shop_site();
    let (report, urls) = crawl(config_for("shop.example"), &driver).await;

    assert_eq!(report.status, CrawlStatus::Completed);
    assert_eq!(
        urls,
        vec![
            "https://www.shop.example/p/kettle-1",
            "https://www.shop.example/p/kettle-2",
        ]
    );
    assert_eq!(report.products, 2);
    assert_eq!(report.visited, 5);
    assert_eq!(report.failed, 0);

    // excluded and foreign links are never fetched
    assert_eq!(driver.navigations("https://www.shop.example/about-us"), 0);
    assert_eq!(driver.navigations("https://other.example/p/elsewhere"), 0);
    // confident products are not expanded
    assert_eq!(
        driver.navigations("https://www.shop.example/p/kettle-1-related"),
        0
    );
    // the entry page is linked again but visited once
    assert_eq!(driver.navigations(ENTRY), 1);
}

#[tokio::test(start_paused = true)]
async fn test_depth_bound() {
    let driver = shop_site();
    let mut config = config_for("shop.example");
    config.crawl.max_depth = 1;

    let (report, urls) = crawl(config, &driver).await;

    assert_eq!(report.status, CrawlStatus::DepthExhausted);
    assert_eq!(urls, vec!["https://www.shop.example/p/kettle-1"]);
    assert_eq!(driver.navigations("https://www.shop.example/p/kettle-2"), 0);
    assert_eq!(driver.navigations("https://www.shop.example/c/toasters"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_visit_budget() {
    let driver = shop_site();
    let mut config = config_for("shop.example");
    config.crawl.max_urls_per_domain = 2;

    let (report, _) = crawl(config, &driver).await;

    assert_eq!(report.status, CrawlStatus::UrlLimitReached);
    assert_eq!(report.visited, 2);
    assert_eq!(driver.total_navigations(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_weak_match_is_recorded_and_expanded() {
    let driver = MockDriver::new()
        .page(
            ENTRY,
            MockPage::new("<h2>Specifications</h2><span>Price</span>")
                .links(&["https://www.shop.example/c/more"]),
        )
        .page("https://www.shop.example/c/more", MockPage::new("<h1>More</h1>"));

    let (report, urls) = crawl(config_for("shop.example"), &driver).await;

    assert_eq!(urls, vec![ENTRY]);
    assert_eq!(report.visited, 2);
    assert_eq!(driver.navigations("https://www.shop.example/c/more"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_structured_data_product() {
    let driver = MockDriver::new()
        .page(
            ENTRY,
            MockPage::new("<h1>Home</h1>").links(&["https://www.shop.example/kettle"]),
        )
        .page(
            "https://www.shop.example/kettle",
            MockPage::new("<h1>Kettle</h1>")
                .structured(r#"{"@context": "https://schema.org", "@type": "Product"}"#),
        );

    let (_, urls) = crawl(config_for("shop.example"), &driver).await;

    assert_eq!(urls, vec!["https://www.shop.example/kettle"]);
}

#[tokio::test(start_paused = true)]
async fn test_fast_path_product() {
    let product = "https://www.amazon.in/Electric-Kettle/dp/B0ABCDEF12";
    let driver = MockDriver::new()
        .page(
            "https://www.amazon.in/",
            MockPage::new("<div id=\"nav-main\"></div>")
                .links(&[product, "https://www.amazon.in/s/?k=kettle"]),
        )
        .page(product, MockPage::new("").links(&["https://www.amazon.in/gp/bestsellers"]));

    let (report, urls) = crawl(config_for("amazon.in"), &driver).await;

    assert_eq!(urls, vec![product]);
    assert_eq!(report.status, CrawlStatus::Completed);
    assert_eq!(driver.navigations("https://www.amazon.in/s/?k=kettle"), 0);
    assert_eq!(driver.navigations("https://www.amazon.in/gp/bestsellers"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_urls_are_skipped() {
    let driver = MockDriver::new()
        .page(
            ENTRY,
            MockPage::new("<h1>Home</h1>").links(&[
                "https://www.shop.example/c/flaky",
                "https://www.shop.example/p/kettle-1",
            ]),
        )
        .page("https://www.shop.example/c/flaky", MockPage::new("<h1>Flaky</h1>"))
        .fail("https://www.shop.example/c/flaky", 100)
        .page("https://www.shop.example/p/kettle-1", MockPage::new(""));

    let (report, urls) = crawl(config_for("shop.example"), &driver).await;

    assert_eq!(report.status, CrawlStatus::Completed);
    assert_eq!(report.failed, 1);
    assert_eq!(urls, vec!["https://www.shop.example/p/kettle-1"]);
    assert_eq!(driver.navigations("https://www.shop.example/c/flaky"), 4);
}

#[tokio::test(start_paused = true)]
async fn test_session_crash_fails_domain_keeps_results() {
    let driver = MockDriver::new()
        .page(
            ENTRY,
            MockPage::new("<h1>Home</h1>").links(&[
                "https://www.shop.example/p/kettle-1",
                "https://www.shop.example/c/boom",
                "https://www.shop.example/c/after",
            ]),
        )
        .page("https://www.shop.example/p/kettle-1", MockPage::new(""))
        .page("https://www.shop.example/c/after", MockPage::new(""))
        .crash_on("https://www.shop.example/c/boom");

    let (report, urls) = crawl(config_for("shop.example"), &driver).await;

    assert_eq!(report.status, CrawlStatus::Failed);
    assert_eq!(urls, vec!["https://www.shop.example/p/kettle-1"]);
    assert_eq!(driver.navigations("https://www.shop.example/c/after"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_global_timeout_keeps_partial_results() {
    let driver = MockDriver::new()
        .page(
            ENTRY,
            MockPage::new("<h1>Home</h1>").links(&[
                "https://www.shop.example/p/kettle-1",
                "https://www.shop.example/c/slow",
            ]),
        )
        .page("https://www.shop.example/p/kettle-1", MockPage::new(""))
        .page("https://www.shop.example/c/slow", MockPage::new(""))
        .fail("https://www.shop.example/c/slow", 100);
    let mut config = config_for("shop.example");
    config.crawl.global_timeout_secs = 10;

    let engine = engine(config.clone(), &driver);
    let started = tokio::time::Instant::now();
    let reports = engine.run(&CancellationToken::new()).await;

    assert_eq!(reports[0].status, CrawlStatus::TimedOut);
    assert_eq!(started.elapsed(), std::time::Duration::from_secs(10));
    assert_eq!(
        engine.store().urls(&config.crawl.domains[0]),
        vec!["https://www.shop.example/p/kettle-1"]
    );

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("product_urls.json");
    engine.store().export(&path).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["shop.example"]["count"], 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_token_cancels_batch() {
    let driver = shop_site();
    let engine = engine(config_for("shop.example"), &driver);
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    let reports = engine.run(&shutdown).await;

    assert_eq!(reports[0].status, CrawlStatus::TimedOut);
    assert_eq!(driver.total_navigations(), 0);
    assert!(engine
        .store()
        .urls(&Domain::parse("shop.example").unwrap())
        .is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_same_host_listed_twice_is_crawled_once() {
    let driver = shop_site();
    let mut config = config_for("shop.example");
    config
        .crawl
        .domains
        .push(Domain::parse("https://www.shop.example").unwrap());

    let engine = engine(config, &driver);
    let reports = engine.run(&CancellationToken::new()).await;

    assert_eq!(reports.len(), 1);
    assert_eq!(driver.navigations(ENTRY), 1);
    assert_eq!(
        driver.navigations("https://www.shop.example/p/kettle-1"),
        1
    );
    assert_eq!(engine.store().urls(&reports[0].domain).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_hung_session_close_does_not_block_timeout() {
    let driver = MockDriver::new()
        .page(
            ENTRY,
            MockPage::new("<h1>Home</h1>").links(&["https://www.shop.example/c/slow"]),
        )
        .page("https://www.shop.example/c/slow", MockPage::new(""))
        .fail("https://www.shop.example/c/slow", 100)
        .hang_on_close();
    let mut config = config_for("shop.example");
    config.crawl.global_timeout_secs = 10;

    let engine = engine(config, &driver);
    let started = tokio::time::Instant::now();
    let reports = engine.run(&CancellationToken::new()).await;

    assert_eq!(reports[0].status, CrawlStatus::TimedOut);
    let elapsed = started.elapsed();
    assert!(elapsed >= std::time::Duration::from_secs(10), "{elapsed:?}");
    assert!(elapsed <= std::time::Duration::from_secs(30), "{elapsed:?}");
}
