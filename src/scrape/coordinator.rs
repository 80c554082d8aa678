//! Fan-out across rating categories.
//!
//! Each category gets its own browser context and collection session on its
//! own task, so a blocked or broken category cannot stall the others. A hard
//! per-category deadline bounds the whole run even when the page wedges in a
//! way no inner timeout catches.

use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::config::CrawlConfig;

use super::browser::{BrowserEngineConfig, ListingBrowser};
use super::driver::CdpDriver;
use super::filter::FILTER_TRIGGER;
use super::policy::HumanizedDelays;
use super::session::CollectionSession;
use super::types::{CollectionTarget, RatingCategory, SessionOutcome, TerminationReason};

/// Link text of the tab that reveals the review section.
const REVIEW_TAB_TEXT: &str = "상품평";

/// Container that appears once the review section has rendered.
const REVIEW_SECTION: &str = "#sdpReview";

const REVIEW_SECTION_WAIT: Duration = Duration::from_secs(12);

/// Merged result of one collection run across all requested categories.
#[derive(Debug)]
pub struct CollectionReport {
    pub outcomes: Vec<(RatingCategory, SessionOutcome)>,
}

impl CollectionReport {
    pub fn total_records(&self) -> usize {
        self.outcomes.iter().map(|(_, o)| o.records.len()).sum()
    }

    /// All records in category order, flattened.
    pub fn records(&self) -> impl Iterator<Item = &super::types::ReviewRecord> {
        self.outcomes.iter().flat_map(|(_, o)| o.records.iter())
    }

    /// True when at least one category produced records.
    pub fn has_records(&self) -> bool {
        self.outcomes.iter().any(|(_, o)| !o.records.is_empty())
    }
}

pub struct Coordinator {
    browser_config: BrowserEngineConfig,
    crawl_config: CrawlConfig,
}

impl Coordinator {
    pub fn new(browser_config: BrowserEngineConfig, crawl_config: CrawlConfig) -> Self {
        Self {
            browser_config,
            crawl_config,
        }
    }

    /// Collect reviews for every category in `target` from the listing at
    /// `url`. Individual category failures degrade that category's outcome
    /// rather than failing the run; the report always covers every requested
    /// category.
    pub async fn collect(&self, url: &str, target: &CollectionTarget) -> Result<CollectionReport> {
        let mut handles = Vec::with_capacity(target.rating_categories.len());
        for &category in &target.rating_categories {
            let browser_config = self.browser_config.clone();
            let crawl_config = self.crawl_config.clone();
            let url = url.to_string();
            let max_records = target.max_records_per_category;

            handles.push((
                category,
                tokio::spawn(async move {
                    run_category(&browser_config, &crawl_config, &url, category, max_records).await
                }),
            ));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (category, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("[{category}] session task panicked: {e}");
                    SessionOutcome::empty(TerminationReason::RepeatedFailure)
                }
            };
            outcomes.push((category, outcome));
        }

        let report = CollectionReport { outcomes };
        info!(
            "collection finished: {} records across {} categories",
            report.total_records(),
            report.outcomes.len()
        );
        Ok(report)
    }
}

/// One category, end to end: launch, navigate, collect, tear down.
///
/// Never returns an error; every failure mode maps to a degraded outcome so
/// sibling categories keep their results.
async fn run_category(
    browser_config: &BrowserEngineConfig,
    crawl_config: &CrawlConfig,
    url: &str,
    category: RatingCategory,
    max_records: usize,
) -> SessionOutcome {
    let browser = match ListingBrowser::launch(browser_config).await {
        Ok(b) => b,
        Err(e) => {
            error!("[{category}] browser launch failed: {e:#}");
            return SessionOutcome::empty(TerminationReason::RepeatedFailure);
        }
    };

    let deadline = Duration::from_secs(crawl_config.category_timeout_secs);
    let outcome = match tokio::time::timeout(
        deadline,
        collect_category(&browser, crawl_config, url, category, max_records),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!("[{category}] session exceeded {deadline:?}, aborting");
            SessionOutcome::empty(TerminationReason::RepeatedFailure)
        }
    };

    browser.close().await;
    outcome
}

async fn collect_category(
    browser: &ListingBrowser,
    crawl_config: &CrawlConfig,
    url: &str,
    category: RatingCategory,
    max_records: usize,
) -> SessionOutcome {
    let page = match browser.open(url).await {
        Ok(p) => p,
        Err(e) => {
            error!("[{category}] failed to open listing: {e:#}");
            return SessionOutcome::empty(TerminationReason::RepeatedFailure);
        }
    };

    let driver = CdpDriver::new(page);
    let delays = HumanizedDelays;

    if let Err(e) = open_review_section(&driver, &delays).await {
        error!("[{category}] review section did not load: {e}");
        return SessionOutcome::empty(TerminationReason::RepeatedFailure);
    }

    CollectionSession::new(
        &driver,
        &delays,
        category,
        max_records,
        crawl_config.max_consecutive_failures,
    )
    .run()
    .await
}

/// Bring the review section into the DOM: click its tab if the page landed
/// elsewhere, then wait for the section and the filter control to render.
async fn open_review_section(
    driver: &CdpDriver,
    delays: &HumanizedDelays,
) -> Result<(), super::driver::DriverError> {
    use super::driver::{ClickTarget, DriverError, PageDriver};
    use super::policy::DelayPolicy;

    if !driver.wait_for(REVIEW_SECTION, Duration::from_secs(3)).await? {
        // Some landings render the section only after its tab is clicked.
        tokio::time::sleep(delays.pre_click()).await;
        let _ = driver
            .click(&ClickTarget::ByTextContains {
                selector: "a".to_string(),
                text: REVIEW_TAB_TEXT.to_string(),
            })
            .await?;
    }

    if !driver.wait_for(REVIEW_SECTION, REVIEW_SECTION_WAIT).await? {
        return Err(DriverError::Timeout(
            REVIEW_SECTION_WAIT,
            REVIEW_SECTION.to_string(),
        ));
    }

    driver.scroll_into_view(REVIEW_SECTION).await?;
    // The filter control renders asynchronously inside the section.
    driver.wait_for(FILTER_TRIGGER, REVIEW_SECTION_WAIT).await?;
    Ok(())
}
