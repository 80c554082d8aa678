//! End-to-end analysis pipeline: collect reviews, run the LLM over them,
//! package the result under a stable content-derived identifier.

pub mod llm;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::config::Settings;
use crate::scrape::{CollectionTarget, Coordinator};

use self::llm::{strip_code_fences, LlmClient};

/// One finished analysis, ready for persistence or the API response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisEnvelope {
    /// Stable identifier derived from the URL and the keyword set.
    pub analysis_id: String,
    pub url: String,
    pub keywords: Vec<String>,
    /// Normalized analysis: compact JSON when the model complied, the raw
    /// response text otherwise.
    pub analysis_text: String,
    /// How many reviews fed the analysis.
    pub records_collected: usize,
}

/// Identifier for one (listing, keyword set) analysis.
///
/// Keyword order must not matter: the same listing analyzed with the same
/// keywords in a different order is the same analysis.
pub fn analysis_id(url: &str, keywords: &[String]) -> String {
    let mut sorted: Vec<&str> = keywords.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let unique = format!("{}{}", url, sorted.join(","));
    hex::encode(Sha256::digest(unique.as_bytes()))
}

/// Truncate to at most `max` bytes without splitting a UTF-8 character.
fn truncate_utf8(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Compact the model response for storage. Fenced or not, a JSON-shaped
/// response is re-serialized; anything else is stored verbatim.
fn normalize_analysis_text(raw: &str) -> String {
    let stripped = strip_code_fences(raw);
    match serde_json::from_str::<serde_json::Value>(stripped) {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|_| stripped.to_string()),
        Err(_) => {
            warn!("model response was not JSON, storing raw text");
            raw.trim().to_string()
        }
    }
}

/// Run the whole pipeline for one listing: collect reviews across all rating
/// categories, concatenate their bodies, and analyze them against `keywords`.
pub async fn analyze_listing(
    settings: &Settings,
    url: &str,
    keywords: &[String],
) -> Result<AnalysisEnvelope> {
    if keywords.is_empty() {
        bail!("at least one keyword is required");
    }

    let coordinator = Coordinator::new(settings.browser.clone(), settings.crawl.clone());
    let target = CollectionTarget {
        max_records_per_category: settings.crawl.max_records_per_category,
        ..CollectionTarget::default()
    };
    let report = coordinator
        .collect(url, &target)
        .await
        .context("review collection failed")?;

    if !report.has_records() {
        bail!("no reviews could be collected from the listing");
    }

    let joined = report
        .records()
        .map(|r| r.body.as_str())
        .filter(|b| !b.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let review_text = truncate_utf8(&joined, settings.crawl.max_review_chars);

    info!(
        "analyzing {} records ({} chars) against {} keywords",
        report.total_records(),
        review_text.len(),
        keywords.len()
    );
    let client = LlmClient::new(settings.llm.clone());
    let raw = client
        .analyze(keywords, review_text)
        .await
        .context("LLM analysis failed")?;

    Ok(AnalysisEnvelope {
        analysis_id: analysis_id(url, keywords),
        url: url.to_string(),
        keywords: keywords.to_vec(),
        analysis_text: normalize_analysis_text(&raw),
        records_collected: report.total_records(),
    })
}
