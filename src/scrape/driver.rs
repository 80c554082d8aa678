//! The seam between collection logic and the live browser page.
//!
//! Everything above this trait (filter, navigator, session) reasons over
//! HTML snapshots and issues abstract interactions; `CdpDriver` is the only
//! code that touches chromiumoxide. Tests substitute a scripted fake.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use thiserror::Error;
use tracing::debug;

/// How often waits poll the DOM.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("timed out after {0:?} waiting for {1}")]
    Timeout(Duration, String),

    #[error("browser protocol error: {0}")]
    Cdp(String),

    #[error("no clickable element for {0}")]
    MissingElement(String),
}

impl From<chromiumoxide::error::CdpError> for DriverError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        DriverError::Cdp(e.to_string())
    }
}

/// How to locate the element a click should land on.
///
/// Text-matched clicks exist because the data-bearing buttons (page numbers,
/// filter options) are only distinguishable by their rendered text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickTarget {
    /// First element matching a CSS selector.
    Css { selector: String },
    /// Element matching the selector whose trimmed text equals `text`.
    ByText { selector: String, text: String },
    /// Innermost element matching the selector whose text contains `text`.
    /// Wrapper elements aggregate the text of everything they hold, so a
    /// containment match must land on the deepest matching node, never on a
    /// wrapper whose center may be a different option entirely.
    ByTextContains { selector: String, text: String },
    /// The "advance to next group" arrow inside the pagination bar:
    /// identified by exclusion as the button whose svg icon does NOT carry
    /// the rotation marker class (the previous-group arrow is the rotated
    /// one).
    NextGroupArrow { bar_selector: String },
}

/// Read/interact primitives over one rendered page.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Full HTML of the current document.
    async fn content(&self) -> Result<String, DriverError>;

    /// Wait (bounded) until an element matching `selector` exists.
    /// Returns false on timeout; timeouts here are expected states, not
    /// errors.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<bool, DriverError>;

    /// Wait (bounded) until no element matches `selector`.
    async fn wait_until_gone(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, DriverError>;

    /// Trimmed text of the first element matching `selector`, if any.
    async fn element_text(&self, selector: &str) -> Result<Option<String>, DriverError>;

    /// Attribute value of the first element matching `selector`, if any.
    async fn element_attr(
        &self,
        selector: &str,
        attr: &str,
    ) -> Result<Option<String>, DriverError>;

    /// Scroll the first matching element into view. Missing element is a
    /// no-op.
    async fn scroll_into_view(&self, selector: &str) -> Result<(), DriverError>;

    /// Click the target. Returns false when no matching element was found.
    /// Implementations try a direct pointer click first and fall back to a
    /// scripted click (some layouts intercept pointer events).
    async fn click(&self, target: &ClickTarget) -> Result<bool, DriverError>;

    /// Wait until `attr` of the first element matching `selector` differs
    /// from `old`. Used for the legacy bar's start-of-range marker.
    async fn wait_attr_changed(
        &self,
        selector: &str,
        attr: &str,
        old: &str,
        timeout: Duration,
    ) -> Result<bool, DriverError>;

    /// Wait until the outer HTML of the first element matching `selector`
    /// differs from `old` (the element was replaced by a re-render).
    /// Approximates a staleness wait for markup without range markers.
    async fn wait_replaced(
        &self,
        selector: &str,
        old: &str,
        timeout: Duration,
    ) -> Result<bool, DriverError>;
}

/// `PageDriver` over a chromiumoxide CDP page.
pub struct CdpDriver {
    page: Page,
}

impl CdpDriver {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Outer HTML of the first match, or empty string when absent.
    pub async fn outer_html(&self, selector: &str) -> Result<String, DriverError> {
        let script = format!(
            "document.querySelector({})?.outerHTML ?? ''",
            js_str(selector)
        );
        let value: String = self
            .page
            .evaluate(script)
            .await?
            .into_value()
            .map_err(|e| DriverError::Cdp(e.to_string()))?;
        Ok(value)
    }

    /// Scripted click fallback: locate by selector (and optional text match)
    /// inside the page and dispatch `click()` on the innermost match. Any
    /// match containing another match is a wrapper, not the target.
    async fn scripted_click(
        &self,
        selector: &str,
        text: Option<&str>,
        exact: bool,
    ) -> Result<bool, DriverError> {
        let script = format!(
            r#"
            (() => {{
                const want = {text};
                const matches = Array.from(document.querySelectorAll({sel})).filter(el => {{
                    if (want === null) return true;
                    const got = (el.textContent || '').trim();
                    return {exact} ? got === want : got.includes(want);
                }});
                for (const el of matches) {{
                    if (matches.some(other => other !== el && el.contains(other))) continue;
                    el.scrollIntoView({{block: 'center'}});
                    el.click();
                    return true;
                }}
                return false;
            }})()
            "#,
            sel = js_str(selector),
            text = text.map(js_str).unwrap_or_else(|| "null".to_string()),
            exact = exact,
        );
        let clicked: bool = self
            .page
            .evaluate(script)
            .await?
            .into_value()
            .map_err(|e| DriverError::Cdp(e.to_string()))?;
        Ok(clicked)
    }

    async fn click_css(&self, selector: &str) -> Result<bool, DriverError> {
        if let Ok(el) = self.page.find_element(selector).await {
            let _ = el.scroll_into_view().await;
            if el.click().await.is_ok() {
                return Ok(true);
            }
            debug!("direct click failed for {selector}, trying scripted click");
        }
        self.scripted_click(selector, None, false).await
    }

    async fn click_by_text(
        &self,
        selector: &str,
        text: &str,
        exact: bool,
    ) -> Result<bool, DriverError> {
        if let Ok(elements) = self.page.find_elements(selector).await {
            let mut candidates = Vec::new();
            for el in elements {
                let Ok(Some(got)) = el.inner_text().await else {
                    continue;
                };
                let got = got.trim().to_string();
                let matched = if exact { got == text } else { got.contains(text) };
                if matched {
                    candidates.push((got.len(), el));
                }
            }
            // Wrappers aggregate the text of every child match, so the
            // innermost match is the one with the shortest text.
            if let Some((_, el)) = candidates.into_iter().min_by_key(|(len, _)| *len) {
                let _ = el.scroll_into_view().await;
                if el.click().await.is_ok() {
                    return Ok(true);
                }
                debug!("direct click failed for {selector:?} text {text:?}, trying scripted click");
            }
        }
        self.scripted_click(selector, Some(text), exact).await
    }

    /// Click the next-group arrow by exclusion: any enabled button in the
    /// bar whose svg icon lacks the rotation marker class.
    async fn click_next_group(&self, bar_selector: &str) -> Result<bool, DriverError> {
        let script = format!(
            r#"
            (() => {{
                const bar = document.querySelector({sel});
                if (!bar) return false;
                for (const btn of bar.querySelectorAll('button')) {{
                    const svg = btn.querySelector('svg');
                    if (!svg) continue;
                    const cls = svg.getAttribute('class') || '';
                    if (cls.includes('twc-rotate')) continue;
                    if (btn.disabled || btn.hasAttribute('disabled')) return false;
                    btn.scrollIntoView({{block: 'center'}});
                    btn.click();
                    return true;
                }}
                return false;
            }})()
            "#,
            sel = js_str(bar_selector),
        );
        let clicked: bool = self
            .page
            .evaluate(script)
            .await?
            .into_value()
            .map_err(|e| DriverError::Cdp(e.to_string()))?;
        Ok(clicked)
    }
}

#[async_trait]
impl PageDriver for CdpDriver {
    async fn content(&self) -> Result<String, DriverError> {
        Ok(self.page.content().await?)
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<bool, DriverError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_until_gone(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, DriverError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_err() {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn element_text(&self, selector: &str) -> Result<Option<String>, DriverError> {
        match self.page.find_element(selector).await {
            Ok(el) => Ok(el
                .inner_text()
                .await?
                .map(|t| t.trim().to_string())),
            Err(_) => Ok(None),
        }
    }

    async fn element_attr(
        &self,
        selector: &str,
        attr: &str,
    ) -> Result<Option<String>, DriverError> {
        match self.page.find_element(selector).await {
            Ok(el) => Ok(el.attribute(attr).await?),
            Err(_) => Ok(None),
        }
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<(), DriverError> {
        if let Ok(el) = self.page.find_element(selector).await {
            let _ = el.scroll_into_view().await;
        }
        Ok(())
    }

    async fn click(&self, target: &ClickTarget) -> Result<bool, DriverError> {
        match target {
            ClickTarget::Css { selector } => self.click_css(selector).await,
            ClickTarget::ByText { selector, text } => {
                self.click_by_text(selector, text, true).await
            }
            ClickTarget::ByTextContains { selector, text } => {
                self.click_by_text(selector, text, false).await
            }
            ClickTarget::NextGroupArrow { bar_selector } => {
                self.click_next_group(bar_selector).await
            }
        }
    }

    async fn wait_attr_changed(
        &self,
        selector: &str,
        attr: &str,
        old: &str,
        timeout: Duration,
    ) -> Result<bool, DriverError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let current = self.element_attr(selector, attr).await?;
            if current.as_deref() != Some(old) {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_replaced(
        &self,
        selector: &str,
        old: &str,
        timeout: Duration,
    ) -> Result<bool, DriverError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let current = self.outer_html(selector).await?;
            if current != old {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

/// Embed a Rust string as a JS string literal.
fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}
