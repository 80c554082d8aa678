//! Scripted in-memory page model for driving the collection logic in tests.
//!
//! Renders a synthetic listing + pagination bar from mutable state and
//! answers every `PageDriver` query by parsing its own render, so the code
//! under test sees exactly what it would see against a live page.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};

use super::driver::{ClickTarget, DriverError, PageDriver};
use super::pagination::fixtures::legacy_bar;
use super::types::RatingCategory;

const GROUP_SIZE: u32 = 10;

struct FakeState {
    /// Page index → number of review items rendered on it.
    page_items: BTreeMap<u32, usize>,
    /// Highest page that exists; 0 or 1 means no pagination bar.
    last_page: u32,
    /// Start of the currently visible page-number window.
    group_start: u32,
    current: u32,
    /// Page numbers omitted from the rendered window (sparse window).
    missing_buttons: BTreeSet<u32>,
    has_filter: bool,
    filter_label: String,
    popup_open: bool,
    /// When true, numbered-page clicks silently fail (transient DOM fault).
    fail_page_clicks: bool,
    /// When true, numbered-page clicks report success but leave the page
    /// where it was (navigation swallowed by the site).
    stuck_page_clicks: bool,
    /// When true, the first click on each page number fails and the retry
    /// succeeds.
    flaky_page_clicks: bool,
    last_failed_page: Option<u32>,
    clicks: Vec<ClickTarget>,
}

pub(crate) struct FakeDriver {
    state: Mutex<FakeState>,
}

impl FakeDriver {
    /// A listing with `last_page` pages of `items_per_page` reviews each.
    pub fn paginated(last_page: u32, items_per_page: usize) -> Self {
        let page_items = (1..=last_page.max(1))
            .map(|p| (p, items_per_page))
            .collect();
        Self {
            state: Mutex::new(FakeState {
                page_items,
                last_page,
                group_start: 1,
                current: 1,
                missing_buttons: BTreeSet::new(),
                has_filter: true,
                filter_label: "모든 별점".to_string(),
                popup_open: false,
                fail_page_clicks: false,
                stuck_page_clicks: false,
                flaky_page_clicks: false,
                last_failed_page: None,
                clicks: Vec::new(),
            }),
        }
    }

    /// A category with zero reviews and no pagination bar.
    pub fn empty() -> Self {
        let driver = Self::paginated(0, 0);
        driver.state.lock().unwrap().page_items.clear();
        driver
    }

    pub fn without_filter() -> Self {
        let driver = Self::paginated(2, 1);
        driver.state.lock().unwrap().has_filter = false;
        driver
    }

    pub fn set_filter_label(&self, label: &str) {
        self.state.lock().unwrap().filter_label = label.to_string();
    }

    pub fn filter_label(&self) -> String {
        self.state.lock().unwrap().filter_label.clone()
    }

    pub fn set_missing_buttons(&self, pages: impl IntoIterator<Item = u32>) {
        self.state.lock().unwrap().missing_buttons = pages.into_iter().collect();
    }

    pub fn set_fail_page_clicks(&self, fail: bool) {
        self.state.lock().unwrap().fail_page_clicks = fail;
    }

    pub fn set_stuck_page_clicks(&self, stuck: bool) {
        self.state.lock().unwrap().stuck_page_clicks = stuck;
    }

    pub fn set_flaky_page_clicks(&self, flaky: bool) {
        self.state.lock().unwrap().flaky_page_clicks = flaky;
    }

    pub fn set_current(&self, page: u32) {
        self.state.lock().unwrap().current = page;
    }

    pub fn clicks(&self) -> Vec<ClickTarget> {
        self.state.lock().unwrap().clicks.clone()
    }

    /// Page numbers clicked, in order.
    pub fn clicked_pages(&self) -> Vec<u32> {
        self.clicks()
            .iter()
            .filter_map(|c| match c {
                ClickTarget::ByText { text, .. } => text.parse().ok(),
                _ => None,
            })
            .collect()
    }

    fn render(&self) -> String {
        let state = self.state.lock().unwrap();
        Self::render_state(&state)
    }

    fn render_state(state: &FakeState) -> String {
        let mut html = String::from("<html><body>");

        if state.has_filter {
            html.push_str(&format!(
                r#"<div role="combobox">{}</div>"#,
                state.filter_label
            ));
        }
        if state.popup_open {
            // Nested like the live popup: a content wrapper and a listbox
            // both sit between the popper root and the option nodes, and
            // their text contains every option label.
            html.push_str(
                r#"<div data-radix-popper-content-wrapper><div class="popup-content"><div role="listbox">"#,
            );
            for category in RatingCategory::ALL {
                html.push_str(&format!(
                    r#"<div role="option">{}</div>"#,
                    category.label()
                ));
            }
            html.push_str("</div></div></div>");
        }

        let items = state.page_items.get(&state.current).copied().unwrap_or(0);
        for i in 0..items {
            html.push_str(&format!(
                r#"<article class="sdp-review__article__list">
                    <span data-member-id="m{cur}-{i}">독자{cur}-{i}</span>
                    <div><i class="twc-bg-full-star"></i><i class="twc-bg-full-star"></i><i class="twc-bg-full-star"></i></div>
                    <div class="sdp-review__article__list__review__content">페이지 {cur} 리뷰 {i}</div>
                </article>"#,
                cur = state.current,
            ));
        }

        if state.last_page >= 2 {
            let window_end = (state.group_start + GROUP_SIZE - 1).min(state.last_page);
            let pages: Vec<u32> = (state.group_start..=window_end)
                .filter(|p| !state.missing_buttons.contains(p))
                .collect();
            let next_enabled = Some(window_end < state.last_page);
            html.push_str(&legacy_bar(
                state.current,
                &pages,
                state.group_start,
                next_enabled,
            ));
        }

        html.push_str("</body></html>");
        html
    }

    fn matches(&self, selector: &str) -> bool {
        let doc = Html::parse_document(&self.render());
        let sel = Selector::parse(selector).expect("invalid selector in test");
        doc.select(&sel).next().is_some()
    }

    /// Resolve a text-contains click the way the live driver does: among
    /// all elements matching the selector whose text contains `text`, the
    /// click lands on the innermost one. Landing on a wrapper instead
    /// selects whatever sits at the wrapper's center, which here is the
    /// middle option.
    fn resolve_option_click(state: &FakeState, selector: &str, text: &str) -> Option<String> {
        let html = Self::render_state(state);
        let doc = Html::parse_document(&html);
        let sel = Selector::parse(selector).expect("invalid selector in test");
        let matches: Vec<_> = doc
            .select(&sel)
            .filter(|el| el.text().collect::<String>().contains(text))
            .collect();
        let target = matches.iter().copied().find(|el| {
            !matches
                .iter()
                .any(|other| other.id() != el.id() && other.ancestors().any(|a| a.id() == el.id()))
        })?;

        let own_label = |el: &scraper::ElementRef<'_>| el.text().collect::<String>().trim().to_string();
        if target.attr("role") == Some("option") {
            return Some(own_label(&target));
        }
        let option_sel = Selector::parse("[role='option']").expect("invalid selector in test");
        let options: Vec<String> = target.select(&option_sel).map(|el| own_label(&el)).collect();
        options.get(options.len() / 2).cloned()
    }
}

#[async_trait]
impl PageDriver for FakeDriver {
    async fn content(&self) -> Result<String, DriverError> {
        Ok(self.render())
    }

    async fn wait_for(&self, selector: &str, _timeout: Duration) -> Result<bool, DriverError> {
        Ok(self.matches(selector))
    }

    async fn wait_until_gone(
        &self,
        selector: &str,
        _timeout: Duration,
    ) -> Result<bool, DriverError> {
        Ok(!self.matches(selector))
    }

    async fn element_text(&self, selector: &str) -> Result<Option<String>, DriverError> {
        let doc = Html::parse_document(&self.render());
        let sel = Selector::parse(selector).expect("invalid selector in test");
        Ok(doc
            .select(&sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string()))
    }

    async fn element_attr(
        &self,
        selector: &str,
        attr: &str,
    ) -> Result<Option<String>, DriverError> {
        let doc = Html::parse_document(&self.render());
        let sel = Selector::parse(selector).expect("invalid selector in test");
        Ok(doc
            .select(&sel)
            .next()
            .and_then(|el| el.attr(attr).map(str::to_string)))
    }

    async fn scroll_into_view(&self, _selector: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn click(&self, target: &ClickTarget) -> Result<bool, DriverError> {
        let mut state = self.state.lock().unwrap();
        state.clicks.push(target.clone());
        match target {
            ClickTarget::Css { selector } if selector.contains("combobox") => {
                if !state.has_filter {
                    return Ok(false);
                }
                state.popup_open = true;
                Ok(true)
            }
            ClickTarget::ByTextContains { selector, text } if selector.contains("popper") => {
                if !state.popup_open {
                    return Ok(false);
                }
                let Some(label) = Self::resolve_option_click(&state, selector, text) else {
                    return Ok(false);
                };
                state.filter_label = label;
                state.popup_open = false;
                Ok(true)
            }
            ClickTarget::ByText { text, .. } => {
                if state.fail_page_clicks {
                    return Ok(false);
                }
                let Ok(page) = text.parse::<u32>() else {
                    return Ok(false);
                };
                if state.flaky_page_clicks && state.last_failed_page != Some(page) {
                    state.last_failed_page = Some(page);
                    return Ok(false);
                }
                let window_end = (state.group_start + GROUP_SIZE - 1).min(state.last_page);
                let rendered = page >= state.group_start
                    && page <= window_end
                    && !state.missing_buttons.contains(&page);
                if !rendered {
                    return Ok(false);
                }
                if state.stuck_page_clicks {
                    return Ok(true);
                }
                state.current = page;
                Ok(true)
            }
            ClickTarget::NextGroupArrow { .. } => {
                let window_end = (state.group_start + GROUP_SIZE - 1).min(state.last_page);
                if window_end >= state.last_page {
                    return Ok(false);
                }
                state.group_start += GROUP_SIZE;
                state.current = state.group_start;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn wait_attr_changed(
        &self,
        selector: &str,
        attr: &str,
        old: &str,
        _timeout: Duration,
    ) -> Result<bool, DriverError> {
        Ok(self.element_attr(selector, attr).await?.as_deref() != Some(old))
    }

    async fn wait_replaced(
        &self,
        selector: &str,
        old: &str,
        _timeout: Duration,
    ) -> Result<bool, DriverError> {
        let doc = Html::parse_document(&self.render());
        let sel = Selector::parse(selector).expect("invalid selector in test");
        let current = doc.select(&sel).next().map(|el| el.html()).unwrap_or_default();
        Ok(current != old)
    }
}
