//! Pagination state recovery and advancement.
//!
//! The pagination bar comes in two markup shapes (legacy and redesigned)
//! that expose different selectors for the active button, the numbered page
//! buttons and the next-group arrow. The shape is classified from the bar's
//! class attribute on EVERY step - a transition can replace the bar element
//! outright, so nothing here survives across navigations.

use std::time::Duration;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use super::driver::{ClickTarget, DriverError, PageDriver};
use super::policy::DelayPolicy;
use super::types::{PaginationState, UiVariant, VisitedPages};

/// The pagination bar in either markup.
pub const BAR_SELECTOR: &str = "div[data-page][data-start][data-end]";

/// Class fragment present only on the redesigned bar.
const REDESIGNED_MARKER: &str = "twc-mt-[24px]";

/// Bounded wait for the bar to render; absence is a state, not an error.
const BAR_WAIT: Duration = Duration::from_secs(6);

/// Bounded wait for a group transition to complete.
const GROUP_TRANSITION_WAIT: Duration = Duration::from_secs(15);

/// Selector strategy for one bar variant.
pub struct VariantSelectors {
    /// Button marked as the currently active page.
    pub active_button: &'static str,
    /// Clickable numbered-page buttons.
    pub page_buttons: &'static str,
}

const LEGACY_SELECTORS: VariantSelectors = VariantSelectors {
    active_button: "button.selected",
    page_buttons: "button.sdp-review__article__page__num",
};

// The redesigned bar has no dedicated page-button class; numbered buttons
// are the ones wrapping a span with a numeric label.
const REDESIGNED_SELECTORS: VariantSelectors = VariantSelectors {
    active_button: "button[class*='twc-text-[#346aff]']",
    page_buttons: "button",
};

impl UiVariant {
    /// Selector table for this variant; `SinglePage` has no bar.
    pub fn selectors(&self) -> Option<&'static VariantSelectors> {
        match self {
            UiVariant::Legacy => Some(&LEGACY_SELECTORS),
            UiVariant::Redesigned => Some(&REDESIGNED_SELECTORS),
            UiVariant::SinglePage => None,
        }
    }
}

/// State of the next-group arrow in the current render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextGroupControl {
    Absent,
    Disabled,
    Enabled,
}

/// Everything the navigator can know about the bar from one snapshot.
#[derive(Debug, Clone)]
pub struct BarSnapshot {
    pub variant: UiVariant,
    /// Defaults to 1 when the active button cannot be read; misdetection
    /// only risks one redundant extraction, absorbed by the visited set.
    pub current_page: u32,
    /// Numbered buttons visible in the current group window, ascending.
    pub page_numbers: Vec<u32>,
    pub next_group: NextGroupControl,
    /// Legacy start-of-range marker; changes when the group advances.
    pub data_start: Option<String>,
    /// Raw bar markup, used as the replacement sentinel for the redesigned
    /// variant (which has no range marker).
    pub outer_html: String,
}

/// Parse the pagination bar out of a page snapshot. `None` means no bar is
/// rendered (single page of results).
pub fn read_bar(html: &str) -> Option<BarSnapshot> {
    let doc = Html::parse_document(html);
    let bar_sel = sel(BAR_SELECTOR);
    let bar = doc.select(&bar_sel).next()?;

    let class_attr = bar.attr("class").unwrap_or_default();
    let variant = if class_attr.contains(REDESIGNED_MARKER) {
        UiVariant::Redesigned
    } else {
        UiVariant::Legacy
    };
    let selectors = variant.selectors().expect("bar variant has selectors");

    let current_page = bar
        .select(&sel(selectors.active_button))
        .next()
        .and_then(|el| parse_page_number(el, variant))
        .unwrap_or(1);

    let mut page_numbers: Vec<u32> = bar
        .select(&sel(selectors.page_buttons))
        .filter_map(|el| parse_page_number(el, variant))
        .collect();
    page_numbers.sort_unstable();
    page_numbers.dedup();

    Some(BarSnapshot {
        variant,
        current_page,
        page_numbers,
        next_group: next_group_control(bar),
        data_start: bar.attr("data-start").map(str::to_string),
        outer_html: bar.html(),
    })
}

fn parse_page_number(el: ElementRef<'_>, variant: UiVariant) -> Option<u32> {
    if variant == UiVariant::Redesigned {
        // Numbered buttons wrap their label in a span; the arrow buttons
        // wrap an svg instead.
        let span = sel("span");
        el.select(&span).next()?;
    }
    let text: String = el.text().collect::<String>();
    text.trim().parse().ok()
}

/// Identify the next-group arrow by exclusion: the button whose svg icon
/// does NOT carry the rotation marker class (the previous-group arrow is
/// the rotated one).
fn next_group_control(bar: ElementRef<'_>) -> NextGroupControl {
    let button_sel = sel("button");
    let svg_sel = sel("svg");
    for button in bar.select(&button_sel) {
        let Some(svg) = button.select(&svg_sel).next() else {
            continue;
        };
        if svg.attr("class").unwrap_or_default().contains("twc-rotate") {
            continue;
        }
        if button.attr("disabled").is_some() {
            return NextGroupControl::Disabled;
        }
        return NextGroupControl::Enabled;
    }
    NextGroupControl::Absent
}

/// Nearest unvisited forward page in the rendered window.
///
/// Strict current+1 would stall on sparse windows (the bar renders only a
/// subset of page numbers near the current one), so the rule is: smallest
/// index that is both greater than the current page and not yet visited.
pub fn pick_next_page(bar: &BarSnapshot, visited: &VisitedPages) -> Option<u32> {
    bar.page_numbers
        .iter()
        .copied()
        .filter(|n| *n > bar.current_page && !visited.contains(n))
        .min()
}

impl PaginationState {
    /// Session-facing view of one navigation step.
    pub fn derive(bar: Option<&BarSnapshot>, visited: &VisitedPages) -> Self {
        match bar {
            None => PaginationState {
                ui_variant: UiVariant::SinglePage,
                current_page_index: 1,
                group_boundary_reached: true,
            },
            Some(b) => PaginationState {
                ui_variant: b.variant,
                current_page_index: b.current_page,
                group_boundary_reached: pick_next_page(b, visited).is_none(),
            },
        }
    }
}

/// Result of one advance attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Clicked a numbered page button.
    MovedToPage(u32),
    /// Clicked the next-group arrow and observed the bar change.
    MovedToNextGroup,
    /// No forward button and no usable next-group control; terminal.
    NoMorePages,
}

/// Drives pagination over a live page.
pub struct Navigator<'a> {
    driver: &'a dyn PageDriver,
    delays: &'a dyn DelayPolicy,
}

impl<'a> Navigator<'a> {
    pub fn new(driver: &'a dyn PageDriver, delays: &'a dyn DelayPolicy) -> Self {
        Self { driver, delays }
    }

    /// Wait (bounded) for the bar and parse it from a fresh snapshot.
    /// `None` means single-page results.
    pub async fn locate(&self) -> Result<Option<BarSnapshot>, DriverError> {
        if !self.driver.wait_for(BAR_SELECTOR, BAR_WAIT).await? {
            return Ok(None);
        }
        let html = self.driver.content().await?;
        Ok(read_bar(&html))
    }

    /// Move to the next unvisited page, or through the next group, or
    /// report exhaustion.
    pub async fn advance(
        &self,
        bar: &BarSnapshot,
        visited: &VisitedPages,
    ) -> Result<AdvanceOutcome, DriverError> {
        if let Some(target) = pick_next_page(bar, visited) {
            let selectors = bar.variant.selectors().expect("bar variant has selectors");
            let scoped = format!("{} {}", BAR_SELECTOR, selectors.page_buttons);
            debug!("advancing to page {target}");
            tokio::time::sleep(self.delays.pre_click()).await;
            let clicked = self
                .driver
                .click(&ClickTarget::ByText {
                    selector: scoped,
                    text: target.to_string(),
                })
                .await?;
            if !clicked {
                return Err(DriverError::MissingElement(format!(
                    "page button {target}"
                )));
            }
            tokio::time::sleep(self.delays.post_navigation()).await;
            return Ok(AdvanceOutcome::MovedToPage(target));
        }

        match bar.next_group {
            NextGroupControl::Absent | NextGroupControl::Disabled => {
                info!("group boundary reached with no usable next-group control");
                Ok(AdvanceOutcome::NoMorePages)
            }
            NextGroupControl::Enabled => self.advance_group(bar).await,
        }
    }

    async fn advance_group(&self, bar: &BarSnapshot) -> Result<AdvanceOutcome, DriverError> {
        debug!("advancing to next page group ({:?})", bar.variant);
        tokio::time::sleep(self.delays.pre_click()).await;
        let clicked = self
            .driver
            .click(&ClickTarget::NextGroupArrow {
                bar_selector: BAR_SELECTOR.to_string(),
            })
            .await?;
        if !clicked {
            // The control went away or got disabled between snapshot and
            // click; treat as exhaustion rather than a fault.
            return Ok(AdvanceOutcome::NoMorePages);
        }

        // Variant-specific completion signal: the legacy bar updates its
        // start-of-range marker in place; the redesigned bar is replaced
        // wholesale, so we wait for the clicked markup to go stale.
        let completed = match (bar.variant, bar.data_start.as_deref()) {
            (UiVariant::Legacy, Some(old_start)) => {
                self.driver
                    .wait_attr_changed(BAR_SELECTOR, "data-start", old_start, GROUP_TRANSITION_WAIT)
                    .await?
            }
            _ => {
                self.driver
                    .wait_replaced(BAR_SELECTOR, &bar.outer_html, GROUP_TRANSITION_WAIT)
                    .await?
            }
        };
        if !completed {
            return Err(DriverError::Timeout(
                GROUP_TRANSITION_WAIT,
                "group transition".to_string(),
            ));
        }
        tokio::time::sleep(self.delays.post_navigation()).await;
        Ok(AdvanceOutcome::MovedToNextGroup)
    }
}

fn sel(selector: &str) -> Selector {
    Selector::parse(selector).expect("invalid static selector")
}
