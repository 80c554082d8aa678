//! Record extraction from a rendered listing snapshot.
//!
//! The listing renders in two structurally different markups depending on
//! filter state: the legacy `sdp-review__*` class scheme and a redesigned
//! utility-class scheme. Every logical field tries the legacy selector first
//! and falls back to the redesigned one; a field missing in both takes an
//! empty/zero default. Only author and the star row are structurally
//! required - an item missing either is skipped, never emitted half-filled.

use std::time::Duration;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::driver::{DriverError, PageDriver};
use super::types::{RatingCategory, ReviewRecord};

/// Matches listing items in either markup.
pub const LISTING_ITEM_SELECTOR: &str =
    "article.sdp-review__article__list, article[class*='twc-pt-[16px]']";

/// Bounded wait for at least one listing item before taking a snapshot.
const LISTING_WAIT: Duration = Duration::from_secs(8);

/// Sentence fragment carrying the human-readable helpful count.
const HELPFUL_FRAGMENT: &str = "명에게 도움되었습니다";

/// Any star icon in the rating row, filled or empty.
const STAR_ICON_SELECTOR: &str = "i[class*='twc-bg-'][class*='star']";

/// Wait for the listing to render, then extract every parsable record.
///
/// A timeout waiting for the first item means "no reviews on this page" and
/// yields an empty vector, not an error.
pub async fn extract_current_page<D: PageDriver + ?Sized>(
    driver: &D,
    category: RatingCategory,
) -> Result<Vec<ReviewRecord>, DriverError> {
    if !driver.wait_for(LISTING_ITEM_SELECTOR, LISTING_WAIT).await? {
        debug!("no listing items rendered within {LISTING_WAIT:?}");
        return Ok(Vec::new());
    }
    let html = driver.content().await?;
    Ok(extract_records(&html, category))
}

/// Parse all review records out of a listing snapshot.
pub fn extract_records(html: &str, category: RatingCategory) -> Vec<ReviewRecord> {
    let doc = Html::parse_document(html);
    let item_sel = sel(LISTING_ITEM_SELECTOR);

    let mut records = Vec::new();
    for item in doc.select(&item_sel) {
        if let Some(record) = extract_item(item, category) {
            records.push(record);
        }
    }
    records
}

fn extract_item(item: ElementRef<'_>, category: RatingCategory) -> Option<ReviewRecord> {
    // Required fields: a missing author or star row drops the whole item.
    let author = first_text(item, "span[data-member-id]")?;

    // The star row renders one icon per star, filled or empty. Zero filled
    // icons is a valid zero rating; no icons at all means the item is not a
    // review.
    let icons: Vec<_> = item.select(&sel(STAR_ICON_SELECTOR)).collect();
    if icons.is_empty() {
        return None;
    }
    let filled_stars = icons
        .iter()
        .filter(|i| {
            i.attr("class")
                .is_some_and(|c| c.contains("twc-bg-full-star"))
        })
        .count();
    let star_rating = filled_stars.min(5) as u8;

    let date = first_text(item, "div.sdp-review__article__list__info__product-info__reg-date")
        .or_else(|| star_row_sibling_text(item))
        .unwrap_or_default();

    let purchase_option =
        first_text(item, "div.sdp-review__article__list__info__product-info__name")
            .or_else(|| first_text(item, "div[class*='twc-my-[16px]']"))
            .unwrap_or_default();

    let title = first_text(item, "div.sdp-review__article__list__headline")
        .or_else(|| first_text(item, "div[class*='twc-mb-[8px]'][class*='twc-font-bold']"))
        .unwrap_or_default();

    let body = first_text(item, "div.sdp-review__article__list__review__content")
        .or_else(|| first_text(item, "div[class*='twc-break-all']"))
        .unwrap_or_default();

    let helpful_count = helpful_count(item);

    Some(ReviewRecord {
        rating_category: category,
        author,
        star_rating,
        date,
        purchase_option,
        title,
        body,
        helpful_count,
    })
}

/// Helpful count: a numeric data attribute when present, otherwise digit
/// extraction from the "N명에게 도움되었습니다" sentence. Defaults to 0.
fn helpful_count(item: ElementRef<'_>) -> u32 {
    let help_sel = sel("div.sdp-review__article__list__help");
    if let Some(el) = item.select(&help_sel).next() {
        if let Some(count) = el.attr("data-count").and_then(|v| v.trim().parse().ok()) {
            return count;
        }
    }

    let div_sel = sel("div");
    item.select(&div_sel)
        .filter_map(|el| {
            let text = own_text(el);
            text.contains(HELPFUL_FRAGMENT).then_some(text)
        })
        // Nested wrappers repeat the sentence; the innermost carrier has the
        // shortest text.
        .min_by_key(|t| t.len())
        .and_then(|t| parse_helpful_text(&t))
        .unwrap_or(0)
}

/// Parse "1,234명에게 도움되었습니다." into 1234.
pub fn parse_helpful_text(text: &str) -> Option<u32> {
    let prefix = text.split('명').next()?;
    let digits: String = prefix.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Redesigned-layout date fallback: the element immediately following the
/// row of star icons.
fn star_row_sibling_text(item: ElementRef<'_>) -> Option<String> {
    let star_sel = sel(STAR_ICON_SELECTOR);
    let star = item.select(&star_sel).next()?;
    let row = ElementRef::wrap(star.parent()?)?;
    let sibling = row
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .next()?;
    let text = collected_text(sibling);
    (!text.is_empty()).then_some(text)
}

fn first_text(item: ElementRef<'_>, selector: &str) -> Option<String> {
    let s = sel(selector);
    let text = collected_text(item.select(&s).next()?);
    (!text.is_empty()).then_some(text)
}

/// Whole-subtree text, whitespace-collapsed.
fn collected_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Direct text content including descendants (used for helpful-count search).
fn own_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn sel(selector: &str) -> Selector {
    // Selectors in this module are compile-time constants.
    Selector::parse(selector).expect("invalid static selector")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_item(author: &str, stars: usize, helpful_attr: Option<u32>) -> String {
        let stars_html = "<i class=\"twc-bg-full-star\"></i>".repeat(stars);
        let help = match helpful_attr {
            Some(n) => format!(
                "<div class=\"sdp-review__article__list__help\" data-count=\"{n}\">도움</div>"
            ),
            None => String::new(),
        };
        format!(
            r#"<article class="sdp-review__article__list">
                <span data-member-id="u1">{author}</span>
                <div>{stars_html}</div>
                <div class="sdp-review__article__list__info__product-info__reg-date">2025.08.01</div>
                <div class="sdp-review__article__list__info__product-info__name">옵션: 블랙</div>
                <div class="sdp-review__article__list__headline">제목입니다</div>
                <div class="sdp-review__article__list__review__content">본문입니다</div>
                {help}
            </article>"#
        )
    }

    fn redesigned_item(author: &str, stars: usize, helpful_text: &str) -> String {
        let stars_html = "<i class=\"twc-bg-full-star twc-h-4\"></i>".repeat(stars);
        format!(
            r#"<article class="twc-pt-[16px] twc-border-b">
                <span data-member-id="u2">{author}</span>
                <div class="twc-flex"><div>{stars_html}</div><div>2025.07.15</div></div>
                <div class="twc-my-[16px]">옵션: 화이트</div>
                <div class="twc-mb-[8px] twc-font-bold">새 제목</div>
                <div class="twc-break-all">새 본문</div>
                <div>{helpful_text}</div>
            </article>"#
        )
    }

    #[test]
    fn legacy_item_extracts_all_fields() {
        let html = legacy_item("리뷰어", 4, Some(7));
        let records = extract_records(&html, RatingCategory::Best);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.author, "리뷰어");
        assert_eq!(r.star_rating, 4);
        assert_eq!(r.date, "2025.08.01");
        assert_eq!(r.purchase_option, "옵션: 블랙");
        assert_eq!(r.title, "제목입니다");
        assert_eq!(r.body, "본문입니다");
        assert_eq!(r.helpful_count, 7);
        assert_eq!(r.rating_category, RatingCategory::Best);
    }

    #[test]
    fn redesigned_item_uses_fallback_selectors() {
        let html = redesigned_item("새리뷰어", 5, "12명에게 도움되었습니다.");
        let records = extract_records(&html, RatingCategory::Good);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.author, "새리뷰어");
        assert_eq!(r.star_rating, 5);
        assert_eq!(r.date, "2025.07.15");
        assert_eq!(r.purchase_option, "옵션: 화이트");
        assert_eq!(r.title, "새 제목");
        assert_eq!(r.body, "새 본문");
        assert_eq!(r.helpful_count, 12);
    }

    #[test]
    fn helpful_text_with_thousand_separator() {
        assert_eq!(parse_helpful_text("1,234명에게 도움되었습니다."), Some(1234));
        assert_eq!(parse_helpful_text("4명에게 도움되었습니다."), Some(4));
        assert_eq!(parse_helpful_text("명에게 도움되었습니다."), None);
    }

    #[test]
    fn item_without_author_is_skipped_not_partial() {
        let html = format!(
            "{}{}",
            legacy_item("정상", 3, None),
            r#"<article class="sdp-review__article__list">
                <div><i class="twc-bg-full-star"></i></div>
                <div class="sdp-review__article__list__review__content">작성자 없음</div>
            </article>"#
        );
        let records = extract_records(&html, RatingCategory::Average);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].author, "정상");
    }

    #[test]
    fn item_without_star_row_is_skipped() {
        let html = r#"<article class="sdp-review__article__list">
            <span data-member-id="u9">별없음</span>
        </article>"#;
        let records = extract_records(html, RatingCategory::Poor);
        assert!(records.is_empty());
    }

    #[test]
    fn zero_filled_stars_is_a_valid_rating() {
        // A rendered star row of empty icons is a zero rating, not a
        // structural defect.
        let html = r#"<article class="twc-pt-[16px]">
            <span data-member-id="u7">영점</span>
            <div class="twc-flex">
                <div>
                    <i class="twc-bg-empty-star"></i><i class="twc-bg-empty-star"></i>
                    <i class="twc-bg-empty-star"></i><i class="twc-bg-empty-star"></i>
                    <i class="twc-bg-empty-star"></i>
                </div>
                <div>2025.06.10</div>
            </div>
            <div class="twc-break-all">실망스러워요</div>
        </article>"#;
        let records = extract_records(html, RatingCategory::Worst);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].star_rating, 0);
        assert_eq!(records[0].date, "2025.06.10");
        assert_eq!(records[0].body, "실망스러워요");
    }

    #[test]
    fn mixed_star_row_counts_only_filled_icons() {
        let html = r#"<article class="sdp-review__article__list">
            <span data-member-id="u8">혼합</span>
            <div>
                <i class="twc-bg-full-star"></i><i class="twc-bg-full-star"></i>
                <i class="twc-bg-empty-star"></i><i class="twc-bg-empty-star"></i>
                <i class="twc-bg-empty-star"></i>
            </div>
        </article>"#;
        let records = extract_records(html, RatingCategory::Average);
        assert_eq!(records[0].star_rating, 2);
    }

    #[test]
    fn missing_optional_fields_default_to_empty() {
        let html = r#"<article class="twc-pt-[16px]">
            <span data-member-id="u3">간단</span>
            <div><i class="twc-bg-full-star"></i><i class="twc-bg-full-star"></i></div>
        </article>"#;
        let records = extract_records(html, RatingCategory::Worst);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.star_rating, 2);
        assert_eq!(r.title, "");
        assert_eq!(r.body, "");
        assert_eq!(r.helpful_count, 0);
    }

    #[test]
    fn star_count_is_capped_at_five() {
        let html = legacy_item("많은별", 7, None);
        let records = extract_records(&html, RatingCategory::Best);
        assert_eq!(records[0].star_rating, 5);
    }

    #[test]
    fn empty_snapshot_yields_no_records() {
        assert!(extract_records("<html><body></body></html>", RatingCategory::Best).is_empty());
    }
}
