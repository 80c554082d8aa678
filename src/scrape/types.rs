//! Core data types for the collection engine.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Rating filter categories, in the order they are collected.
///
/// Labels are the localized strings the storefront renders; they double as
/// the text matched against the filter combobox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingCategory {
    Best,
    Good,
    Average,
    Poor,
    Worst,
}

impl RatingCategory {
    /// All categories, in collection order.
    pub const ALL: [RatingCategory; 5] = [
        RatingCategory::Best,
        RatingCategory::Good,
        RatingCategory::Average,
        RatingCategory::Poor,
        RatingCategory::Worst,
    ];

    /// The label as rendered by the storefront's filter UI.
    pub fn label(&self) -> &'static str {
        match self {
            RatingCategory::Best => "최고",
            RatingCategory::Good => "좋음",
            RatingCategory::Average => "보통",
            RatingCategory::Poor => "별로",
            RatingCategory::Worst => "나쁨",
        }
    }

    /// Parse a category from either the English name or the rendered label.
    pub fn parse(s: &str) -> Option<Self> {
        let needle = s.trim();
        Self::ALL.iter().copied().find(|c| {
            c.label() == needle || format!("{:?}", c).eq_ignore_ascii_case(needle)
        })
    }
}

impl std::fmt::Display for RatingCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One normalized review, immutable once extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub rating_category: RatingCategory,
    pub author: String,
    /// Derived by counting filled-star markers, 0..=5.
    pub star_rating: u8,
    /// Source-formatted date string.
    pub date: String,
    pub purchase_option: String,
    pub title: String,
    pub body: String,
    pub helpful_count: u32,
}

/// Markup shape of the pagination bar, re-detected on every navigation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiVariant {
    Legacy,
    Redesigned,
    /// No pagination bar rendered at all; a single page of results.
    SinglePage,
}

/// Pagination state derived from the live DOM for one iteration.
///
/// Never cached across navigations; the DOM may silently reset the visible
/// page group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationState {
    pub ui_variant: UiVariant,
    pub current_page_index: u32,
    pub group_boundary_reached: bool,
}

/// Read-only configuration for one collection run.
#[derive(Debug, Clone)]
pub struct CollectionTarget {
    pub max_records_per_category: usize,
    pub rating_categories: Vec<RatingCategory>,
}

impl Default for CollectionTarget {
    fn default() -> Self {
        Self {
            max_records_per_category: 100,
            rating_categories: RatingCategory::ALL.to_vec(),
        }
    }
}

/// Why a collection session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    TargetReached,
    NoMorePages,
    FilterFailed,
    RepeatedFailure,
    EmptyResult,
}

/// Result of one category's collection session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub records: Vec<ReviewRecord>,
    pub pages_visited: usize,
    pub termination_reason: TerminationReason,
}

impl SessionOutcome {
    pub fn empty(reason: TerminationReason) -> Self {
        Self {
            records: Vec::new(),
            pages_visited: 0,
            termination_reason: reason,
        }
    }
}

/// Set of page indices already extracted within one session.
///
/// Only grows; a page index is inserted at most once. This is the de-dup
/// backstop for the at-least-once navigation contract.
pub type VisitedPages = BTreeSet<u32>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parses_label_and_name() {
        assert_eq!(RatingCategory::parse("최고"), Some(RatingCategory::Best));
        assert_eq!(RatingCategory::parse("best"), Some(RatingCategory::Best));
        assert_eq!(RatingCategory::parse("Worst"), Some(RatingCategory::Worst));
        assert_eq!(RatingCategory::parse("모든 별점"), None);
    }

    #[test]
    fn category_order_is_stable() {
        let labels: Vec<_> = RatingCategory::ALL.iter().map(|c| c.label()).collect();
        assert_eq!(labels, vec!["최고", "좋음", "보통", "별로", "나쁨"]);
    }
}
