//! Idempotent rating-category filter application.
//!
//! The listing is filtered through a combobox-like trigger that opens a
//! floating options popup. Re-applying a filter that is already active must
//! be a pure no-op (label match alone, no popup interaction) so a restarted
//! session never re-triggers the listing reload.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use super::driver::{ClickTarget, DriverError, PageDriver};
use super::policy::DelayPolicy;
use super::types::RatingCategory;

/// The combobox-like filter trigger.
pub const FILTER_TRIGGER: &str = "div[role='combobox']";

/// The floating options popup.
pub const FILTER_POPUP: &str = "[data-radix-popper-content-wrapper]";

/// Placeholder label shown before any rating filter is applied.
const ALL_RATINGS_LABEL: &str = "모든 별점";

const TRIGGER_WAIT: Duration = Duration::from_secs(10);
const POPUP_WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("filter trigger did not appear")]
    TriggerMissing,

    #[error("options popup did not appear")]
    PopupMissing,

    #[error("no option matching '{0}' in the popup")]
    OptionMissing(String),

    #[error("options popup did not close after selection")]
    PopupStuck,

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Whether the filter was applied or already in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterApplication {
    AlreadyApplied,
    Applied,
}

pub struct FilterController<'a> {
    driver: &'a dyn PageDriver,
    delays: &'a dyn DelayPolicy,
}

impl<'a> FilterController<'a> {
    pub fn new(driver: &'a dyn PageDriver, delays: &'a dyn DelayPolicy) -> Self {
        Self { driver, delays }
    }

    /// Ensure the listing is filtered to `category`.
    ///
    /// Timeouts at any step surface as errors; the caller aborts the
    /// category's session rather than retrying here.
    pub async fn apply(
        &self,
        category: RatingCategory,
    ) -> Result<FilterApplication, FilterError> {
        if !self.driver.wait_for(FILTER_TRIGGER, TRIGGER_WAIT).await? {
            return Err(FilterError::TriggerMissing);
        }

        let label = self
            .driver
            .element_text(FILTER_TRIGGER)
            .await?
            .unwrap_or_default();
        if label.contains(category.label()) && !label.contains(ALL_RATINGS_LABEL) {
            debug!("filter '{}' already active, skipping", category.label());
            return Ok(FilterApplication::AlreadyApplied);
        }

        self.driver.scroll_into_view(FILTER_TRIGGER).await?;
        tokio::time::sleep(self.delays.pre_click()).await;
        let clicked = self
            .driver
            .click(&ClickTarget::Css {
                selector: FILTER_TRIGGER.to_string(),
            })
            .await?;
        if !clicked {
            return Err(FilterError::TriggerMissing);
        }

        if !self.driver.wait_for(FILTER_POPUP, POPUP_WAIT).await? {
            return Err(FilterError::PopupMissing);
        }

        let option_selector = format!("{} div", FILTER_POPUP);
        let clicked = self
            .driver
            .click(&ClickTarget::ByTextContains {
                selector: option_selector,
                text: category.label().to_string(),
            })
            .await?;
        if !clicked {
            return Err(FilterError::OptionMissing(category.label().to_string()));
        }

        // Popup closing is the signal that the listing started reloading.
        if !self.driver.wait_until_gone(FILTER_POPUP, POPUP_WAIT).await? {
            return Err(FilterError::PopupStuck);
        }

        // Let the asynchronous reload settle before the caller reads page
        // state.
        tokio::time::sleep(self.delays.filter_settle()).await;

        info!("filter '{}' applied", category.label());
        Ok(FilterApplication::Applied)
    }
}
