//! One category's collection session.
//!
//! Drives the loop {read pagination state → extract current page if
//! unvisited → check target → advance} with a consecutive-failure ceiling
//! separating transient DOM hiccups from a structurally broken (or
//! blocking) page.

use tracing::{debug, info, warn};

use super::driver::{DriverError, PageDriver};
use super::extract::extract_current_page;
use super::filter::FilterController;
use super::pagination::{AdvanceOutcome, Navigator};
use super::policy::DelayPolicy;
use super::types::{
    PaginationState, RatingCategory, ReviewRecord, SessionOutcome, TerminationReason,
    VisitedPages,
};

pub struct CollectionSession<'a> {
    driver: &'a dyn PageDriver,
    delays: &'a dyn DelayPolicy,
    category: RatingCategory,
    target: usize,
    failure_ceiling: u32,
}

/// What one loop iteration decided.
enum Step {
    Continue { extracted: bool },
    Done(TerminationReason),
}

impl<'a> CollectionSession<'a> {
    pub fn new(
        driver: &'a dyn PageDriver,
        delays: &'a dyn DelayPolicy,
        category: RatingCategory,
        target: usize,
        failure_ceiling: u32,
    ) -> Self {
        Self {
            driver,
            delays,
            category,
            target,
            failure_ceiling,
        }
    }

    /// Apply the category filter, then collect until the target count or a
    /// termination condition is reached. Never returns an error: failures
    /// are absorbed into the outcome's termination reason.
    pub async fn run(&self) -> SessionOutcome {
        let filter = FilterController::new(self.driver, self.delays);
        if let Err(e) = filter.apply(self.category).await {
            warn!("[{}] filter application failed: {e}", self.category);
            return SessionOutcome::empty(TerminationReason::FilterFailed);
        }

        let navigator = Navigator::new(self.driver, self.delays);
        let mut collected: Vec<ReviewRecord> = Vec::new();
        let mut visited = VisitedPages::new();
        let mut consecutive_failures: u32 = 0;

        let reason = loop {
            match self
                .iteration(&navigator, &mut collected, &mut visited, &mut consecutive_failures)
                .await
            {
                Ok(Step::Done(reason)) => break reason,
                Ok(Step::Continue { extracted }) => {
                    if !extracted {
                        // An advance that was reported successful but led to
                        // no new records made no progress; a page stuck in
                        // place would otherwise loop until the wall-clock
                        // deadline.
                        consecutive_failures += 1;
                        warn!(
                            "[{}] iteration made no progress ({consecutive_failures}/{})",
                            self.category, self.failure_ceiling
                        );
                        if consecutive_failures >= self.failure_ceiling {
                            break TerminationReason::RepeatedFailure;
                        }
                    }
                }
                Err(e) => {
                    consecutive_failures += 1;
                    warn!(
                        "[{}] iteration failed ({consecutive_failures}/{}): {e}",
                        self.category, self.failure_ceiling
                    );
                    if consecutive_failures >= self.failure_ceiling {
                        break TerminationReason::RepeatedFailure;
                    }
                    tokio::time::sleep(self.delays.post_navigation()).await;
                }
            }
        };

        collected.truncate(self.target);
        info!(
            "[{}] session finished: {} records over {} pages ({reason:?})",
            self.category,
            collected.len(),
            visited.len()
        );
        SessionOutcome {
            records: collected,
            pages_visited: visited.len(),
            termination_reason: reason,
        }
    }

    async fn iteration(
        &self,
        navigator: &Navigator<'_>,
        collected: &mut Vec<ReviewRecord>,
        visited: &mut VisitedPages,
        failures: &mut u32,
    ) -> Result<Step, DriverError> {
        // The DOM is the sole source of truth; re-read everything.
        let bar = navigator.locate().await?;
        let state = PaginationState::derive(bar.as_ref(), visited);
        let current = state.current_page_index;

        let mut extracted = false;
        if !visited.contains(&current) {
            let records = extract_current_page(self.driver, self.category).await?;
            if records.is_empty() {
                if bar.is_none() && current == 1 && collected.is_empty() {
                    // Empty category: page 1 has nothing and there is no
                    // pagination. Not a fault.
                    return Ok(Step::Done(TerminationReason::EmptyResult));
                }
                // Re-render noise; give the listing a moment and move on.
                debug!("[{}] page {current} yielded no records", self.category);
                tokio::time::sleep(self.delays.post_navigation()).await;
            } else {
                debug!(
                    "[{}] page {current}: {} records (total {})",
                    self.category,
                    records.len(),
                    collected.len() + records.len()
                );
                collected.extend(records);
                visited.insert(current);
                // The counter resets the moment records land, before any
                // advance attempt in the same pass can fail.
                *failures = 0;
                extracted = true;
            }
        }

        if collected.len() >= self.target {
            return Ok(Step::Done(TerminationReason::TargetReached));
        }

        let Some(bar) = bar else {
            // Single page of results; nothing left to advance to.
            return Ok(Step::Done(TerminationReason::NoMorePages));
        };

        match navigator.advance(&bar, visited).await? {
            AdvanceOutcome::NoMorePages => Ok(Step::Done(TerminationReason::NoMorePages)),
            AdvanceOutcome::MovedToPage(_) | AdvanceOutcome::MovedToNextGroup => {
                Ok(Step::Continue { extracted })
            }
        }
    }
}
