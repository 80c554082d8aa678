//! Injectable pacing policies.
//!
//! Randomized delays are a disguise concern, not a navigation concern: the
//! session and navigator take a `DelayPolicy` so the core logic can run
//! deterministically (and instantly) under test.

use std::time::Duration;

use rand::Rng;

/// Pacing decisions made around page interactions.
pub trait DelayPolicy: Send + Sync {
    /// Pause before clicking an element, after scrolling it into view.
    fn pre_click(&self) -> Duration;

    /// Pause after a page-number or next-group click, while the listing
    /// re-renders.
    fn post_navigation(&self) -> Duration;

    /// Settle time after the filter popup closes and the listing reloads.
    fn filter_settle(&self) -> Duration;
}

/// Production policy: randomized, human-ish pacing to avoid a detectable
/// fixed cadence.
#[derive(Debug, Default)]
pub struct HumanizedDelays;

impl DelayPolicy for HumanizedDelays {
    fn pre_click(&self) -> Duration {
        let ms = rand::rng().random_range(200..=700);
        Duration::from_millis(ms)
    }

    fn post_navigation(&self) -> Duration {
        let ms = rand::rng().random_range(1_000..=2_500);
        Duration::from_millis(ms)
    }

    fn filter_settle(&self) -> Duration {
        Duration::from_secs(3)
    }
}

/// Test policy: fixed (typically zero) delays everywhere.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelays(pub Duration);

impl FixedDelays {
    pub fn none() -> Self {
        Self(Duration::ZERO)
    }
}

impl DelayPolicy for FixedDelays {
    fn pre_click(&self) -> Duration {
        self.0
    }

    fn post_navigation(&self) -> Duration {
        self.0
    }

    fn filter_settle(&self) -> Duration {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn humanized_post_navigation_stays_in_band() {
        let policy = HumanizedDelays;
        for _ in 0..50 {
            let d = policy.post_navigation();
            assert!(d >= Duration::from_millis(1_000));
            assert!(d <= Duration::from_millis(2_500));
        }
    }

    #[test]
    fn fixed_delays_are_constant() {
        let policy = FixedDelays::none();
        assert_eq!(policy.pre_click(), Duration::ZERO);
        assert_eq!(policy.post_navigation(), Duration::ZERO);
    }
}
