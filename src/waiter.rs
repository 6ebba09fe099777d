//! Post-write propagation delay
//!
//! Downstream policy consumers reload on a polling interval, so a caller
//! must not assume a freshly written policy is in effect immediately.
//! The waiter is a pure scheduling delay, not a correctness mechanism.

use std::time::Duration;
use tracing::debug;

/// Where the calling harness runs; CI pollers are slower than local ones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationProfile {
    /// Continuous-integration environment (longer reload intervals)
    Ci,
    /// Developer workstation
    Local,
}

impl PropagationProfile {
    /// Pick a profile from the conventional `CI` environment variable
    pub fn detect() -> Self {
        match std::env::var("CI") {
            Ok(value) if !value.is_empty() && value != "0" && value != "false" => Self::Ci,
            _ => Self::Local,
        }
    }
}

/// Blocks the caller for a fixed interval after a successful write
#[derive(Debug, Clone)]
pub struct PropagationWaiter {
    profile: PropagationProfile,
    ci_delay: Duration,
    local_delay: Duration,
}

impl PropagationWaiter {
    /// Waiter with the default delays (10s in CI, 3s locally)
    pub fn new(profile: PropagationProfile) -> Self {
        Self {
            profile,
            ci_delay: Duration::from_secs(10),
            local_delay: Duration::from_secs(3),
        }
    }

    /// Waiter with explicit per-profile delays
    pub fn with_delays(profile: PropagationProfile, ci_delay: Duration, local_delay: Duration) -> Self {
        Self {
            profile,
            ci_delay,
            local_delay,
        }
    }

    /// The delay the current profile will sleep for
    pub fn delay(&self) -> Duration {
        match self.profile {
            PropagationProfile::Ci => self.ci_delay,
            PropagationProfile::Local => self.local_delay,
        }
    }

    /// Sleep for the profile's fixed interval
    pub async fn wait(&self) {
        let delay = self.delay();
        debug!(
            "Waiting {:?} for policy propagation ({:?} profile)",
            delay, self.profile
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_selects_delay() {
        let waiter = PropagationWaiter::with_delays(
            PropagationProfile::Ci,
            Duration::from_millis(20),
            Duration::from_millis(5),
        );
        assert_eq!(waiter.delay(), Duration::from_millis(20));

        let waiter = PropagationWaiter::with_delays(
            PropagationProfile::Local,
            Duration::from_millis(20),
            Duration::from_millis(5),
        );
        assert_eq!(waiter.delay(), Duration::from_millis(5));
    }

    #[tokio::test]
    async fn test_wait_returns_after_delay() {
        let waiter = PropagationWaiter::with_delays(
            PropagationProfile::Local,
            Duration::from_millis(1),
            Duration::from_millis(1),
        );

        let started = std::time::Instant::now();
        waiter.wait().await;
        assert!(started.elapsed() >= Duration::from_millis(1));
    }
}
