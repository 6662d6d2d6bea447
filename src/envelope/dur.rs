//! Duration envelope: auto-release lifetime for fire-and-forget grains.

// -------------------------------------------------------------------------------------------------

/// Duration envelope config for a grain: an optional total lifetime in
/// ticks, counted from the grain's spawn.
///
/// When the limit is reached the owning grain auto-triggers its release
/// stage, regardless of which stage it currently is in, without needing an
/// external release signal. This is what makes dense fire-and-forget
/// granular textures possible. A [`DurEnv::sustained`] grain has no limit
/// and keeps sounding until explicitly released.
///
/// The release stage itself is not part of the lifetime: a grain with a
/// 50-tick duration and a 10-tick release returns to idle by tick 60.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DurEnv {
    total_ticks: Option<u32>,
}

impl DurEnv {
    /// A lifetime of `total_ticks` ticks, after which the grain releases
    /// itself.
    pub fn ticks(total_ticks: u32) -> Self {
        Self {
            total_ticks: Some(total_ticks),
        }
    }

    /// No automatic expiry: the grain sustains until explicitly released.
    pub fn sustained() -> Self {
        Self { total_ticks: None }
    }

    /// The configured lifetime, or None when sustained.
    pub fn total_ticks(&self) -> Option<u32> {
        self.total_ticks
    }

    /// True when a grain that has lived for `elapsed_total` ticks should
    /// enter its release stage now.
    #[inline]
    pub fn expired(&self, elapsed_total: u32) -> bool {
        self.total_ticks.is_some_and(|total| elapsed_total >= total)
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_at_the_configured_tick() {
        let env = DurEnv::ticks(50);
        assert!(!env.expired(0));
        assert!(!env.expired(49));
        assert!(env.expired(50));
        assert!(env.expired(51));
    }

    #[test]
    fn sustained_never_expires() {
        let env = DurEnv::sustained();
        assert!(!env.expired(u32::MAX));
    }

    #[test]
    fn zero_lifetime_expires_immediately() {
        assert!(DurEnv::ticks(0).expired(0));
    }
}
