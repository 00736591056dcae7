use super::phase::Phase;

/// Identity of one running interval: the phase and the anchor it counts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalKey {
    pub phase: Phase,
    pub anchor_ms: i64,
}

/// Reentrancy guard for phase transitions.
///
/// Each interval may cross zero exactly once. Ticks that keep observing zero
/// before the new phase is anchored, or a late snapshot that replays an
/// interval already handled, are rejected by [`TransitionGuard::claim`].
#[derive(Debug, Clone, Default)]
pub struct TransitionGuard {
    handled: Option<IntervalKey>,
}

impl TransitionGuard {
    /// Returns `true` the first time `key` is claimed.
    pub fn claim(&mut self, key: IntervalKey) -> bool {
        if self.handled == Some(key) {
            return false;
        }
        self.handled = Some(key);
        true
    }

    /// Give the claim back so the next tick retries (the transition failed).
    pub fn release(&mut self, key: IntervalKey) {
        if self.handled == Some(key) {
            self.handled = None;
        }
    }

    pub fn is_handled(&self, key: IntervalKey) -> bool {
        self.handled == Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(anchor_ms: i64) -> IntervalKey {
        IntervalKey {
            phase: Phase::Active,
            anchor_ms,
        }
    }

    #[test]
    fn claims_once_per_interval() {
        let mut guard = TransitionGuard::default();
        assert!(guard.claim(key(10)));
        assert!(!guard.claim(key(10)));
        assert!(!guard.claim(key(10)));
        assert!(guard.claim(key(20)));
    }

    #[test]
    fn release_allows_retry() {
        let mut guard = TransitionGuard::default();
        assert!(guard.claim(key(10)));
        guard.release(key(10));
        assert!(!guard.is_handled(key(10)));
        assert!(guard.claim(key(10)));
    }

    #[test]
    fn release_of_other_key_is_ignored() {
        let mut guard = TransitionGuard::default();
        guard.claim(key(10));
        guard.release(key(99));
        assert!(guard.is_handled(key(10)));
    }
}
