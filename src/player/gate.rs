use anyhow::Result;

use crate::provider::{AdCreative, Viewer};

pub const FREQUENCY_CAP_MS: u64 = 15 * 60 * 1_000;
pub const LAST_AD_SEEN_KEY: &str = "last_ad_seen_ms";

/// Key-value persistence for the ad frequency cap. The sqlite database
/// implements this; tests use [`MemoryState`].
pub trait StateStore {
    fn state_get(&self, key: &str) -> Result<Option<String>>;
    fn state_set(&self, key: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateState {
    Idle,
    AwaitingAd { pending_index: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayDecision {
    /// Viewer entitlements do not cover this title.
    AccessDenied,
    /// A previous decision already handed out an ad that has not completed.
    AdInProgress,
    ShowAd { ad: AdCreative },
    Proceed { episode_index: usize },
}

/// Decides whether a play request goes straight to content or through a
/// pre-roll ad first. While an ad is pending the gate refuses further
/// requests, and completing the ad releases the stored episode exactly once.
#[derive(Debug)]
pub struct AdGate {
    state: GateState,
}

impl AdGate {
    pub fn new() -> Self {
        Self {
            state: GateState::Idle,
        }
    }

    pub fn awaiting_ad(&self) -> bool {
        matches!(self.state, GateState::AwaitingAd { .. })
    }

    pub fn request_play(
        &mut self,
        viewer: Option<&Viewer>,
        premium: bool,
        requested_episode: Option<usize>,
        candidates: &[AdCreative],
        store: &dyn StateStore,
        now_ms: u64,
    ) -> PlayDecision {
        if self.awaiting_ad() {
            return PlayDecision::AdInProgress;
        }

        let allowed = match viewer {
            Some(viewer) => viewer.can_watch(premium),
            None => !premium,
        };
        if !allowed {
            return PlayDecision::AccessDenied;
        }

        let episode_index = requested_episode.unwrap_or(0);
        if !self.should_show_ad(viewer, store, now_ms) {
            return PlayDecision::Proceed { episode_index };
        }

        // Candidates arrive ranked, but selection must not depend on order.
        let Some(ad) = candidates.iter().max_by_key(|ad| ad.weight) else {
            return PlayDecision::Proceed { episode_index };
        };

        self.state = GateState::AwaitingAd {
            pending_index: episode_index,
        };
        PlayDecision::ShowAd { ad: ad.clone() }
    }

    fn should_show_ad(
        &self,
        viewer: Option<&Viewer>,
        store: &dyn StateStore,
        now_ms: u64,
    ) -> bool {
        if viewer.is_some_and(Viewer::exempt_from_ads) {
            return false;
        }
        match store.state_get(LAST_AD_SEEN_KEY) {
            Ok(Some(raw)) => match raw.parse::<u64>() {
                Ok(last_seen) => now_ms.saturating_sub(last_seen) >= FREQUENCY_CAP_MS,
                // Corrupt timestamp: show the ad and let completion rewrite it.
                Err(_) => true,
            },
            Ok(None) => true,
            Err(_) => true,
        }
    }

    /// Mark the pending ad finished (played out, skipped, or failed — all
    /// count) and release the stored episode. Returns `None` when no ad was
    /// pending. The frequency-cap write is best-effort.
    pub fn complete_ad(&mut self, store: &dyn StateStore, now_ms: u64) -> Option<usize> {
        let GateState::AwaitingAd { pending_index } = self.state else {
            return None;
        };
        self.state = GateState::Idle;
        let _ = store.state_set(LAST_AD_SEEN_KEY, &now_ms.to_string());
        Some(pending_index)
    }
}

impl Default for AdGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) struct MemoryState {
    values: std::cell::RefCell<std::collections::HashMap<String, String>>,
}

#[cfg(test)]
impl MemoryState {
    pub(crate) fn new() -> Self {
        Self {
            values: std::cell::RefCell::new(std::collections::HashMap::new()),
        }
    }

    pub(crate) fn seed(key: &str, value: &str) -> Self {
        let state = Self::new();
        state
            .values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        state
    }
}

#[cfg(test)]
impl StateStore for MemoryState {
    fn state_get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn state_set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Role;

    fn ad(id: &str, weight: u32) -> AdCreative {
        AdCreative {
            id: id.to_string(),
            video_url: format!("https://cdn.example.test/{id}.mp4"),
            link_url: None,
            skippable: true,
            skip_after_seconds: 5,
            weight,
            starts_at: None,
            ends_at: None,
        }
    }

    fn free_viewer() -> Viewer {
        Viewer {
            email: "viewer@example.test".to_string(),
            role: Role::User,
            paid: false,
        }
    }

    #[test]
    fn free_viewer_gets_heaviest_ad_regardless_of_order() {
        let mut gate = AdGate::new();
        let store = MemoryState::new();
        let candidates = vec![ad("low", 2), ad("high", 9), ad("mid", 5)];

        let decision = gate.request_play(
            Some(&free_viewer()),
            false,
            Some(3),
            &candidates,
            &store,
            1_000_000,
        );
        match decision {
            PlayDecision::ShowAd { ad } => assert_eq!(ad.id, "high"),
            other => panic!("expected ShowAd, got {other:?}"),
        }
        assert!(gate.awaiting_ad());
    }

    #[test]
    fn completion_releases_the_requested_episode_exactly_once() {
        let mut gate = AdGate::new();
        let store = MemoryState::new();
        let candidates = vec![ad("only", 1)];

        let decision =
            gate.request_play(Some(&free_viewer()), false, Some(7), &candidates, &store, 0);
        assert!(matches!(decision, PlayDecision::ShowAd { .. }));

        assert_eq!(gate.complete_ad(&store, 5_000), Some(7));
        assert_eq!(gate.complete_ad(&store, 6_000), None);
        assert_eq!(
            store.state_get(LAST_AD_SEEN_KEY).unwrap().as_deref(),
            Some("5000")
        );
    }

    #[test]
    fn requests_while_ad_pending_are_refused() {
        let mut gate = AdGate::new();
        let store = MemoryState::new();
        let candidates = vec![ad("only", 1)];

        gate.request_play(Some(&free_viewer()), false, Some(0), &candidates, &store, 0);
        let second =
            gate.request_play(Some(&free_viewer()), false, Some(1), &candidates, &store, 10);
        assert_eq!(second, PlayDecision::AdInProgress);
    }

    #[test]
    fn frequency_cap_suppresses_ads_within_fifteen_minutes() {
        let mut gate = AdGate::new();
        let now = 100 * 60 * 1_000;
        let recent = now - FREQUENCY_CAP_MS + 1;
        let store = MemoryState::seed(LAST_AD_SEEN_KEY, &recent.to_string());

        let decision =
            gate.request_play(Some(&free_viewer()), false, None, &[ad("only", 1)], &store, now);
        assert_eq!(decision, PlayDecision::Proceed { episode_index: 0 });

        // Exactly at the cap boundary the ad shows again.
        let stale = now - FREQUENCY_CAP_MS;
        let store = MemoryState::seed(LAST_AD_SEEN_KEY, &stale.to_string());
        let decision =
            gate.request_play(Some(&free_viewer()), false, None, &[ad("only", 1)], &store, now);
        assert!(matches!(decision, PlayDecision::ShowAd { .. }));
    }

    #[test]
    fn corrupt_cap_timestamp_shows_the_ad() {
        let mut gate = AdGate::new();
        let store = MemoryState::seed(LAST_AD_SEEN_KEY, "not-a-number");
        let decision =
            gate.request_play(Some(&free_viewer()), false, None, &[ad("only", 1)], &store, 0);
        assert!(matches!(decision, PlayDecision::ShowAd { .. }));
    }

    #[test]
    fn exempt_viewers_proceed_directly() {
        let store = MemoryState::new();
        let candidates = vec![ad("only", 1)];

        let paid = Viewer {
            paid: true,
            ..free_viewer()
        };
        let mut gate = AdGate::new();
        assert_eq!(
            gate.request_play(Some(&paid), true, Some(2), &candidates, &store, 0),
            PlayDecision::Proceed { episode_index: 2 }
        );

        let admin = Viewer {
            role: Role::Admin,
            ..free_viewer()
        };
        let mut gate = AdGate::new();
        assert_eq!(
            gate.request_play(Some(&admin), false, None, &candidates, &store, 0),
            PlayDecision::Proceed { episode_index: 0 }
        );
    }

    #[test]
    fn premium_access_is_checked_before_ads() {
        let mut gate = AdGate::new();
        let store = MemoryState::new();
        let candidates = vec![ad("only", 1)];

        assert_eq!(
            gate.request_play(Some(&free_viewer()), true, None, &candidates, &store, 0),
            PlayDecision::AccessDenied
        );
        assert_eq!(
            gate.request_play(None, true, None, &candidates, &store, 0),
            PlayDecision::AccessDenied
        );
        // Anonymous viewers can watch free titles, with ads.
        assert!(matches!(
            gate.request_play(None, false, None, &candidates, &store, 0),
            PlayDecision::ShowAd { .. }
        ));
    }

    #[test]
    fn empty_candidate_list_proceeds_without_ad() {
        let mut gate = AdGate::new();
        let store = MemoryState::new();
        assert_eq!(
            gate.request_play(Some(&free_viewer()), false, Some(4), &[], &store, 0),
            PlayDecision::Proceed { episode_index: 4 }
        );
        assert!(!gate.awaiting_ad());
    }
}
