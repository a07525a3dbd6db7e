//! The concurrent Player State Registry.

use std::sync::Arc;

use dashmap::DashMap;
use warden_config::HistoryConfig;
use warden_model::PlayerId;

use crate::player::PlayerState;

/// Concurrent per-player snapshot store.
///
/// Keyed by player id in a [`DashMap`]; each value is an immutable
/// [`PlayerState`] behind an `Arc`. Updates clone the current snapshot,
/// apply the mutation, check invariants, and replace the pointer while
/// holding the shard entry lock — so there is a single writer per key at
/// any instant and readers never observe a partially-updated record.
pub struct PlayerRegistry {
    players: DashMap<PlayerId, Arc<PlayerState>>,
    capacities: HistoryConfig,
}

impl PlayerRegistry {
    /// Creates an empty registry with the given history capacities.
    pub fn new(capacities: HistoryConfig) -> Self {
        Self {
            players: DashMap::new(),
            capacities,
        }
    }

    /// Returns the player's current snapshot, creating a fresh state on
    /// first sight.
    pub fn get_or_create(&self, player_id: PlayerId, now_ms: u64) -> Arc<PlayerState> {
        self.players
            .entry(player_id)
            .or_insert_with(|| Arc::new(PlayerState::new(player_id, now_ms, &self.capacities)))
            .clone()
    }

    /// Returns the player's current snapshot, if any.
    pub fn snapshot(&self, player_id: PlayerId) -> Option<Arc<PlayerState>> {
        self.players.get(&player_id).map(|r| r.clone())
    }

    /// Applies an all-or-nothing mutation and returns the new snapshot.
    ///
    /// The mutation runs on a clone of the current state under the entry
    /// lock. If the mutated state fails its invariant check the snapshot
    /// is considered corrupt: the mutation is discarded and the player is
    /// reset to a fresh state (logged, never propagated).
    pub fn update(
        &self,
        player_id: PlayerId,
        now_ms: u64,
        mutation: impl FnOnce(&mut PlayerState),
    ) -> Arc<PlayerState> {
        let mut entry = self
            .players
            .entry(player_id)
            .or_insert_with(|| Arc::new(PlayerState::new(player_id, now_ms, &self.capacities)));

        let mut next = PlayerState::clone(entry.value());
        mutation(&mut next);

        if next.invariants_hold() {
            *entry.value_mut() = Arc::new(next);
        } else {
            tracing::error!(
                player_id,
                "player state corruption detected; resetting to fresh snapshot"
            );
            *entry.value_mut() = Arc::new(PlayerState::new(player_id, now_ms, &self.capacities));
        }
        entry.value().clone()
    }

    /// Removes a player's state on disconnect. Returns `true` if a state
    /// existed.
    pub fn evict(&self, player_id: PlayerId) -> bool {
        self.players.remove(&player_id).is_some()
    }

    /// Number of tracked players.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Returns `true` if no players are tracked.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Ids of all tracked players.
    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|r| *r.key()).collect()
    }

    /// Evicts players whose last event is older than `idle_ms` before
    /// `now_ms`. Returns the evicted ids.
    pub fn evict_idle(&self, now_ms: u64, idle_ms: u64) -> Vec<PlayerId> {
        let cutoff = now_ms.saturating_sub(idle_ms);
        let idle: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|r| r.value().last_event_ms < cutoff)
            .map(|r| *r.key())
            .collect();
        for id in &idle {
            self.players.remove(id);
        }
        idle
    }
}
