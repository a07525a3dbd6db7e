//! The rollback engine: computes corrective state commands for the host.
//!
//! Idempotent by contract: issuing the same target for a player twice
//! produces one command. The engine only emits; the host applies the
//! correction to the client.

use dashmap::DashMap;
use glam::DVec3;
use warden_model::{PlayerId, RollbackCommand};

/// Tracks the last issued rollback per player to keep `rollback` idempotent.
pub struct RollbackEngine {
    last_issued: DashMap<PlayerId, RollbackCommand>,
}

impl RollbackEngine {
    /// Creates an empty rollback engine.
    pub fn new() -> Self {
        Self {
            last_issued: DashMap::new(),
        }
    }

    /// Requests a rollback of `player_id` to the given target state.
    ///
    /// Returns `Some(command)` when the host should act, `None` when an
    /// identical command was already issued (repeat calls with the same
    /// target have no additional effect).
    pub fn rollback(
        &self,
        player_id: PlayerId,
        target_position: DVec3,
        target_velocity: DVec3,
    ) -> Option<RollbackCommand> {
        let command = RollbackCommand {
            player_id,
            target_position,
            target_velocity,
        };

        match self.last_issued.get(&player_id) {
            Some(last) if *last == command => None,
            _ => {
                tracing::debug!(
                    player_id,
                    x = target_position.x,
                    y = target_position.y,
                    z = target_position.z,
                    "issuing rollback command"
                );
                self.last_issued.insert(player_id, command.clone());
                Some(command)
            }
        }
    }

    /// Forgets a player's last command (on disconnect).
    pub fn forget(&self, player_id: PlayerId) {
        self.last_issued.remove(&player_id);
    }
}

impl Default for RollbackEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollback_is_idempotent_for_identical_target() {
        let engine = RollbackEngine::new();
        let pos = DVec3::new(1.0, 64.0, 2.0);
        let vel = DVec3::ZERO;

        let first = engine.rollback(1, pos, vel);
        assert!(first.is_some());

        // Same target again: no additional effect.
        let second = engine.rollback(1, pos, vel);
        assert!(second.is_none());
    }

    #[test]
    fn test_new_target_issues_new_command() {
        let engine = RollbackEngine::new();
        let pos = DVec3::new(1.0, 64.0, 2.0);
        assert!(engine.rollback(1, pos, DVec3::ZERO).is_some());
        let moved = pos + DVec3::new(0.5, 0.0, 0.0);
        let cmd = engine.rollback(1, moved, DVec3::ZERO);
        assert_eq!(cmd.unwrap().target_position, moved);
    }

    #[test]
    fn test_players_tracked_independently() {
        let engine = RollbackEngine::new();
        let pos = DVec3::new(1.0, 64.0, 2.0);
        assert!(engine.rollback(1, pos, DVec3::ZERO).is_some());
        // Same target for a different player still issues.
        assert!(engine.rollback(2, pos, DVec3::ZERO).is_some());
    }

    #[test]
    fn test_forget_resets_idempotency() {
        let engine = RollbackEngine::new();
        let pos = DVec3::new(1.0, 64.0, 2.0);
        assert!(engine.rollback(1, pos, DVec3::ZERO).is_some());
        engine.forget(1);
        assert!(engine.rollback(1, pos, DVec3::ZERO).is_some());
    }
}
