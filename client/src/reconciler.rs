//! Holds the latest authoritative snapshot and the view state derived from it

use crate::timer::{Scheduler, Task, TimerHandle};
use log::{debug, info};
use shared::{Effect, Phase, Snapshot, DEATH_REVERT_DELAY_MS};

/// Owns the current snapshot, the "showing game" flag and the pending
/// death revert. Nothing else writes these.
pub struct Reconciler {
    snapshot: Option<Snapshot>,
    showing_game: bool,
    active_effect: Option<Effect>,
    revert_delay_ms: u64,
    revert_timer: Option<TimerHandle>,
}

impl Reconciler {
    pub fn new(revert_delay_ms: u64) -> Self {
        Self {
            snapshot: None,
            showing_game: false,
            active_effect: None,
            revert_delay_ms,
            revert_timer: None,
        }
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn phase(&self) -> Option<Phase> {
        self.snapshot.as_ref().map(|s| s.phase)
    }

    pub fn showing_game(&self) -> bool {
        self.showing_game
    }

    /// First effect of the local player, if that player is alive
    pub fn active_effect(&self) -> Option<&Effect> {
        self.active_effect.as_ref()
    }

    pub fn revert_pending(&self) -> bool {
        self.revert_timer.is_some()
    }

    /// Replaces the held snapshot and re-derives the view state
    pub fn on_snapshot(
        &mut self,
        snapshot: Snapshot,
        local_id: Option<&str>,
        now: u64,
        scheduler: &mut Scheduler,
    ) {
        let phase = snapshot.phase;
        let local = local_id
            .and_then(|id| snapshot.player(id))
            .map(|player| (player.alive, player.effects.first().copied()));
        self.snapshot = Some(snapshot);

        match phase {
            Phase::Lobby => {
                self.cancel_revert(scheduler);
                self.showing_game = false;
            }
            Phase::Playing | Phase::Finished => match local {
                Some((false, _)) => {
                    if self.showing_game && self.revert_timer.is_none() {
                        info!(
                            "Local player died, leaving game view in {}ms",
                            self.revert_delay_ms
                        );
                        self.revert_timer = Some(
                            scheduler.schedule_at(now + self.revert_delay_ms, Task::DeathRevert),
                        );
                    }
                }
                Some((true, _)) => {
                    if self.cancel_revert(scheduler) {
                        debug!("Local player alive again, revert cancelled");
                    }
                    if phase == Phase::Playing {
                        self.showing_game = true;
                    }
                }
                // Absent local player leaves the view and any pending revert as they are
                None => {}
            },
        }

        self.active_effect = match local {
            Some((true, effect)) => effect,
            _ => None,
        };
    }

    /// Fired by the session when the death revert timer comes due
    pub fn on_revert_due(&mut self, handle: TimerHandle) {
        if self.revert_timer != Some(handle) {
            debug!("Ignoring stale death revert");
            return;
        }
        self.revert_timer = None;
        self.showing_game = false;
        info!("Returning to lobby view");
    }

    pub fn teardown(&mut self, scheduler: &mut Scheduler) {
        self.cancel_revert(scheduler);
    }

    fn cancel_revert(&mut self, scheduler: &mut Scheduler) -> bool {
        match self.revert_timer.take() {
            Some(handle) => scheduler.cancel(handle),
            None => false,
        }
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(DEATH_REVERT_DELAY_MS)
    }
}
