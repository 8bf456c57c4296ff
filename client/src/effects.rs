//! Countdown for the locally active timed effect

use crate::timer::{Scheduler, Task, TimerHandle};
use log::debug;
use shared::{Effect, EffectKind, COUNTDOWN_TICK_MS, EFFECT_NOMINAL_SECS};

/// What the HUD shows for the active effect
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountdownDisplay {
    pub kind: EffectKind,
    pub remaining_secs: u64,
    /// `remaining_secs` relative to the nominal duration, not the granted one
    pub percentage: f32,
}

pub struct EffectCountdown {
    tick_ms: u64,
    nominal_secs: u64,
    effect: Option<Effect>,
    display: Option<CountdownDisplay>,
    tick_timer: Option<TimerHandle>,
}

impl EffectCountdown {
    pub fn new(tick_ms: u64, nominal_secs: u64) -> Self {
        Self {
            tick_ms: tick_ms.max(1),
            nominal_secs: nominal_secs.max(1),
            effect: None,
            display: None,
            tick_timer: None,
        }
    }

    pub fn display(&self) -> Option<CountdownDisplay> {
        self.display
    }

    pub fn is_ticking(&self) -> bool {
        self.tick_timer.is_some()
    }

    /// Feeds the reconciler's current effect
    ///
    /// Supplying the effect that is already being counted is a no-op, even
    /// after it ran out; anything else restarts from the new expiry.
    pub fn set_effect(&mut self, effect: Option<&Effect>, now: u64, scheduler: &mut Scheduler) {
        if self.effect.as_ref() == effect {
            return;
        }
        self.cancel_tick(scheduler);
        self.effect = effect.copied();
        self.display = None;

        if let Some(effect) = self.effect {
            debug!("Counting down {:?} until {}", effect.kind, effect.expires_at);
            self.refresh(now, scheduler);
        }
    }

    /// Fired by the session for each countdown tick
    pub fn on_tick(&mut self, handle: TimerHandle, now: u64, scheduler: &mut Scheduler) {
        if self.tick_timer != Some(handle) {
            debug!("Ignoring stale countdown tick");
            return;
        }
        self.tick_timer = None;
        self.refresh(now, scheduler);
    }

    pub fn teardown(&mut self, scheduler: &mut Scheduler) {
        self.cancel_tick(scheduler);
        self.display = None;
    }

    fn refresh(&mut self, now: u64, scheduler: &mut Scheduler) {
        let Some(effect) = self.effect else {
            return;
        };
        let remaining_ms = effect.expires_at.saturating_sub(now);
        if remaining_ms == 0 {
            self.display = None;
            return;
        }

        let remaining_secs = remaining_ms.div_ceil(1000);
        self.display = Some(CountdownDisplay {
            kind: effect.kind,
            remaining_secs,
            percentage: remaining_secs as f32 / self.nominal_secs as f32 * 100.0,
        });
        self.tick_timer = Some(scheduler.schedule_at(now + self.tick_ms, Task::CountdownTick));
    }

    fn cancel_tick(&mut self, scheduler: &mut Scheduler) {
        if let Some(handle) = self.tick_timer.take() {
            scheduler.cancel(handle);
        }
    }
}

impl Default for EffectCountdown {
    fn default() -> Self {
        Self::new(COUNTDOWN_TICK_MS, EFFECT_NOMINAL_SECS)
    }
}
