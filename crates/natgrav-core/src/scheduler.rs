//! Rate limiting for the per-step work.
//!
//! Every step applies forces. Every `skip_ticks` steps membership is
//! refreshed, and every `skip_extra_ticks` refreshes the asteroid scan queue
//! is rebuilt. Both counters start preloaded so the first step after the
//! warm-up does a refresh and a rebuild.

use crate::config::SessionConfig;

/// What the session should do this step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickPlan {
    /// Still warming up: do nothing at all.
    pub warming_up: bool,
    /// Apply forces to members and the observer.
    pub apply_forces: bool,
    /// Recompute membership of every field.
    pub refresh_membership: bool,
    /// Rebuild the asteroid scan queue.
    pub rebuild_scan_queue: bool,
}

/// Counter state machine. Runs for the lifetime of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickScheduler {
    warmup_remaining: u32,
    fast: u32,
    slow: u32,
    skip_ticks: u32,
    skip_extra_ticks: u32,
}

impl TickScheduler {
    /// A scheduler with the periods from `config`. Zero periods count as 1.
    pub fn new(config: &SessionConfig) -> Self {
        let skip_ticks = config.skip_ticks.max(1);
        let skip_extra_ticks = config.skip_extra_ticks.max(1);
        Self {
            warmup_remaining: config.warmup_ticks,
            fast: skip_ticks.saturating_sub(1),
            slow: skip_extra_ticks.saturating_sub(1),
            skip_ticks,
            skip_extra_ticks,
        }
    }

    /// Advance by one step.
    pub const fn advance(&mut self) -> TickPlan {
        if self.warmup_remaining > 0 {
            self.warmup_remaining = self.warmup_remaining.saturating_sub(1);
            return TickPlan {
                warming_up: true,
                apply_forces: false,
                refresh_membership: false,
                rebuild_scan_queue: false,
            };
        }

        let mut plan = TickPlan {
            warming_up: false,
            apply_forces: true,
            refresh_membership: false,
            rebuild_scan_queue: false,
        };

        self.fast = self.fast.saturating_add(1);
        if self.fast >= self.skip_ticks {
            self.fast = 0;
            plan.refresh_membership = true;

            self.slow = self.slow.saturating_add(1);
            if self.slow >= self.skip_extra_ticks {
                self.slow = 0;
                plan.rebuild_scan_queue = true;
            }
        }
        plan
    }

    /// Whether the warm-up is still running.
    pub const fn is_warming_up(&self) -> bool {
        self.warmup_remaining > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(warmup: u32, skip: u32, extra: u32) -> TickScheduler {
        TickScheduler::new(&SessionConfig {
            warmup_ticks: warmup,
            skip_ticks: skip,
            skip_extra_ticks: extra,
            ..SessionConfig::default()
        })
    }

    #[test]
    fn warmup_steps_do_nothing() {
        let mut s = scheduler(3, 10, 30);
        for _ in 0..3 {
            assert!(s.is_warming_up());
            let plan = s.advance();
            assert!(plan.warming_up);
            assert!(!plan.apply_forces);
        }
        assert!(!s.is_warming_up());
        assert!(s.advance().apply_forces);
    }

    #[test]
    fn first_step_after_warmup_refreshes_and_rebuilds() {
        let mut s = scheduler(0, 10, 30);
        let plan = s.advance();
        assert!(plan.refresh_membership);
        assert!(plan.rebuild_scan_queue);
    }

    #[test]
    fn refresh_every_skip_ticks_and_rebuild_every_extra() {
        let mut s = scheduler(0, 10, 3);
        let plans: Vec<TickPlan> = (0..100).map(|_| s.advance()).collect();
        let refreshes: Vec<usize> = plans
            .iter()
            .enumerate()
            .filter(|(_, p)| p.refresh_membership)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(refreshes, vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90]);
        let rebuilds: Vec<usize> = plans
            .iter()
            .enumerate()
            .filter(|(_, p)| p.rebuild_scan_queue)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(rebuilds, vec![0, 30, 60, 90]);
        assert!(plans.iter().all(|p| p.apply_forces));
    }

    #[test]
    fn zero_periods_behave_as_every_step() {
        let mut s = scheduler(0, 0, 0);
        for _ in 0..5 {
            let plan = s.advance();
            assert!(plan.refresh_membership && plan.rebuild_scan_queue);
        }
    }
}
