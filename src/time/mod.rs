//! Time models - when each level is due to react
//!
//! A time model is a pure function from the time of a level's last
//! consistent state to the time of its next one.

pub mod schedule;

use std::fmt;

use crate::core::error::TimeModelError;
use crate::core::types::SimulationTime;

pub use schedule::DueQueue;

/// Per-level clock
///
/// `next_due` must be deterministic and return a time strictly after
/// `current`. The engine checks this on every call.
pub trait TimeModel: Send + Sync {
    fn next_due(&self, current: SimulationTime) -> Result<SimulationTime, TimeModelError>;
}

/// Calls `model.next_due` and rejects results that do not advance
pub fn checked_next_due(
    model: &dyn TimeModel,
    current: SimulationTime,
) -> Result<SimulationTime, TimeModelError> {
    let next = model.next_due(current)?;
    if next <= current {
        return Err(TimeModelError::NotAdvancing { current, next });
    }
    Ok(next)
}

/// Periodic clock with an optional phase shift
///
/// Due times are `initial + phase_shift + k * period`. With a positive shift
/// the first reaction happens at `initial + phase_shift`; without one it
/// happens one period after `initial`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicTimeModel {
    period: i64,
    phase_shift: i64,
    initial: SimulationTime,
}

impl PeriodicTimeModel {
    pub fn new(period: i64, phase_shift: i64, initial: SimulationTime) -> Result<Self, TimeModelError> {
        if period <= 0 {
            return Err(TimeModelError::NonPositivePeriod(period));
        }
        if phase_shift < 0 || phase_shift >= period {
            return Err(TimeModelError::PhaseShiftOutOfRange { phase_shift, period });
        }
        Ok(Self {
            period,
            phase_shift,
            initial,
        })
    }

    /// Period without phase shift, starting at `initial`
    pub fn every(period: i64, initial: SimulationTime) -> Result<Self, TimeModelError> {
        Self::new(period, 0, initial)
    }

    pub fn period(&self) -> i64 {
        self.period
    }

    pub fn phase_shift(&self) -> i64 {
        self.phase_shift
    }

    pub fn initial(&self) -> SimulationTime {
        self.initial
    }
}

impl TimeModel for PeriodicTimeModel {
    fn next_due(&self, current: SimulationTime) -> Result<SimulationTime, TimeModelError> {
        let overflow = || TimeModelError::Overflow(current);
        let anchor = self.initial.0.checked_add(self.phase_shift).ok_or_else(overflow)?;

        if current.0 < anchor {
            return Ok(SimulationTime(anchor));
        }

        let elapsed = current.0.checked_sub(anchor).ok_or_else(overflow)?;
        let steps = elapsed.div_euclid(self.period) + 1;
        steps
            .checked_mul(self.period)
            .and_then(|offset| anchor.checked_add(offset))
            .map(SimulationTime)
            .ok_or_else(overflow)
    }
}

/// Clock defined by an arbitrary rule
pub struct CustomTimeModel {
    rule: Box<dyn Fn(SimulationTime) -> Option<SimulationTime> + Send + Sync>,
}

impl CustomTimeModel {
    pub fn new(rule: impl Fn(SimulationTime) -> SimulationTime + Send + Sync + 'static) -> Self {
        Self {
            rule: Box::new(move |current| Some(rule(current))),
        }
    }

    /// Fires exactly at the listed times, then never again
    ///
    /// Asking for a due time after the last entry is a fatal time-model
    /// error. Pair it with an end criterion that stops the run before the
    /// schedule is exhausted.
    pub fn from_schedule(mut times: Vec<SimulationTime>) -> Self {
        times.sort();
        times.dedup();
        Self {
            rule: Box::new(move |current| times.iter().copied().find(|&t| t > current)),
        }
    }
}

impl fmt::Debug for CustomTimeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomTimeModel").finish_non_exhaustive()
    }
}

impl TimeModel for CustomTimeModel {
    fn next_due(&self, current: SimulationTime) -> Result<SimulationTime, TimeModelError> {
        (self.rule)(current).ok_or(TimeModelError::Exhausted(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn t(ticks: i64) -> SimulationTime {
        SimulationTime(ticks)
    }

    #[test]
    fn test_periodic_without_shift() {
        let model = PeriodicTimeModel::every(1, t(0)).unwrap();
        let mut current = t(0);
        let mut seen = vec![current];
        for _ in 0..5 {
            current = model.next_due(current).unwrap();
            seen.push(current);
        }
        assert_eq!(seen, vec![t(0), t(1), t(2), t(3), t(4), t(5)]);
    }

    #[test]
    fn test_periodic_with_phase_shift() {
        let model = PeriodicTimeModel::new(3, 1, t(0)).unwrap();
        assert_eq!(model.next_due(t(0)).unwrap(), t(1));
        assert_eq!(model.next_due(t(1)).unwrap(), t(4));
        assert_eq!(model.next_due(t(2)).unwrap(), t(4));
        assert_eq!(model.next_due(t(4)).unwrap(), t(7));
    }

    #[test]
    fn test_periodic_rejects_bad_parameters() {
        assert_eq!(
            PeriodicTimeModel::every(0, t(0)).unwrap_err(),
            TimeModelError::NonPositivePeriod(0)
        );
        assert_eq!(
            PeriodicTimeModel::every(-2, t(0)).unwrap_err(),
            TimeModelError::NonPositivePeriod(-2)
        );
        assert_eq!(
            PeriodicTimeModel::new(2, 2, t(0)).unwrap_err(),
            TimeModelError::PhaseShiftOutOfRange { phase_shift: 2, period: 2 }
        );
    }

    #[test]
    fn test_periodic_overflow_is_reported() {
        let model = PeriodicTimeModel::every(10, t(0)).unwrap();
        assert!(matches!(
            model.next_due(t(i64::MAX - 1)),
            Err(TimeModelError::Overflow(_))
        ));
    }

    #[test]
    fn test_checked_next_due_rejects_stalling_rule() {
        let model = CustomTimeModel::new(|current| current);
        assert_eq!(
            checked_next_due(&model, t(5)).unwrap_err(),
            TimeModelError::NotAdvancing { current: t(5), next: t(5) }
        );
    }

    #[test]
    fn test_schedule_model() {
        let model = CustomTimeModel::from_schedule(vec![t(7), t(2), t(4), t(4)]);
        assert_eq!(checked_next_due(&model, t(0)).unwrap(), t(2));
        assert_eq!(checked_next_due(&model, t(2)).unwrap(), t(4));
        assert_eq!(checked_next_due(&model, t(5)).unwrap(), t(7));
        assert_eq!(
            checked_next_due(&model, t(7)).unwrap_err(),
            TimeModelError::Exhausted(t(7))
        );
    }

    #[test]
    fn test_custom_rule_may_reach_the_last_tick() {
        let model = CustomTimeModel::new(|_| t(i64::MAX));
        assert_eq!(checked_next_due(&model, t(3)).unwrap(), t(i64::MAX));
    }

    proptest! {
        #[test]
        fn prop_periodic_advances_on_grid(
            period in 1i64..50,
            shift_seed in 0i64..50,
            initial in -1000i64..1000,
            offset in 0i64..10_000,
        ) {
            let phase_shift = shift_seed % period;
            let model = PeriodicTimeModel::new(period, phase_shift, t(initial)).unwrap();
            let current = t(initial + offset);
            let next = checked_next_due(&model, current).unwrap();

            prop_assert!(next > current);
            prop_assert_eq!((next.0 - initial - phase_shift).rem_euclid(period), 0);
            // No grid point is skipped
            prop_assert!(next.0 - current.0 <= period);
        }
    }
}
