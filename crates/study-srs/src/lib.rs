//! SuperMemo-2 spaced-repetition scheduling.
//!
//! A pure implementation of the SM-2 review scheduler: [`review`] maps a
//! card's current [`CardState`] and a recall [`Quality`] grade to the next
//! state and the number of days until the card is due again.
//!
//! The crate is deliberately free of clocks and storage. Callers own the
//! mapping from [`Review::due_in_days`] to a calendar date, which must be
//! recomputed from "today" on every review.

use thiserror::Error;

/// Lower bound for the ease factor. SM-2 never lets a card become harder
/// than this, no matter how often it is failed.
pub const MIN_EASE_FACTOR: f64 = 1.3;

/// Ease factor assigned to cards that have never been reviewed.
pub const INITIAL_EASE_FACTOR: f64 = 2.5;

/// Fixed interval after the second successful repetition.
const SECOND_INTERVAL_DAYS: u32 = 6;

/// Errors produced when constructing a [`Quality`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GradeError {
    /// Recall grades are 0 through 5 inclusive.
    #[error("recall grade out of range: {0} (expected 0-5)")]
    OutOfRange(u8),
}

/// A recall grade on the 0-5 SM-2 scale.
///
/// Grades of 3 and above count as successful recall; 0-2 reset the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality(u8);

impl Quality {
    /// Construct a grade, rejecting values above 5.
    pub fn new(grade: u8) -> Result<Self, GradeError> {
        if grade > 5 {
            return Err(GradeError::OutOfRange(grade));
        }
        Ok(Self(grade))
    }

    /// The raw grade value.
    pub fn value(self) -> u8 {
        self.0
    }

    /// Whether this grade counts as successful recall (quality >= 3).
    pub fn is_recall(self) -> bool {
        self.0 >= 3
    }
}

impl TryFrom<u8> for Quality {
    type Error = GradeError;

    fn try_from(grade: u8) -> Result<Self, Self::Error> {
        Self::new(grade)
    }
}

/// Scheduling state carried by a single card.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CardState {
    /// Consecutive successful repetitions.
    pub repetition: u32,
    /// Days between the previous review and the next due date.
    pub interval_days: u32,
    /// SM-2 ease factor, clamped to [`MIN_EASE_FACTOR`].
    pub ease_factor: f64,
}

impl Default for CardState {
    fn default() -> Self {
        Self {
            repetition: 0,
            interval_days: 0,
            ease_factor: INITIAL_EASE_FACTOR,
        }
    }
}

/// The outcome of reviewing a card.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Review {
    /// The card's next scheduling state.
    pub state: CardState,
    /// Days until the card is due again, measured from the review itself.
    /// Always equal to `state.interval_days`.
    pub due_in_days: u32,
}

/// Apply one SM-2 review to `state`.
///
/// - quality < 3 resets `repetition` and `interval_days` to 0: the card is
///   due again immediately.
/// - quality >= 3 increments `repetition`; the interval schedule is 1 day,
///   then 6 days, then `round(previous_interval * ease_factor)`.
/// - The ease factor is updated on every call (successful or not) by the
///   SM-2 formula and clamped to [`MIN_EASE_FACTOR`].
pub fn review(state: CardState, quality: Quality) -> Review {
    let q = f64::from(quality.value());
    let ease_factor =
        (state.ease_factor + (0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02))).max(MIN_EASE_FACTOR);

    let (repetition, interval_days) = if quality.is_recall() {
        let repetition = state.repetition + 1;
        let interval_days = match repetition {
            1 => 1,
            2 => SECOND_INTERVAL_DAYS,
            _ => (f64::from(state.interval_days) * ease_factor).round() as u32,
        };
        (repetition, interval_days)
    } else {
        (0, 0)
    };

    Review {
        state: CardState {
            repetition,
            interval_days,
            ease_factor,
        },
        due_in_days: interval_days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn q(grade: u8) -> Quality {
        Quality::new(grade).unwrap()
    }

    #[test]
    fn grade_out_of_range_rejected() {
        assert_eq!(Quality::new(6), Err(GradeError::OutOfRange(6)));
        assert!(Quality::new(5).is_ok());
        assert!(Quality::new(0).is_ok());
    }

    #[test]
    fn fresh_card_perfect_recall() {
        // repetition=0, interval=0, ef=2.5, quality=5
        //   -> repetition=1, interval=1, ef=2.6
        let outcome = review(CardState::default(), q(5));
        assert_eq!(outcome.state.repetition, 1);
        assert_eq!(outcome.state.interval_days, 1);
        assert!((outcome.state.ease_factor - 2.6).abs() < 1e-9);
        assert_eq!(outcome.due_in_days, 1);
    }

    #[test]
    fn interval_schedule_1_6_then_scaled() {
        let mut state = CardState::default();

        let first = review(state, q(4));
        assert_eq!(first.state.interval_days, 1);
        state = first.state;

        let second = review(state, q(4));
        assert_eq!(second.state.interval_days, 6);
        state = second.state;

        let third = review(state, q(4));
        let expected = (6.0 * third.state.ease_factor).round() as u32;
        assert_eq!(third.state.interval_days, expected);
        assert_eq!(third.state.repetition, 3);
    }

    #[test]
    fn failure_resets_repetition_and_interval() {
        let state = CardState {
            repetition: 7,
            interval_days: 120,
            ease_factor: 2.1,
        };
        for grade in 0..3 {
            let outcome = review(state, q(grade));
            assert_eq!(outcome.state.repetition, 0);
            assert_eq!(outcome.state.interval_days, 0);
            assert_eq!(outcome.due_in_days, 0);
        }
    }

    #[test]
    fn ease_factor_clamped_at_floor() {
        let mut state = CardState {
            repetition: 0,
            interval_days: 0,
            ease_factor: 1.35,
        };
        // Repeated total blackouts drive the ease factor down; it must
        // never drop below the floor.
        for _ in 0..10 {
            state = review(state, q(0)).state;
        }
        assert!((state.ease_factor - MIN_EASE_FACTOR).abs() < 1e-9);
    }

    #[test]
    fn quality_three_barely_passes() {
        let outcome = review(CardState::default(), q(3));
        assert_eq!(outcome.state.repetition, 1);
        assert_eq!(outcome.state.interval_days, 1);
        // ef' = 2.5 + (0.1 - 2 * (0.08 + 2 * 0.02)) = 2.36
        assert!((outcome.state.ease_factor - 2.36).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn recall_strictly_increments_repetition(
            repetition in 0u32..1000,
            interval in 0u32..10_000,
            ef in 1.3f64..4.0,
            grade in 3u8..=5,
        ) {
            let state = CardState { repetition, interval_days: interval, ease_factor: ef };
            let outcome = review(state, q(grade));
            prop_assert_eq!(outcome.state.repetition, repetition + 1);
        }

        #[test]
        fn failure_resets_from_any_state(
            repetition in 0u32..1000,
            interval in 0u32..10_000,
            ef in 1.3f64..4.0,
            grade in 0u8..3,
        ) {
            let state = CardState { repetition, interval_days: interval, ease_factor: ef };
            let outcome = review(state, q(grade));
            prop_assert_eq!(outcome.state.repetition, 0);
            prop_assert_eq!(outcome.state.interval_days, 0);
        }

        #[test]
        fn ease_factor_never_below_floor(
            repetition in 0u32..1000,
            interval in 0u32..10_000,
            ef in 1.3f64..4.0,
            grade in 0u8..=5,
        ) {
            let state = CardState { repetition, interval_days: interval, ease_factor: ef };
            let outcome = review(state, q(grade));
            prop_assert!(outcome.state.ease_factor >= MIN_EASE_FACTOR);
        }

        #[test]
        fn due_matches_interval(
            repetition in 0u32..100,
            interval in 0u32..10_000,
            ef in 1.3f64..4.0,
            grade in 0u8..=5,
        ) {
            let state = CardState { repetition, interval_days: interval, ease_factor: ef };
            let outcome = review(state, q(grade));
            prop_assert_eq!(outcome.due_in_days, outcome.state.interval_days);
        }
    }
}
