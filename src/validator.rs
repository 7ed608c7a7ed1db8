//! Sequence counter continuity checking.
//!
//! A validator starts unseeded. The first real counter it sees becomes the
//! baseline; from then on every counter must be the successor of the one
//! before it, wrapping from `max_counter` back to `min_counter`. Anything else
//! is counted as one error, and checking continues from the value actually
//! observed.

use crate::decoder::DecodedRecord;
use crate::layout::FrameLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anomaly {
    /// The counter skipped ahead, samples were lost.
    Gap,
    /// The counter repeated or went backwards.
    Regression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Baseline,
    Valid,
    Error(Anomaly),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub classification: Classification,
    pub counter: u32,
    /// What the counter should have been; `None` for the baseline.
    pub expected: Option<u32>,
    pub error_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceState {
    pub seeded: bool,
    pub last_counter: u32,
    pub min_counter: u32,
    pub max_counter: u32,
    pub error_count: u64,
}

#[derive(Debug, Clone)]
pub struct SequenceValidator {
    state: SequenceState,
}

impl SequenceValidator {
    /// A validator for counters running `min_counter..=max_counter`.
    ///
    /// Panics if `min_counter > max_counter`.
    pub fn new(min_counter: u32, max_counter: u32) -> Self {
        assert!(min_counter <= max_counter, "empty counter range");

        Self {
            state: SequenceState {
                seeded: false,
                last_counter: 0,
                min_counter,
                max_counter,
                error_count: 0,
            },
        }
    }

    /// Counts 0..=max_counter, i.e. modulo `max_counter + 1`.
    pub fn modular(max_counter: u32) -> Self {
        Self::new(0, max_counter)
    }

    pub fn for_layout(layout: &FrameLayout) -> Self {
        Self::new(layout.min_counter(), layout.max_counter())
    }

    pub fn state(&self) -> &SequenceState {
        &self.state
    }

    pub fn error_count(&self) -> u64 {
        self.state.error_count
    }

    /// The last real counter value, if any was seen yet.
    pub fn last_counter(&self) -> Option<u32> {
        if self.state.seeded {
            Some(self.state.last_counter)
        } else {
            None
        }
    }

    fn successor(&self, counter: u32) -> u32 {
        if counter >= self.state.max_counter {
            self.state.min_counter
        } else {
            counter + 1
        }
    }

    /// How far `counter` is ahead of `last_counter`, going around the wrap.
    fn forward_distance(&self, counter: u32) -> u64 {
        let span = self.state.max_counter as i64 - self.state.min_counter as i64 + 1;
        (counter as i64 - self.state.last_counter as i64).rem_euclid(span) as u64
    }

    /// Checks one non-idle counter value against the previous one.
    pub fn classify(&mut self, counter: u32) -> Verdict {
        if !self.state.seeded {
            self.state.seeded = true;
            self.state.last_counter = counter;
            return Verdict {
                classification: Classification::Baseline,
                counter,
                expected: None,
                error_count: self.state.error_count,
            };
        }

        let expected = self.successor(self.state.last_counter);
        let classification = if counter == expected {
            Classification::Valid
        } else {
            let span = self.state.max_counter as u64 - self.state.min_counter as u64 + 1;
            let distance = self.forward_distance(counter);
            self.state.error_count += 1;
            if distance == 0 || distance > span / 2 {
                Classification::Error(Anomaly::Regression)
            } else {
                Classification::Error(Anomaly::Gap)
            }
        };

        // compare the next frame against what we actually got
        self.state.last_counter = counter;

        Verdict {
            classification,
            counter,
            expected: Some(expected),
            error_count: self.state.error_count,
        }
    }

    /// Like `classify`, but idle records are skipped without touching the
    /// state.
    pub fn observe(&mut self, record: &DecodedRecord) -> Option<Verdict> {
        if record.is_idle {
            None
        } else {
            Some(self.classify(record.counter))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(validator: &mut SequenceValidator, counters: &[u32]) -> Vec<Classification> {
        counters
            .iter()
            .map(|&c| validator.classify(c).classification)
            .collect()
    }

    #[test]
    fn contiguous_run_through_wrap_has_no_errors() {
        let mut validator = SequenceValidator::modular(255);
        let counters: Vec<u32> = (1..=255).chain(0..=40).chain(41..=255).chain(0..3).collect();
        run(&mut validator, &counters);
        assert_eq!(validator.error_count(), 0);
        assert_eq!(validator.last_counter(), Some(2));
    }

    #[test]
    fn contiguous_run_starting_mid_stream() {
        let mut validator = SequenceValidator::modular(255);
        let counters: Vec<u32> = (200..=255).chain(0..100).collect();
        let classes = run(&mut validator, &counters);
        assert_eq!(classes[0], Classification::Baseline);
        assert!(classes[1..].iter().all(|c| *c == Classification::Valid));
    }

    #[test]
    fn skipped_value_is_one_gap() {
        let mut validator = SequenceValidator::modular(255);
        let classes = run(&mut validator, &[3, 4, 5, 7, 8, 9]);
        assert_eq!(classes[3], Classification::Error(Anomaly::Gap));
        assert_eq!(validator.error_count(), 1);
    }

    #[test]
    fn repeated_value_is_one_regression() {
        let mut validator = SequenceValidator::modular(255);
        let classes = run(&mut validator, &[4, 5, 5, 6, 7]);
        assert_eq!(classes[2], Classification::Error(Anomaly::Regression));
        assert_eq!(classes[3], Classification::Valid);
        assert_eq!(validator.error_count(), 1);
    }

    #[test]
    fn backwards_step_is_a_regression() {
        let mut validator = SequenceValidator::modular(255);
        let classes = run(&mut validator, &[10, 11, 3, 4]);
        assert_eq!(classes[2], Classification::Error(Anomaly::Regression));
        assert_eq!(classes[3], Classification::Valid);
    }

    #[test]
    fn first_counter_is_never_an_error() {
        for &first in &[0, 1, 128, 255] {
            let mut validator = SequenceValidator::modular(255);
            let verdict = validator.classify(first);
            assert_eq!(verdict.classification, Classification::Baseline);
            assert_eq!(verdict.expected, None);
            assert_eq!(verdict.error_count, 0);
            assert!(validator.state().seeded);
        }
    }

    #[test]
    fn wrap_to_zero_is_valid_and_wrap_to_one_is_a_gap() {
        let mut validator = SequenceValidator::modular(255);
        validator.classify(255);
        assert_eq!(validator.classify(0).classification, Classification::Valid);

        let mut validator = SequenceValidator::modular(255);
        validator.classify(255);
        let verdict = validator.classify(1);
        assert_eq!(verdict.classification, Classification::Error(Anomaly::Gap));
        assert_eq!(verdict.expected, Some(0));
    }

    #[test]
    fn one_based_counters_wrap_past_zero() {
        let mut validator = SequenceValidator::for_layout(&FrameLayout::multi_channel());
        let classes = run(&mut validator, &[254, 255, 1, 2]);
        assert_eq!(
            classes,
            vec![
                Classification::Baseline,
                Classification::Valid,
                Classification::Valid,
                Classification::Valid
            ]
        );
    }

    #[test]
    fn idle_records_leave_state_alone() {
        let mut validator = SequenceValidator::for_layout(&FrameLayout::multi_channel());
        let idle = DecodedRecord {
            index: 0,
            counter: 0,
            status: None,
            is_idle: true,
        };
        assert_eq!(validator.observe(&idle), None);
        assert!(!validator.state().seeded);

        validator.classify(9);
        assert_eq!(validator.observe(&idle), None);
        assert_eq!(validator.last_counter(), Some(9));
        assert_eq!(validator.error_count(), 0);

        let next = DecodedRecord {
            counter: 10,
            is_idle: false,
            ..idle
        };
        let verdict = validator.observe(&next).unwrap();
        assert_eq!(verdict.classification, Classification::Valid);
    }

    #[test]
    fn sixteen_bit_wrap() {
        let mut validator = SequenceValidator::for_layout(&FrameLayout::counter16());
        let classes = run(&mut validator, &[65534, 65535, 0, 1]);
        assert_eq!(validator.error_count(), 0);
        assert_eq!(classes[2], Classification::Valid);
    }

    #[test]
    fn error_count_never_decreases() {
        let mut validator = SequenceValidator::modular(255);
        let mut last = 0;
        for &c in &[1, 3, 3, 4, 0, 1, 2, 200, 201] {
            let verdict = validator.classify(c);
            assert!(verdict.error_count >= last);
            last = verdict.error_count;
        }
        assert_eq!(last, 4);
    }

    #[test]
    #[should_panic(expected = "empty counter range")]
    fn inverted_range_is_refused() {
        SequenceValidator::new(10, 9);
    }

    #[test]
    fn single_value_range_only_repeats() {
        let mut validator = SequenceValidator::new(7, 7);
        validator.classify(7);
        assert_eq!(validator.classify(7).classification, Classification::Valid);
    }

    #[test]
    fn full_width_counter_wraps() {
        let mut validator = SequenceValidator::modular(u32::max_value());
        validator.classify(u32::max_value());
        assert_eq!(validator.classify(0).classification, Classification::Valid);
    }
}
