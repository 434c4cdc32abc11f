use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Standard characters-per-word used for WPM.
pub const CHARS_PER_WORD: f64 = 5.0;

/// Lifecycle of one chunk activation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum Phase {
    Idle,
    InProgress,
    Complete,
}

/// How one reference char renders against the current input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CharState {
    Correct,
    Incorrect,
    /// Next char to type.
    Current,
    Pending,
}

/// Live metrics, a pure function of reference, input, start time and now.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingStats {
    pub wpm: u32,
    /// 0 to 100.
    pub accuracy: u32,
    pub correct_chars: usize,
    pub incorrect_chars: usize,
    pub total_chars: usize,
    pub time_elapsed_secs: f64,
}

/// Nothing typed yet: zero WPM, full accuracy.
impl Default for TypingStats {
    fn default() -> Self {
        Self::from_counts(0, 0, 0.0)
    }
}

impl TypingStats {
    pub fn compute(
        reference: &str,
        input: &str,
        started_at: Option<SystemTime>,
        now: SystemTime,
    ) -> Self {
        let mut expected = reference.chars();
        let (mut correct_chars, mut incorrect_chars) = (0, 0);
        for typed in input.chars() {
            if expected.next() == Some(typed) {
                correct_chars += 1;
            } else {
                incorrect_chars += 1;
            }
        }

        Self::from_counts(
            correct_chars,
            incorrect_chars,
            elapsed_secs(started_at, now),
        )
    }

    fn from_counts(correct_chars: usize, incorrect_chars: usize, time_elapsed_secs: f64) -> Self {
        let total_chars = correct_chars + incorrect_chars;
        Self {
            wpm: wpm(correct_chars, time_elapsed_secs),
            accuracy: accuracy(correct_chars, total_chars),
            correct_chars,
            incorrect_chars,
            total_chars,
            time_elapsed_secs,
        }
    }

    /// Folds chunk snapshots into one page or chapter figure. Char counts and
    /// elapsed time are summed; WPM and accuracy are recomputed from the sums.
    pub fn aggregate<'a, I>(snapshots: I) -> Self
    where
        I: IntoIterator<Item = &'a TypingStats>,
    {
        let (correct, incorrect, secs) = snapshots
            .into_iter()
            .fold((0, 0, 0.0), |(c, i, t), s| {
                (c + s.correct_chars, i + s.incorrect_chars, t + s.time_elapsed_secs)
            });
        Self::from_counts(correct, incorrect, secs)
    }
}

/// Seconds since `started_at`, never negative, zero before the first keystroke.
pub fn elapsed_secs(started_at: Option<SystemTime>, now: SystemTime) -> f64 {
    started_at
        .map(|start| now.duration_since(start).unwrap_or_default().as_secs_f64())
        .unwrap_or(0.0)
}

/// Correct chars over total, rounded; 100 before anything was typed.
pub fn accuracy(correct_chars: usize, total_chars: usize) -> u32 {
    if total_chars == 0 {
        return 100;
    }
    ((correct_chars as f64 / total_chars as f64) * 100.0).round() as u32
}

/// Only correct chars count as typed words.
pub fn wpm(correct_chars: usize, elapsed_secs: f64) -> u32 {
    if elapsed_secs <= 0.0 {
        return 0;
    }
    ((correct_chars as f64 / CHARS_PER_WORD) / (elapsed_secs / 60.0)).round() as u32
}

/// Why an input change was dropped without touching the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// Longer than the reference text.
    Overtype,
    /// The chunk already completed; input is frozen until reset.
    Frozen,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputResult {
    Rejected(Rejection),
    Accepted {
        stats: TypingStats,
        /// True exactly once per activation, on the change that completed it.
        completed: bool,
    },
}

impl InputResult {
    pub fn stats(&self) -> Option<TypingStats> {
        match self {
            InputResult::Accepted { stats, .. } => Some(*stats),
            InputResult::Rejected(_) => None,
        }
    }

    pub fn completed(&self) -> bool {
        matches!(self, InputResult::Accepted { completed: true, .. })
    }
}

/// Typing state for the active chunk.
///
/// Every accepted change rescores the whole input, so backspacing and
/// retyping can turn an earlier mistake into a correct char.
#[derive(Debug, Clone)]
pub struct TypingSession {
    reference: String,
    reference_len: usize,
    input: String,
    started_at: Option<SystemTime>,
    stats: TypingStats,
    completion: Option<TypingStats>,
}

impl TypingSession {
    pub fn new(reference: impl Into<String>) -> Self {
        let reference = reference.into();
        Self {
            reference_len: reference.chars().count(),
            reference,
            input: String::new(),
            started_at: None,
            stats: TypingStats::default(),
            completion: None,
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn started_at(&self) -> Option<SystemTime> {
        self.started_at
    }

    /// Snapshot from the last accepted change.
    pub fn stats(&self) -> TypingStats {
        self.stats
    }

    /// Snapshot taken at the moment of completion.
    pub fn completion_stats(&self) -> Option<TypingStats> {
        self.completion
    }

    pub fn phase(&self) -> Phase {
        match (self.completion, self.started_at) {
            (Some(_), _) => Phase::Complete,
            (None, Some(_)) => Phase::InProgress,
            (None, None) => Phase::Idle,
        }
    }

    pub fn has_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.completion.is_some()
    }

    pub fn on_input(&mut self, new_value: &str) -> InputResult {
        self.on_input_at(new_value, SystemTime::now())
    }

    /// Applies the full new input value observed at `now`.
    pub fn on_input_at(&mut self, new_value: &str, now: SystemTime) -> InputResult {
        if self.is_complete() {
            log::trace!("input ignored, chunk already complete");
            return InputResult::Rejected(Rejection::Frozen);
        }
        if new_value.chars().count() > self.reference_len {
            log::trace!("input ignored, overtype past end of chunk");
            return InputResult::Rejected(Rejection::Overtype);
        }
        // an unchanged value while idle is not a keystroke
        if self.started_at.is_none() && new_value == self.input {
            return InputResult::Accepted {
                stats: self.stats,
                completed: false,
            };
        }

        let started_at = *self.started_at.get_or_insert(now);
        self.input.clear();
        self.input.push_str(new_value);
        self.stats = TypingStats::compute(&self.reference, &self.input, Some(started_at), now);

        let completed = self.input == self.reference;
        if completed {
            self.completion = Some(self.stats);
            log::debug!(
                "chunk complete: {} wpm, {}% accuracy, {:.1}s",
                self.stats.wpm,
                self.stats.accuracy,
                self.stats.time_elapsed_secs
            );
        }

        InputResult::Accepted {
            stats: self.stats,
            completed,
        }
    }

    pub fn type_char(&mut self, c: char) -> InputResult {
        self.type_char_at(c, SystemTime::now())
    }

    /// Appends one keystroke to the current input.
    pub fn type_char_at(&mut self, c: char, now: SystemTime) -> InputResult {
        let mut next = self.input.clone();
        next.push(c);
        self.on_input_at(&next, now)
    }

    /// Appends pasted text to the current input.
    pub fn paste_at(&mut self, text: &str, now: SystemTime) -> InputResult {
        let next = format!("{}{}", self.input, text);
        self.on_input_at(&next, now)
    }

    pub fn backspace(&mut self) -> InputResult {
        self.backspace_at(SystemTime::now())
    }

    /// Removes the last typed char; a no-op on empty input.
    pub fn backspace_at(&mut self, now: SystemTime) -> InputResult {
        if self.input.is_empty() && !self.is_complete() {
            return InputResult::Accepted {
                stats: self.stats,
                completed: false,
            };
        }
        let mut next = self.input.clone();
        next.pop();
        self.on_input_at(&next, now)
    }

    /// Clears input, timer and completion for the same reference text.
    pub fn reset(&mut self) {
        self.input.clear();
        self.started_at = None;
        self.stats = TypingStats::default();
        self.completion = None;
    }

    /// Activates a new chunk.
    pub fn load(&mut self, reference: impl Into<String>) {
        *self = Self::new(reference);
    }

    /// Recomputes live stats for `now` without changing state, for timer
    /// refreshes between keystrokes. Frozen once complete.
    pub fn stats_at(&self, now: SystemTime) -> TypingStats {
        match self.completion {
            Some(done) => done,
            None => TypingStats::compute(&self.reference, &self.input, self.started_at, now),
        }
    }

    pub fn char_states(&self) -> Vec<CharState> {
        let mut typed = self.input.chars();
        let cursor = self.input.chars().count();
        self.reference
            .chars()
            .enumerate()
            .map(|(idx, expected)| match typed.next() {
                Some(c) if c == expected => CharState::Correct,
                Some(_) => CharState::Incorrect,
                None if idx == cursor => CharState::Current,
                None => CharState::Pending,
            })
            .collect()
    }

    /// Share of the chunk typed so far, rounded to a whole percent.
    pub fn progress_percent(&self) -> u32 {
        if self.reference_len == 0 {
            return 100;
        }
        let typed = self.input.chars().count();
        ((typed as f64 / self.reference_len as f64) * 100.0).round() as u32
    }
}
