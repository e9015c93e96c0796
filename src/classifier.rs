//! Positional comparison of typed input against the target passage.
//!
//! Substitutions and insertions are labelled as each keystroke arrives.
//! Omissions cannot be observed as events, so they are only settled once
//! typing stops.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Correct,
    /// typed character differs from the target at the same position
    Substitution,
    /// typed past the end of the passage
    Insertion,
}

impl Outcome {
    pub fn is_error(self) -> bool {
        !matches!(self, Outcome::Correct)
    }
}

/// Classify the character about to be appended at `position`.
pub fn classify(typed: char, position: usize, passage: &[char]) -> Outcome {
    match passage.get(position) {
        Some(&expected) if expected == typed => Outcome::Correct,
        Some(_) => Outcome::Substitution,
        None => Outcome::Insertion,
    }
}

/// Positions in the overlap where input matches the passage.
pub fn correct_count(input: &[char], passage: &[char]) -> usize {
    input
        .iter()
        .zip(passage.iter())
        .filter(|(typed, expected)| typed == expected)
        .count()
}

/// Passage characters never reached by the input.
pub fn omissions(input_len: usize, passage_len: usize) -> usize {
    passage_len.saturating_sub(input_len)
}

/// Live error total, recomputed from scratch rather than accumulated.
///
/// Counts mismatches in the overlap, surplus typed characters, and passage
/// characters not yet reached. It can disagree with [`ErrorCounters`] once the
/// user has backspaced over a mistake, since the counters never decrement.
pub fn snapshot_error_count(input: &[char], passage: &[char]) -> usize {
    let overlap = input.len().min(passage.len());
    let mismatched = overlap - correct_count(input, passage);
    mismatched + input.len().saturating_sub(passage.len()) + omissions(input.len(), passage.len())
}

/// Incremental error breakdown for a single session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ErrorCounters {
    pub substitutions: usize,
    pub insertions: usize,
    /// stale until [`ErrorCounters::finalize`] runs at completion
    pub omissions: usize,
}

impl ErrorCounters {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Correct => {}
            Outcome::Substitution => self.substitutions += 1,
            Outcome::Insertion => self.insertions += 1,
        }
    }

    pub fn finalize(&mut self, input_len: usize, passage_len: usize) {
        self.omissions = omissions(input_len, passage_len);
    }

    pub fn total(&self) -> usize {
        self.substitutions + self.insertions + self.omissions
    }
}
