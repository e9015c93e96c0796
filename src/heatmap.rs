use std::collections::BTreeMap;

/// Physical key rows of the on-screen keyboard, top to bottom.
pub const KEYBOARD_LAYOUT: [&str; 5] = [
    "`1234567890-=",
    "qwertyuiop[]\\",
    "asdfghjkl;'",
    "zxcvbnm,./",
    " ",
];

/// The closed set of keys every heatmap starts from.
pub fn layout_keys() -> impl Iterator<Item = char> {
    KEYBOARD_LAYOUT.iter().flat_map(|row| row.chars())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn from_count(count: u32) -> Self {
        match count {
            0 => Severity::None,
            1..=2 => Severity::Low,
            3..=5 => Severity::Medium,
            _ => Severity::High,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyHeat {
    pub key: char,
    pub errors: u32,
    pub severity: Severity,
    /// the key the next correct press lands on
    pub next: bool,
}

fn fold_case(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Per-key error counts for one session plus the next key to press.
#[derive(Debug, Clone)]
pub struct HeatmapTracker {
    counts: BTreeMap<char, u32>,
    next_expected: Option<char>,
}

impl Default for HeatmapTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HeatmapTracker {
    pub fn new() -> Self {
        Self {
            counts: layout_keys().map(|k| (k, 0)).collect(),
            next_expected: None,
        }
    }

    /// Zero every layout key and drop anything typed outside the layout.
    pub fn reset(&mut self, first_expected: Option<char>) {
        *self = Self::new();
        self.next_expected = first_expected;
    }

    pub fn record_miss(&mut self, typed: char) {
        *self.counts.entry(fold_case(typed)).or_insert(0) += 1;
    }

    pub fn errors(&self, key: char) -> u32 {
        self.counts.get(&fold_case(key)).copied().unwrap_or(0)
    }

    pub fn severity(&self, key: char) -> Severity {
        Severity::from_count(self.errors(key))
    }

    pub fn set_next_expected(&mut self, next: Option<char>) {
        self.next_expected = next;
    }

    pub fn next_expected(&self) -> Option<char> {
        self.next_expected
    }

    /// Whether `key` on the layout should be highlighted as the next press.
    pub fn is_next(&self, key: char) -> bool {
        self.next_expected
            .map(|c| fold_case(c) == fold_case(key))
            .unwrap_or(false)
    }

    /// Layout keys in row order with their counts and severities.
    pub fn layout_heat(&self) -> Vec<KeyHeat> {
        layout_keys()
            .map(|key| {
                let errors = self.errors(key);
                KeyHeat {
                    key,
                    errors,
                    severity: Severity::from_count(errors),
                    next: self.is_next(key),
                }
            })
            .collect()
    }

    /// All tracked entries, including keys outside the layout.
    pub fn counts(&self) -> &BTreeMap<char, u32> {
        &self.counts
    }
}
