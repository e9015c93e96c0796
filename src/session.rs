//! The session state machine.
//!
//! All legal transitions live in [`SessionMachine::dispatch`]. Time is passed
//! in as milliseconds from an arbitrary monotonic origin, so the machine never
//! reads a clock itself apart from the wall-clock date stamped on saved
//! records.

use crate::catalog::{Passage, PassageCatalog};
use crate::classifier::{classify, snapshot_error_count, ErrorCounters};
use crate::error::{EngineError, Result};
use crate::heatmap::{HeatmapTracker, KeyHeat};
use crate::metrics::{self, LiveMetrics, MIN_ELAPSED_SECS};
use crate::profile::{ProfileBackend, SessionScore, UserProfile, UserProfileStore};
use crate::time_series::MetricHistory;
use tracing::{debug, info, trace};

/// Characters a user may type past the end of the passage.
pub const OVERFLOW_MARGIN: usize = 100;

/// Countdown starts here and counts down once per second.
pub const COUNTDOWN_FROM: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum State {
    Menu,
    ParagraphSelect,
    UserSelect,
    CreateUser,
    Countdown,
    Typing,
    Results,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keystroke {
    Char(char),
    Backspace,
    Submit,
    Escape,
}

/// Everything the presentation layer can ask of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Tick,
    Key(Keystroke),
    StartSession,
    OpenParagraphSelect,
    ChooseParagraph(usize),
    OpenUserSelect,
    ChooseUser(String),
    OpenCreateUser,
    Restart,
    Back,
}

/// Fire-and-forget cues for audio or visual feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Signal {
    KeyCorrect,
    KeyError,
    SessionStart,
    SessionComplete,
}

/// Final numbers for a submitted session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Completion {
    pub metrics: LiveMetrics,
    pub breakdown: ErrorCounters,
    pub consistency: f64,
    /// false for guest play, which is never saved
    pub recorded: bool,
    /// the record reached the profile backend
    pub saved: bool,
}

/// Read-only view handed to the renderer.
#[derive(Debug)]
pub struct Snapshot<'a> {
    pub state: State,
    pub input: &'a [char],
    pub passage: &'a Passage,
    pub live: LiveMetrics,
    pub countdown: i64,
    pub next_expected: Option<char>,
    pub heatmap: Vec<KeyHeat>,
    pub history: &'a MetricHistory,
    pub completion: Option<&'a Completion>,
    pub passages: &'a PassageCatalog,
    pub selected_passage: usize,
    pub users: Vec<&'a str>,
    pub current_user: Option<&'a str>,
    pub profile: Option<&'a UserProfile>,
    pub name_draft: &'a str,
}

#[derive(Debug)]
pub struct SessionMachine<B: ProfileBackend> {
    state: State,
    catalog: PassageCatalog,
    selected: usize,
    passage: Passage,
    input: Vec<char>,
    counters: ErrorCounters,
    heatmap: HeatmapTracker,
    history: MetricHistory,
    live: LiveMetrics,
    countdown_anchor_ms: u64,
    countdown: i64,
    started_at_ms: Option<u64>,
    completion: Option<Completion>,
    store: UserProfileStore<B>,
    current_user: Option<String>,
    name_draft: String,
    signals: Vec<Signal>,
}

impl<B: ProfileBackend> SessionMachine<B> {
    pub fn new(catalog: PassageCatalog, store: UserProfileStore<B>) -> Self {
        let passage = catalog
            .get(0)
            .cloned()
            .unwrap_or_else(|| Passage::new(crate::catalog::PLACEHOLDER_TEXT));
        Self {
            state: State::Menu,
            catalog,
            selected: 0,
            passage,
            input: Vec::new(),
            counters: ErrorCounters::default(),
            heatmap: HeatmapTracker::new(),
            history: MetricHistory::new(),
            live: LiveMetrics::default(),
            countdown_anchor_ms: 0,
            countdown: COUNTDOWN_FROM,
            started_at_ms: None,
            completion: None,
            store,
            current_user: None,
            name_draft: String::new(),
            signals: Vec::new(),
        }
    }

    /// Routes an intent through the transition table. Intents that have no
    /// meaning in the current state are ignored.
    pub fn dispatch(&mut self, intent: Intent, now_ms: u64) -> Result<()> {
        match (self.state, intent) {
            (_, Intent::Tick) => self.tick(now_ms),
            (State::Typing, Intent::Key(key)) => return self.apply_keystroke(key, now_ms),
            (State::CreateUser, Intent::Key(key)) => return self.edit_name(key),
            (State::Menu, Intent::StartSession) => {
                let passage = self.passage_for_selection();
                self.reset(passage, now_ms);
            }
            (State::Results, Intent::Restart) => {
                let passage = self.passage.clone();
                self.reset(passage, now_ms);
            }
            (State::Menu, Intent::OpenParagraphSelect) => self.transition(State::ParagraphSelect),
            (State::ParagraphSelect, Intent::ChooseParagraph(idx)) => {
                self.select_paragraph(idx);
                self.transition(State::Menu);
            }
            (State::Menu, Intent::OpenUserSelect) => self.transition(State::UserSelect),
            (State::UserSelect, Intent::ChooseUser(name)) => {
                self.select_user(&name)?;
                self.transition(State::Menu);
            }
            (State::UserSelect, Intent::OpenCreateUser) => {
                self.name_draft.clear();
                self.transition(State::CreateUser);
            }
            (
                State::ParagraphSelect | State::UserSelect | State::CreateUser | State::Results,
                Intent::Back,
            ) => self.transition(State::Menu),
            (state, intent) => trace!(%state, ?intent, "intent ignored"),
        }
        Ok(())
    }

    /// Clears the attempt and starts the countdown for `passage`.
    pub fn reset(&mut self, passage: Passage, now_ms: u64) {
        self.input.clear();
        self.counters = ErrorCounters::default();
        self.history.clear();
        self.live = LiveMetrics::default();
        self.heatmap.reset(passage.char_at(0));
        self.passage = passage;
        self.started_at_ms = None;
        self.completion = None;
        self.countdown = COUNTDOWN_FROM;
        self.countdown_anchor_ms = now_ms;
        self.transition(State::Countdown);
    }

    pub fn tick(&mut self, now_ms: u64) {
        match self.state {
            State::Countdown => self.tick_countdown(now_ms),
            State::Typing => self.tick_typing(now_ms),
            _ => {}
        }
    }

    fn tick_countdown(&mut self, now_ms: u64) {
        let whole_secs = (now_ms.saturating_sub(self.countdown_anchor_ms) / 1000) as i64;
        self.countdown = COUNTDOWN_FROM - whole_secs;
        if self.countdown <= 0 {
            self.started_at_ms = Some(now_ms);
            self.transition(State::Typing);
            self.signals.push(Signal::SessionStart);
        }
    }

    fn tick_typing(&mut self, now_ms: u64) {
        let passage = self.passage.chars();
        let elapsed_ms = self
            .started_at_ms
            .map(|start| now_ms.saturating_sub(start))
            .unwrap_or(0);
        if elapsed_ms == 0 {
            self.live.errors = snapshot_error_count(&self.input, passage);
            return;
        }

        self.live = LiveMetrics::compute(&self.input, passage, elapsed_ms);
        self.history.record(elapsed_ms, self.live.wpm);
    }

    /// Handles one key while typing; ignored in every other state.
    pub fn apply_keystroke(&mut self, key: Keystroke, now_ms: u64) -> Result<()> {
        if self.state != State::Typing {
            trace!(state = %self.state, ?key, "keystroke outside typing ignored");
            return Ok(());
        }

        match key {
            Keystroke::Char(c) => self.type_char(c),
            Keystroke::Backspace => {
                self.input.pop();
                self.refresh_next_expected();
            }
            Keystroke::Submit => return self.complete(now_ms),
            Keystroke::Escape => {
                debug!(typed = self.input.len(), "session abandoned");
                self.input.clear();
                self.started_at_ms = None;
                self.transition(State::Menu);
            }
        }
        Ok(())
    }

    fn type_char(&mut self, c: char) {
        if self.input.len() >= self.passage.len() + OVERFLOW_MARGIN {
            return;
        }

        let outcome = classify(c, self.input.len(), self.passage.chars());
        self.counters.record(outcome);
        if outcome.is_error() {
            self.heatmap.record_miss(c);
            self.signals.push(Signal::KeyError);
        } else {
            self.signals.push(Signal::KeyCorrect);
        }
        trace!(typed = %c, position = self.input.len(), ?outcome, "keystroke");

        self.input.push(c);
        self.refresh_next_expected();
    }

    fn refresh_next_expected(&mut self) {
        self.heatmap
            .set_next_expected(self.passage.char_at(self.input.len()));
    }

    /// Finalizes metrics, records the session for the current user, and
    /// moves to results. A persistence failure is returned after the
    /// transition has happened.
    fn complete(&mut self, now_ms: u64) -> Result<()> {
        let elapsed_ms = self
            .started_at_ms
            .map(|start| now_ms.saturating_sub(start))
            .unwrap_or(0);
        let duration_secs = (elapsed_ms as f64 / 1000.0).max(MIN_ELAPSED_SECS);

        let passage = self.passage.chars();
        let final_metrics = LiveMetrics::compute(&self.input, passage, elapsed_ms);
        self.live = final_metrics;
        self.counters.finalize(self.input.len(), passage.len());

        let score = SessionScore {
            wpm: final_metrics.wpm,
            accuracy: final_metrics.accuracy,
            duration_secs,
            errors: final_metrics.errors,
            passage: self.passage.text(),
        };
        let recorded = self.store.record_session(self.current_user.as_deref(), &score);

        self.completion = Some(Completion {
            metrics: final_metrics,
            breakdown: self.counters,
            consistency: metrics::consistency(self.history.samples()),
            recorded: matches!(recorded, Ok(true) | Err(EngineError::Persistence { .. })),
            saved: matches!(recorded, Ok(true)),
        });
        info!(
            wpm = final_metrics.wpm,
            accuracy = final_metrics.accuracy,
            errors = final_metrics.errors,
            "session complete"
        );
        self.transition(State::Results);
        self.signals.push(Signal::SessionComplete);

        recorded.map(|_| ())
    }

    fn edit_name(&mut self, key: Keystroke) -> Result<()> {
        match key {
            Keystroke::Char(c) => self.name_draft.push(c),
            Keystroke::Backspace => {
                self.name_draft.pop();
            }
            Keystroke::Submit => {
                let name = self.name_draft.clone();
                return self.create_user(&name);
            }
            Keystroke::Escape => self.transition(State::Menu),
        }
        Ok(())
    }

    /// Creates and adopts a user. The user is adopted even when only the
    /// write failed, since the in-memory catalog already holds it.
    pub fn create_user(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        let created = self.store.create_user(name).map(|_| ());
        if matches!(created, Ok(()) | Err(EngineError::Persistence { .. })) {
            self.current_user = Some(name.to_string());
            self.name_draft.clear();
            self.transition(State::Menu);
        }
        created
    }

    pub fn select_user(&mut self, name: &str) -> Result<()> {
        let profile = self.store.select_user(name)?;
        info!(user = name, high_wpm = profile.high_wpm, "selected user");
        self.current_user = Some(name.to_string());
        Ok(())
    }

    pub fn select_paragraph(&mut self, idx: usize) {
        self.selected = self.catalog.clamp_index(idx);
        self.passage = self.passage_for_selection();
        debug!(index = self.selected, "selected passage");
    }

    fn passage_for_selection(&self) -> Passage {
        self.catalog
            .get(self.selected)
            .cloned()
            .unwrap_or_else(|| self.passage.clone())
    }

    fn transition(&mut self, to: State) {
        if self.state != to {
            debug!(from = %self.state, %to, "state transition");
        }
        self.state = to;
    }

    pub fn drain_signals(&mut self) -> Vec<Signal> {
        std::mem::take(&mut self.signals)
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            state: self.state,
            input: &self.input,
            passage: &self.passage,
            live: self.live,
            countdown: self.countdown,
            next_expected: self.heatmap.next_expected(),
            heatmap: self.heatmap.layout_heat(),
            history: &self.history,
            completion: self.completion.as_ref(),
            passages: &self.catalog,
            selected_passage: self.selected,
            users: self.store.usernames(),
            current_user: self.current_user.as_deref(),
            profile: self.current_profile(),
            name_draft: &self.name_draft,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn input(&self) -> &[char] {
        &self.input
    }

    pub fn input_text(&self) -> String {
        self.input.iter().collect()
    }

    pub fn passage(&self) -> &Passage {
        &self.passage
    }

    pub fn counters(&self) -> ErrorCounters {
        self.counters
    }

    pub fn live(&self) -> LiveMetrics {
        self.live
    }

    pub fn history(&self) -> &MetricHistory {
        &self.history
    }

    pub fn heatmap(&self) -> &HeatmapTracker {
        &self.heatmap
    }

    pub fn countdown(&self) -> i64 {
        self.countdown
    }

    pub fn completion(&self) -> Option<&Completion> {
        self.completion.as_ref()
    }

    pub fn selected_paragraph(&self) -> usize {
        self.selected
    }

    pub fn current_user(&self) -> Option<&str> {
        self.current_user.as_deref()
    }

    pub fn current_profile(&self) -> Option<&UserProfile> {
        self.current_user
            .as_deref()
            .and_then(|name| self.store.profile(name))
    }

    pub fn store(&self) -> &UserProfileStore<B> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut UserProfileStore<B> {
        &mut self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heatmap::Severity;
    use crate::profile::MemoryProfileBackend;
    use assert_matches::assert_matches;

    fn machine(passages: &str) -> SessionMachine<MemoryProfileBackend> {
        SessionMachine::new(
            PassageCatalog::parse(passages).unwrap(),
            UserProfileStore::open(MemoryProfileBackend::new()),
        )
    }

    /// Starts a session at t=0 and ticks through the countdown to t=3000.
    fn typing(passages: &str) -> SessionMachine<MemoryProfileBackend> {
        let mut m = machine(passages);
        m.dispatch(Intent::StartSession, 0).unwrap();
        m.tick(3000);
        assert_eq!(m.state(), State::Typing);
        m.drain_signals();
        m
    }

    fn type_str<B: ProfileBackend>(m: &mut SessionMachine<B>, s: &str) {
        for c in s.chars() {
            m.apply_keystroke(Keystroke::Char(c), 0).unwrap();
        }
    }

    #[test]
    fn starts_in_menu() {
        let m = machine("hello");
        assert_eq!(m.state(), State::Menu);
        assert_eq!(m.passage().text(), "hello");
        assert!(m.completion().is_none());
    }

    #[test]
    fn countdown_counts_whole_seconds() {
        let mut m = machine("hello");
        m.dispatch(Intent::StartSession, 10_000).unwrap();
        assert_eq!(m.state(), State::Countdown);
        assert_eq!(m.countdown(), 3);

        m.tick(10_999);
        assert_eq!(m.countdown(), 3);
        m.tick(11_000);
        assert_eq!(m.countdown(), 2);
        m.tick(12_500);
        assert_eq!(m.countdown(), 1);
        assert_eq!(m.state(), State::Countdown);
        assert!(m.drain_signals().is_empty());

        m.tick(13_000);
        assert_eq!(m.state(), State::Typing);
        assert_eq!(m.drain_signals(), vec![Signal::SessionStart]);
    }

    #[test]
    fn countdown_ignores_keys_and_back() {
        let mut m = machine("hello");
        m.dispatch(Intent::StartSession, 0).unwrap();
        m.dispatch(Intent::Key(Keystroke::Char('h')), 100).unwrap();
        m.dispatch(Intent::Back, 200).unwrap();
        assert_eq!(m.state(), State::Countdown);
        assert!(m.input().is_empty());
    }

    #[test]
    fn keystrokes_classify_and_signal() {
        let mut m = typing("cat");
        type_str(&mut m, "caxt");

        assert_eq!(m.input_text(), "caxt");
        assert_eq!(m.counters().substitutions, 1);
        assert_eq!(m.counters().insertions, 1);
        assert_eq!(
            m.drain_signals(),
            vec![
                Signal::KeyCorrect,
                Signal::KeyCorrect,
                Signal::KeyError,
                Signal::KeyError
            ]
        );
        assert_eq!(m.heatmap().errors('x'), 1);
        assert_eq!(m.heatmap().errors('t'), 1);
        assert_eq!(m.heatmap().next_expected(), None);
    }

    #[test]
    fn next_expected_follows_input() {
        let mut m = typing("abc");
        assert_eq!(m.heatmap().next_expected(), Some('a'));
        type_str(&mut m, "a");
        assert_eq!(m.heatmap().next_expected(), Some('b'));
        m.apply_keystroke(Keystroke::Backspace, 0).unwrap();
        assert_eq!(m.heatmap().next_expected(), Some('a'));
    }

    #[test]
    fn backspace_does_not_undo_counters() {
        let mut m = typing("abc");
        type_str(&mut m, "ax");
        m.apply_keystroke(Keystroke::Backspace, 0).unwrap();
        type_str(&mut m, "bc");
        m.tick(5000);

        // live total sees a clean input, the incremental counter remembers the miss
        assert_eq!(m.live().errors, 0);
        assert_eq!(m.counters().substitutions, 1);
        assert_eq!(m.heatmap().errors('x'), 1);
    }

    #[test]
    fn backspace_on_empty_input_is_harmless() {
        let mut m = typing("abc");
        m.apply_keystroke(Keystroke::Backspace, 0).unwrap();
        assert!(m.input().is_empty());
    }

    #[test]
    fn input_is_capped_past_the_passage() {
        let mut m = typing("ab");
        for _ in 0..150 {
            m.apply_keystroke(Keystroke::Char('z'), 0).unwrap();
        }
        assert_eq!(m.input().len(), 2 + OVERFLOW_MARGIN);
        assert_eq!(m.counters().substitutions, 2);
        assert_eq!(m.counters().insertions, OVERFLOW_MARGIN);
    }

    #[test]
    fn typing_tick_updates_live_metrics_and_history() {
        let mut m = typing("hello world");
        type_str(&mut m, "hello");

        // started at 3000; ticks at 60 Hz for two and a half seconds
        let mut now = 3000;
        while now <= 5500 {
            m.tick(now);
            now += 16;
        }

        let live = m.live();
        assert_eq!(live.accuracy, 100.0);
        assert_eq!(live.errors, 6);
        assert!(live.wpm > 0.0);
        let samples = m.history().samples();
        assert_eq!(samples.len(), 3);
        for pair in samples.windows(2) {
            assert!(pair[1].elapsed_ms - pair[0].elapsed_ms >= 1000);
        }
    }

    #[test]
    fn tick_at_start_instant_skips_rates() {
        let mut m = typing("abc");
        m.tick(3000);
        assert_eq!(m.live().wpm, 0.0);
        assert!(m.history().is_empty());
        assert_eq!(m.live().errors, 3);
    }

    #[test]
    fn submit_completes_and_records_for_current_user() {
        let mut m = machine("hello world");
        m.create_user("ann").unwrap();
        assert_eq!(m.current_user(), Some("ann"));

        m.dispatch(Intent::StartSession, 0).unwrap();
        m.tick(3000);
        type_str(&mut m, "hello");
        m.dispatch(Intent::Key(Keystroke::Submit), 63_000).unwrap();

        assert_eq!(m.state(), State::Results);
        let done = m.completion().unwrap();
        assert_eq!(done.metrics.wpm, 1.0);
        assert_eq!(done.metrics.accuracy, 100.0);
        assert_eq!(done.breakdown.omissions, 6);
        assert!(done.recorded);
        assert!(done.saved);
        assert!(m.drain_signals().contains(&Signal::SessionComplete));

        let profile = m.current_profile().unwrap();
        assert_eq!(profile.high_wpm, 1.0);
        assert_eq!(profile.low_wpm(), Some(1.0));
        assert_eq!(profile.history.len(), 1);
        assert_eq!(profile.history[0].error_count, 6);
        assert_eq!(profile.history[0].duration_secs, 60.0);
    }

    #[test]
    fn guest_session_is_not_recorded() {
        let mut m = typing("hi");
        type_str(&mut m, "hi");
        m.apply_keystroke(Keystroke::Submit, 4000).unwrap();
        assert_eq!(m.state(), State::Results);
        assert!(!m.completion().unwrap().recorded);
        assert!(!m.completion().unwrap().saved);
        assert_eq!(m.store().backend().saves, 0);
    }

    #[test]
    fn instant_empty_submit_keeps_low_wpm_unset() {
        let mut m = machine("hello");
        m.create_user("ann").unwrap();
        m.dispatch(Intent::StartSession, 0).unwrap();
        m.tick(3000);
        m.apply_keystroke(Keystroke::Submit, 3000).unwrap();

        let done = m.completion().unwrap();
        assert_eq!(done.metrics.wpm, 0.0);
        assert_eq!(done.metrics.accuracy, 0.0);
        assert_eq!(done.breakdown.omissions, 5);
        let profile = m.current_profile().unwrap();
        assert_eq!(profile.low_wpm(), None);
        assert_eq!(profile.history.len(), 1);
    }

    #[test]
    fn breakdown_reproduces_snapshot_without_overflow() {
        let mut m = typing("typing test");
        type_str(&mut m, "typx");
        m.apply_keystroke(Keystroke::Submit, 8000).unwrap();

        let done = *m.completion().unwrap();
        assert_eq!(done.breakdown.insertions, 0);
        assert_eq!(done.breakdown.total(), done.metrics.errors);
    }

    #[test]
    fn escape_abandons_without_recording() {
        let mut m = machine("hello");
        m.create_user("ann").unwrap();
        let saves = m.store().backend().saves;
        m.dispatch(Intent::StartSession, 0).unwrap();
        m.tick(3000);
        type_str(&mut m, "he");
        m.dispatch(Intent::Key(Keystroke::Escape), 4000).unwrap();

        assert_eq!(m.state(), State::Menu);
        assert!(m.input().is_empty());
        assert!(m.completion().is_none());
        assert_eq!(m.store().backend().saves, saves);
        assert!(m.current_profile().unwrap().history.is_empty());
    }

    #[test]
    fn failed_write_still_reaches_results() {
        let mut m = machine("hello");
        m.create_user("ann").unwrap();
        m.store_mut().backend_mut().fail_writes = true;
        m.dispatch(Intent::StartSession, 0).unwrap();
        m.tick(3000);
        type_str(&mut m, "hello");

        let res = m.dispatch(Intent::Key(Keystroke::Submit), 9000);
        assert_matches!(res, Err(EngineError::Persistence { .. }));
        assert_eq!(m.state(), State::Results);
        let done = m.completion().unwrap();
        assert!(done.recorded);
        assert!(!done.saved);
        assert_eq!(m.current_profile().unwrap().history.len(), 1);
    }

    #[test]
    fn failed_write_still_adopts_new_user() {
        let mut m = machine("hello");
        m.store_mut().backend_mut().fail_writes = true;
        m.dispatch(Intent::OpenUserSelect, 0).unwrap();
        m.dispatch(Intent::OpenCreateUser, 0).unwrap();

        let res = m.create_user("ann");
        assert_matches!(res, Err(EngineError::Persistence { .. }));
        assert_eq!(m.current_user(), Some("ann"));
        assert_eq!(m.state(), State::Menu);
        assert_eq!(m.store().usernames(), vec!["ann"]);
        assert_eq!(m.store().backend().saves, 0);
    }

    #[test]
    fn reset_clears_previous_attempt() {
        let mut m = typing("abc");
        type_str(&mut m, "xyz");
        m.tick(6000);
        m.apply_keystroke(Keystroke::Submit, 6000).unwrap();
        m.dispatch(Intent::Restart, 7000).unwrap();

        assert_eq!(m.state(), State::Countdown);
        assert!(m.input().is_empty());
        assert_eq!(m.counters(), ErrorCounters::default());
        assert!(m.history().is_empty());
        assert!(m.completion().is_none());
        assert!(m.heatmap().layout_heat().iter().all(|h| h.errors == 0));
        assert_eq!(m.passage().text(), "abc");
    }

    #[test]
    fn heatmap_severity_in_snapshot() {
        let mut m = typing("aaaaaaaaaa");
        type_str(&mut m, "qqqqqqq");
        let snap = m.snapshot();
        let q = snap.heatmap.iter().find(|h| h.key == 'q').unwrap();
        assert_eq!(q.errors, 7);
        assert_eq!(q.severity, Severity::High);
        assert_eq!(snap.next_expected, Some('a'));
    }

    #[test]
    fn paragraph_selection() {
        let mut m = machine("one\ntwo\nthree");
        m.dispatch(Intent::OpenParagraphSelect, 0).unwrap();
        assert_eq!(m.state(), State::ParagraphSelect);
        m.dispatch(Intent::ChooseParagraph(2), 0).unwrap();
        assert_eq!(m.state(), State::Menu);
        assert_eq!(m.selected_paragraph(), 2);

        m.dispatch(Intent::StartSession, 0).unwrap();
        assert_eq!(m.passage().text(), "three");
    }

    #[test]
    fn paragraph_selection_clamps() {
        let mut m = machine("one\ntwo");
        m.select_paragraph(42);
        assert_eq!(m.selected_paragraph(), 1);
        assert_eq!(m.passage().text(), "two");
    }

    #[test]
    fn user_selection_flow() {
        let mut m = machine("hello");
        m.dispatch(Intent::OpenUserSelect, 0).unwrap();
        m.dispatch(Intent::OpenCreateUser, 0).unwrap();
        assert_eq!(m.state(), State::CreateUser);

        for c in "bo".chars() {
            m.dispatch(Intent::Key(Keystroke::Char(c)), 0).unwrap();
        }
        m.dispatch(Intent::Key(Keystroke::Submit), 0).unwrap();
        assert_eq!(m.state(), State::Menu);
        assert_eq!(m.current_user(), Some("bo"));

        m.dispatch(Intent::OpenUserSelect, 0).unwrap();
        let res = m.dispatch(Intent::ChooseUser("ghost".into()), 0);
        assert_matches!(res, Err(EngineError::UserNotFound(_)));
        assert_eq!(m.state(), State::UserSelect);
        assert_eq!(m.current_user(), Some("bo"));
    }

    #[test]
    fn create_user_errors_stay_in_create_state() {
        let mut m = machine("hello");
        m.dispatch(Intent::OpenUserSelect, 0).unwrap();
        m.dispatch(Intent::OpenCreateUser, 0).unwrap();
        m.dispatch(Intent::Key(Keystroke::Char(' ')), 0).unwrap();

        let res = m.dispatch(Intent::Key(Keystroke::Submit), 0);
        assert_matches!(res, Err(EngineError::InvalidName));
        assert_eq!(m.state(), State::CreateUser);
        assert_eq!(m.current_user(), None);
    }

    #[test]
    fn back_returns_to_menu() {
        let mut m = machine("hello");
        for open in [Intent::OpenParagraphSelect, Intent::OpenUserSelect] {
            m.dispatch(open, 0).unwrap();
            m.dispatch(Intent::Back, 0).unwrap();
            assert_eq!(m.state(), State::Menu);
        }

        let mut m = typing("hi");
        m.dispatch(Intent::Back, 0).unwrap();
        assert_eq!(m.state(), State::Typing);
        m.apply_keystroke(Keystroke::Submit, 5000).unwrap();
        m.dispatch(Intent::Back, 0).unwrap();
        assert_eq!(m.state(), State::Menu);
    }

    #[test]
    fn keystrokes_ignored_outside_typing() {
        let mut m = machine("hello");
        m.apply_keystroke(Keystroke::Char('h'), 0).unwrap();
        assert!(m.input().is_empty());
        assert_eq!(m.state(), State::Menu);
    }
}
