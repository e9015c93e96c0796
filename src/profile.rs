//! Per-user scores and bounded session history.
//!
//! The whole catalog is rewritten through a [`ProfileBackend`] after every
//! mutation. A failed write is reported to the caller but the in-memory
//! change stands; only a restart right after the failure loses data.

use crate::error::{EngineError, Result};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Most recent records kept per user.
pub const HISTORY_LIMIT: usize = 50;

/// Longest passage prefix stored with a record.
pub const SNIPPET_CHARS: usize = 50;

const RECORD_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `+inf` means no positive-WPM session yet; stored as `null`. Older stores
/// spell it as a bare `Infinity`, see [`non_finite_as_null`].
mod unset_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, s: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            s.serialize_some(value)
        } else {
            s.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::INFINITY))
    }
}

mod record_date {
    use super::RECORD_DATE_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&date.format(RECORD_DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, RECORD_DATE_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Rewrites bare `Infinity`, `-Infinity` and `NaN` tokens outside strings to
/// `null`. Stores written before the `null` encoding use them, and serde_json
/// rejects them.
fn non_finite_as_null(raw: &str) -> Cow<'_, str> {
    const TOKENS: [&str; 3] = ["-Infinity", "Infinity", "NaN"];
    if !TOKENS.iter().any(|t| raw.contains(t)) {
        return Cow::Borrowed(raw);
    }

    let mut out = String::with_capacity(raw.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut rest = raw;
    while let Some(c) = rest.chars().next() {
        if !in_string {
            if let Some(token) = TOKENS.iter().find(|t| rest.starts_with(**t)) {
                out.push_str("null");
                rest = &rest[token.len()..];
                continue;
            }
        }
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    Cow::Owned(out)
}

fn unset_low_wpm() -> f64 {
    f64::INFINITY
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// First [`SNIPPET_CHARS`] characters, with an ellipsis when cut.
pub fn snippet(passage: &str) -> String {
    if passage.chars().count() > SNIPPET_CHARS {
        let head: String = passage.chars().take(SNIPPET_CHARS).collect();
        format!("{head}...")
    } else {
        passage.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub wpm: f64,
    pub accuracy: f64,
    #[serde(rename = "time")]
    pub duration_secs: f64,
    #[serde(rename = "errors")]
    pub error_count: usize,
    #[serde(rename = "paragraph")]
    pub passage_snippet: String,
    #[serde(rename = "date", with = "record_date")]
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub high_wpm: f64,
    #[serde(default = "unset_low_wpm", with = "unset_as_null")]
    pub low_wpm: f64,
    #[serde(default)]
    pub history: Vec<SessionRecord>,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            high_wpm: 0.0,
            low_wpm: f64::INFINITY,
            history: Vec::new(),
        }
    }
}

impl UserProfile {
    /// Lowest positive WPM, if any session has set one.
    pub fn low_wpm(&self) -> Option<f64> {
        self.low_wpm.is_finite().then_some(self.low_wpm)
    }

    pub fn low_wpm_label(&self) -> String {
        self.low_wpm()
            .map(|w| format!("{}", w.round()))
            .unwrap_or_else(|| "N/A".to_string())
    }

    fn apply(&mut self, score: &SessionScore<'_>, timestamp: NaiveDateTime) {
        if score.wpm > self.high_wpm {
            self.high_wpm = score.wpm;
        }
        if score.wpm > 0.0 && score.wpm < self.low_wpm {
            self.low_wpm = score.wpm;
        }

        self.history.push(SessionRecord {
            wpm: score.wpm.round(),
            accuracy: round_to(score.accuracy, 1),
            duration_secs: round_to(score.duration_secs, 1),
            error_count: score.errors,
            passage_snippet: snippet(score.passage),
            timestamp,
        });
        if self.history.len() > HISTORY_LIMIT {
            let excess = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..excess);
        }
    }
}

/// Every known user, keyed by case-sensitive name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsersCatalog {
    #[serde(default)]
    pub users: BTreeMap<String, UserProfile>,
}

/// Numbers from one completed session, as handed to the store.
#[derive(Debug, Clone, Copy)]
pub struct SessionScore<'a> {
    pub wpm: f64,
    pub accuracy: f64,
    pub duration_secs: f64,
    pub errors: usize,
    pub passage: &'a str,
}

pub trait ProfileBackend {
    fn load(&self) -> Result<UsersCatalog>;
    fn save(&mut self, catalog: &UsersCatalog) -> Result<()>;
}

/// JSON file holding the whole catalog.
#[derive(Debug, Clone)]
pub struct FileProfileBackend {
    path: PathBuf,
}

impl FileProfileBackend {
    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProfileBackend for FileProfileBackend {
    fn load(&self) -> Result<UsersCatalog> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(UsersCatalog::default()),
            Err(e) => return Err(EngineError::persistence(&self.path, e)),
        };
        serde_json::from_str(&non_finite_as_null(&raw))
            .map_err(|e| EngineError::persistence(&self.path, e))
    }

    fn save(&mut self, catalog: &UsersCatalog) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| EngineError::persistence(&self.path, e))?;
        }
        let data = serde_json::to_vec_pretty(catalog)
            .map_err(|e| EngineError::persistence(&self.path, e))?;

        // write beside the target then rename, so a failed write leaves the old file intact
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data).map_err(|e| EngineError::persistence(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| EngineError::persistence(&self.path, e))
    }
}

/// Keeps the last saved catalog in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryProfileBackend {
    pub stored: Option<UsersCatalog>,
    pub saves: usize,
    pub fail_writes: bool,
}

impl MemoryProfileBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileBackend for MemoryProfileBackend {
    fn load(&self) -> Result<UsersCatalog> {
        Ok(self.stored.clone().unwrap_or_default())
    }

    fn save(&mut self, catalog: &UsersCatalog) -> Result<()> {
        if self.fail_writes {
            return Err(EngineError::persistence("<memory>", "write rejected"));
        }
        self.stored = Some(catalog.clone());
        self.saves += 1;
        Ok(())
    }
}

#[derive(Debug)]
pub struct UserProfileStore<B: ProfileBackend> {
    catalog: UsersCatalog,
    backend: B,
}

impl<B: ProfileBackend> UserProfileStore<B> {
    /// Loads the catalog, starting empty when it is unreadable.
    pub fn open(backend: B) -> Self {
        let catalog = match backend.load() {
            Ok(catalog) => {
                debug!(users = catalog.users.len(), "loaded user catalog");
                catalog
            }
            Err(e) => {
                warn!(error = %e, "user catalog unreadable, starting with no users");
                UsersCatalog::default()
            }
        };
        Self { catalog, backend }
    }

    pub fn catalog(&self) -> &UsersCatalog {
        &self.catalog
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Names in alphabetical order.
    pub fn usernames(&self) -> Vec<&str> {
        self.catalog.users.keys().map(String::as_str).collect()
    }

    pub fn profile(&self, name: &str) -> Option<&UserProfile> {
        self.catalog.users.get(name)
    }

    pub fn create_user(&mut self, name: &str) -> Result<&UserProfile> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::InvalidName);
        }
        if self.catalog.users.contains_key(name) {
            return Err(EngineError::DuplicateUser(name.to_string()));
        }

        self.catalog
            .users
            .insert(name.to_string(), UserProfile::default());
        info!(user = name, "created user");
        self.persist()?;

        self.select_user(name)
    }

    pub fn select_user(&self, name: &str) -> Result<&UserProfile> {
        self.catalog
            .users
            .get(name)
            .ok_or_else(|| EngineError::UserNotFound(name.to_string()))
    }

    /// Records a finished session for `user`. Returns `Ok(false)` when no
    /// user is current, since guest sessions are not kept.
    pub fn record_session(&mut self, user: Option<&str>, score: &SessionScore<'_>) -> Result<bool> {
        self.record_session_at(user, score, Local::now().naive_local())
    }

    pub fn record_session_at(
        &mut self,
        user: Option<&str>,
        score: &SessionScore<'_>,
        timestamp: NaiveDateTime,
    ) -> Result<bool> {
        let Some(name) = user else {
            debug!("no current user, session not recorded");
            return Ok(false);
        };
        let profile = self
            .catalog
            .users
            .get_mut(name)
            .ok_or_else(|| EngineError::UserNotFound(name.to_string()))?;

        profile.apply(score, timestamp);
        info!(
            user = name,
            wpm = score.wpm,
            accuracy = score.accuracy,
            history = profile.history.len(),
            "recorded session"
        );
        self.persist()?;
        Ok(true)
    }

    fn persist(&mut self) -> Result<()> {
        self.backend.save(&self.catalog).inspect_err(|e| {
            error!(error = %e, "failed to persist user catalog");
        })
    }
}
