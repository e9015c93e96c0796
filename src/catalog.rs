use crate::error::{EngineError, Result};
use include_dir::{include_dir, Dir};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

static PASSAGE_DIR: Dir = include_dir!("src/passages");

const BUILTIN_FILE: &str = "sentences.txt";

/// Shown when no real passage could be loaded.
pub const PLACEHOLDER_TEXT: &str = "No passages loaded. Add one passage per line to your passages file!";

/// Target text for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    text: String,
    chars: Vec<char>,
}

impl Passage {
    pub fn new<S: Into<String>>(text: S) -> Self {
        let text = text.into();
        let chars = text.chars().collect();
        Self { text, chars }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn char_at(&self, idx: usize) -> Option<char> {
        self.chars.get(idx).copied()
    }
}

/// Ordered, index-addressable passages read from line-delimited text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassageCatalog {
    passages: Vec<Passage>,
}

impl PassageCatalog {
    /// One passage per non-empty line, surrounding whitespace trimmed.
    pub fn parse(source: &str) -> Result<Self> {
        let passages: Vec<Passage> = source
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(Passage::new)
            .collect();

        if passages.is_empty() {
            return Err(EngineError::EmptyCatalog);
        }
        Ok(Self { passages })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = fs::read_to_string(path.as_ref())?;
        let catalog = Self::parse(&source)?;
        debug!(path = %path.as_ref().display(), passages = catalog.len(), "loaded passages");
        Ok(catalog)
    }

    /// Passages bundled into the binary.
    pub fn builtin() -> Self {
        PASSAGE_DIR
            .get_file(BUILTIN_FILE)
            .and_then(|f| f.contents_utf8())
            .and_then(|source| Self::parse(source).ok())
            .unwrap_or_else(Self::placeholder)
    }

    /// Single explanatory passage for degraded mode.
    pub fn placeholder() -> Self {
        Self {
            passages: vec![Passage::new(PLACEHOLDER_TEXT)],
        }
    }

    /// Falls back to the placeholder, logging why.
    pub fn or_placeholder(loaded: Result<Self>) -> Self {
        loaded.unwrap_or_else(|e| {
            warn!(error = %e, "passage catalog unavailable, using placeholder");
            Self::placeholder()
        })
    }

    pub fn get(&self, idx: usize) -> Option<&Passage> {
        self.passages.get(idx)
    }

    /// Clamps `idx` into range; a catalog is never empty.
    pub fn clamp_index(&self, idx: usize) -> usize {
        idx.min(self.passages.len().saturating_sub(1))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Passage> {
        self.passages.iter()
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::tempdir;

    #[test]
    fn test_parse_skips_blank_lines_and_trims() {
        let catalog = PassageCatalog::parse("  first line \n\n\t\nsecond\r\n").unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get(0).unwrap().text(), "first line");
        assert_eq!(catalog.get(1).unwrap().text(), "second");
    }

    #[test]
    fn test_parse_empty_source() {
        assert_matches!(PassageCatalog::parse("\n   \n"), Err(EngineError::EmptyCatalog));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let res = PassageCatalog::load(dir.path().join("nope.txt"));
        assert_matches!(res, Err(EngineError::Io(_)));
        let fallback = PassageCatalog::or_placeholder(res);
        assert_eq!(fallback.get(0).unwrap().text(), PLACEHOLDER_TEXT);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sentences.txt");
        std::fs::write(&path, "one\ntwo\nthree\n").unwrap();
        let catalog = PassageCatalog::load(&path).unwrap();
        assert_eq!(catalog.iter().map(Passage::text).collect::<Vec<_>>(), ["one", "two", "three"]);
    }

    #[test]
    fn test_builtin_catalog() {
        let catalog = PassageCatalog::builtin();
        assert!(catalog.len() > 1);
        assert!(catalog.iter().all(|p| !p.is_empty()));
    }

    #[test]
    fn test_clamp_index() {
        let catalog = PassageCatalog::parse("a\nb\nc").unwrap();
        assert_eq!(catalog.clamp_index(1), 1);
        assert_eq!(catalog.clamp_index(99), 2);
    }

    #[test]
    fn test_passage_is_char_indexed() {
        let p = Passage::new("héllo");
        assert_eq!(p.len(), 5);
        assert_eq!(p.char_at(1), Some('é'));
        assert_eq!(p.char_at(5), None);
    }
}
