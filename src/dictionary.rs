//! Natural-language word list used to veto substring matches.
//!
//! Loaded once at startup from a newline-delimited file such as
//! `/usr/share/dict/words`; every entry is canonicalized before insertion.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, instrument};

use crate::normalize::canonicalize;

/// Default system word list.
pub const DEFAULT_DICTIONARY_PATH: &str = "/usr/share/dict/words";

/// Errors raised while loading the dictionary.
#[derive(Debug, Error)]
pub enum DictionaryError {
    /// The word list could not be read.
    #[error(
        "cannot read dictionary '{path}': {source}\n  Suggestion: install a word list (e.g. the `words` package) or set `dictionary` in the config"
    )]
    Io {
        /// Path that failed to load.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The word list contained no usable entries.
    #[error("dictionary '{0}' contains no words")]
    Empty(PathBuf),
}

/// Read-only set of canonical dictionary words.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    words: HashSet<String>,
}

impl Dictionary {
    /// Loads a newline-delimited word list.
    ///
    /// Blank lines are skipped; each entry is trimmed and canonicalized.
    ///
    /// # Errors
    /// Returns [`DictionaryError::Io`] if the file cannot be read, or
    /// [`DictionaryError::Empty`] if it holds no words.
    #[instrument(fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, DictionaryError> {
        let content = std::fs::read_to_string(path).map_err(|source| DictionaryError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let dictionary = Self::from_words(content.lines());
        if dictionary.is_empty() {
            return Err(DictionaryError::Empty(path.to_path_buf()));
        }

        info!(words = dictionary.len(), "Loaded dictionary");
        Ok(dictionary)
    }

    /// Builds a dictionary from an iterator of raw words.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|word| word.as_ref().trim().to_owned())
            .filter(|word| !word.is_empty())
            .map(|word| canonicalize(&word).into_string())
            .collect();
        Self { words }
    }

    /// True when `canonical_word` (already canonical) is a dictionary word.
    #[must_use]
    pub fn contains(&self, canonical_word: &str) -> bool {
        self.words.contains(canonical_word)
    }

    /// Number of distinct canonical words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// True when no words are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_from_words_canonicalizes_entries() {
        let dictionary = Dictionary::from_words(["Capture", "  ENGLISH  ", ""]);
        assert_eq!(dictionary.len(), 2);
        assert!(dictionary.contains("capture"));
        assert!(dictionary.contains("english"));
        assert!(!dictionary.contains("Capture"));
    }

    #[test]
    fn test_from_words_deduplicates_case_variants() {
        let dictionary = Dictionary::from_words(["apple", "Apple", "APPLE"]);
        assert_eq!(dictionary.len(), 1);
    }

    #[test]
    fn test_load_reads_newline_delimited_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "capture").unwrap();
        writeln!(file, "").unwrap();
        writeln!(file, "Aaron's").unwrap();

        let dictionary = Dictionary::load(file.path()).unwrap();
        assert_eq!(dictionary.len(), 2);
        assert!(dictionary.contains("aaron's"));
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = Dictionary::load(Path::new("/nonexistent/words"));
        assert!(matches!(result, Err(DictionaryError::Io { .. })));
    }

    #[test]
    fn test_load_empty_file_errors() {
        let file = NamedTempFile::new().unwrap();
        let result = Dictionary::load(file.path());
        assert!(matches!(result, Err(DictionaryError::Empty(_))));
    }
}
