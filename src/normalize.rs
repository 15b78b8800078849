//! Text canonicalization shared by topic identity and message scanning.
//!
//! A canonical string is NFKC-normalized and fully case-folded, so full-width
//! and half-width forms, precomposed and decomposed accents, ligatures and
//! mixed case all compare equal.

use std::fmt;

use unicode_normalization::UnicodeNormalization;

/// A string that has been through [`canonicalize`].
///
/// The only way to build one is through [`canonicalize`] (or by re-wrapping
/// a value read back from storage, which was canonical when written).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalString(String);

impl CanonicalString {
    /// Wraps a string previously produced by [`canonicalize`], e.g. a stored key.
    ///
    /// The value is re-canonicalized, which is a no-op for genuine canonical
    /// input and repairs rows edited by hand.
    #[must_use]
    pub fn from_stored(value: &str) -> Self {
        canonicalize(value)
    }

    /// Borrow the canonical text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in Unicode scalar values.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }

    /// True when the canonical form is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the wrapper and returns the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Applies NFKC only, keeping case. Used for display forms.
#[must_use]
pub fn compose(text: &str) -> String {
    text.nfkc().collect()
}

/// Canonicalizes text: NFKC, full case folding, then NFKC again.
///
/// Folding can emit sequences that are no longer in NFKC (e.g. a folded
/// letter followed by a combining mark), so the second pass keeps the
/// operation a fixed point after one application.
#[must_use]
pub fn canonicalize(text: &str) -> CanonicalString {
    let composed = compose(text);
    let folded = caseless::default_case_fold_str(&composed);
    CanonicalString(folded.nfkc().collect())
}

/// Word characters for candidate scanning: letters, digits and underscore.
#[must_use]
pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
