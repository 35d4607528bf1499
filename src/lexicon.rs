//! Keyword lexicon and domain gate.
//!
//! The lexicon is a user-maintained word/phrase list (one or more entries
//! per line, `#` starts a comment) whose entries act as the relevance
//! signal for incoming transcripts. The gate is a deliberate
//! precision/cost tradeoff: plain substring matching, no model call, so an
//! irrelevant request is rejected before any embedding work happens.

use std::collections::BTreeSet;
use std::path::Path;

use crate::error::ConfigError;

/// Normalized keyword set. Rebuilt wholesale on reload; an empty lexicon
/// makes the gate reject everything.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    entries: Vec<String>,
}

impl Lexicon {
    /// Load and normalize the keyword file.
    ///
    /// Blank lines and comment lines are skipped, inline `#` comments are
    /// stripped, and each line may carry several entries separated by
    /// commas or whitespace. Entries are case-folded and deduplicated.
    ///
    /// An unreadable path is a [`ConfigError`]; a readable file with no
    /// usable entries yields an empty lexicon.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|source| ConfigError::KeywordsUnreadable {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let mut set = BTreeSet::new();
        for line in content.lines() {
            let line = match line.find('#') {
                Some(pos) => &line[..pos],
                None => line,
            };
            for part in line.split(',') {
                for word in part.split_whitespace() {
                    let word = word.trim().to_lowercase();
                    if !word.is_empty() {
                        set.insert(word);
                    }
                }
            }
        }
        Self {
            entries: set.into_iter().collect(),
        }
    }

    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: BTreeSet<String> = entries
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            entries: set.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True iff at least one entry occurs as a case-insensitive substring
    /// of the input.
    pub fn contains_any(&self, text: &str) -> bool {
        let folded = text.to_lowercase();
        self.entries.iter().any(|kw| folded.contains(kw.as_str()))
    }

    /// Number of distinct entries occurring in the input. Diagnostic only;
    /// the gate itself needs a single hit.
    pub fn count_hits(&self, text: &str) -> usize {
        let folded = text.to_lowercase();
        self.entries
            .iter()
            .filter(|kw| folded.contains(kw.as_str()))
            .count()
    }
}

/// Domain gate: is the transcript farming-related at all?
///
/// Pure function of its inputs. Empty or whitespace-only text is always
/// irrelevant, as is any text when the lexicon is empty.
pub fn is_domain_relevant(text: &str, lexicon: &Lexicon) -> bool {
    if text.trim().is_empty() {
        return false;
    }
    lexicon.contains_any(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let lex = Lexicon::parse("# header\n\n배추, 관수\n고추 시비  # trailing\n");
        assert_eq!(lex.len(), 4);
        assert!(lex.contains_any("오늘 고추밭 시비"));
    }

    #[test]
    fn test_parse_dedup() {
        let lex = Lexicon::parse("배추\n배추 배추,배추\n");
        assert_eq!(lex.len(), 1);
    }

    #[test]
    fn test_contains_any_case_insensitive() {
        let lex = Lexicon::parse("REI\nphi\n");
        assert!(lex.contains_any("rei 준수 확인"));
        assert!(lex.contains_any("PHI 체크"));
        assert!(!lex.contains_any("오늘 날씨 맑음"));
    }

    #[test]
    fn test_gate_scenarios() {
        let lex = Lexicon::from_entries(["배추", "관수"]);
        assert!(is_domain_relevant("오늘 점적 30분 관수했다", &lex));
        assert!(!is_domain_relevant("오늘 저녁 뭐 먹지", &lex));
    }

    #[test]
    fn test_gate_empty_text_irrelevant() {
        let lex = Lexicon::from_entries(["배추"]);
        assert!(!is_domain_relevant("", &lex));
        assert!(!is_domain_relevant("   \n\t", &lex));
    }

    #[test]
    fn test_gate_empty_lexicon_rejects_everything() {
        let lex = Lexicon::default();
        assert!(!is_domain_relevant("배추 관수", &lex));
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = Lexicon::load(Path::new("/nonexistent/keywords.txt")).unwrap_err();
        assert!(matches!(err, ConfigError::KeywordsUnreadable { .. }));
    }

    #[test]
    fn test_empty_file_is_empty_lexicon_not_error() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let lex = Lexicon::load(f.path()).unwrap();
        assert!(lex.is_empty());
    }
}
