//! Keyword relevance classifier.
//!
//! Conservative and purely lexical. Two flavours:
//!
//! - [`RelevanceFilter`] looks at the first [`MAX_FILTER_CHARS`] characters
//!   of a provision body, normalized to lowercase without diacritics. A
//!   strong-exclusion stem rejects outright; otherwise an inclusion stem
//!   accepts; otherwise the provision is rejected. Stems match at the start
//!   of a word: `ganad` matches "ganadería" but not "agroganadera", so
//!   compound prefixes are listed as stems of their own.
//! - [`TitleFilter`] is used by sources whose listing already supplies
//!   per-item titles. It never sees a body.
//!
//! False positives and false negatives are expected.

use regex::Regex;

use crate::error::IngestError;
use crate::sources::RelevanceRule;

/// Only this many leading characters of a body are classified.
pub const MAX_FILTER_CHARS: usize = 3500;

/// Outcome of classifying one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted { matched: String },
    Excluded { matched: String },
    NoMatch,
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted { .. })
    }
}

/// Lowercase and strip the diacritics used in Spanish, Catalan and Galician.
pub fn normalize(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(fold_diacritic)
        .collect()
}

fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        _ => c,
    }
}

fn leading_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Compile stems into one word-start anchored alternation.
fn stem_regex(stems: &[String]) -> Result<Option<Regex>, regex::Error> {
    let alternatives: Vec<String> = stems
        .iter()
        .map(|s| normalize(s.trim()))
        .filter(|s| !s.is_empty())
        .map(|s| regex::escape(&s))
        .collect();
    if alternatives.is_empty() {
        return Ok(None);
    }
    Regex::new(&format!(r"\b(?:{})", alternatives.join("|"))).map(Some)
}

/// Body classifier built from inclusion and exclusion stem lists.
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    inclusion: Option<Regex>,
    exclusion: Option<Regex>,
}

impl RelevanceFilter {
    pub fn new(inclusion_stems: &[String], exclusion_stems: &[String]) -> Result<Self, regex::Error> {
        Ok(Self {
            inclusion: stem_regex(inclusion_stems)?,
            exclusion: stem_regex(exclusion_stems)?,
        })
    }

    pub fn classify(&self, text: &str) -> Verdict {
        let normalized = normalize(leading_chars(text, MAX_FILTER_CHARS));

        if let Some(m) = self.exclusion.as_ref().and_then(|re| re.find(&normalized)) {
            return Verdict::Excluded {
                matched: m.as_str().to_string(),
            };
        }

        match self.inclusion.as_ref().and_then(|re| re.find(&normalized)) {
            Some(m) => Verdict::Accepted {
                matched: m.as_str().to_string(),
            },
            None => Verdict::NoMatch,
        }
    }
}

/// Title-only classifier for sources with structured listings.
///
/// Exclusion (on the title) wins. Otherwise the department allow-list,
/// matched against the listing's department label or the title, or the
/// topic interest pattern on the title is enough to accept.
#[derive(Debug, Clone)]
pub struct TitleFilter {
    department: Regex,
    interest: Regex,
    exclusion: Regex,
}

impl TitleFilter {
    pub fn new(department: &str, interest: &str, exclusion: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            department: Regex::new(department)?,
            interest: Regex::new(interest)?,
            exclusion: Regex::new(exclusion)?,
        })
    }

    pub fn classify(&self, title: &str, department: Option<&str>) -> Verdict {
        if let Some(m) = self.exclusion.find(title) {
            return Verdict::Excluded {
                matched: m.as_str().to_string(),
            };
        }
        department
            .and_then(|d| self.department.find(d))
            .or_else(|| self.department.find(title))
            .or_else(|| self.interest.find(title))
            .map(|m| Verdict::Accepted {
                matched: m.as_str().to_string(),
            })
            .unwrap_or(Verdict::NoMatch)
    }
}

/// A source's compiled relevance rule.
#[derive(Debug, Clone)]
pub enum Classifier {
    Body(RelevanceFilter),
    Title(TitleFilter),
}

impl Classifier {
    pub fn from_rule(rule: &RelevanceRule) -> Result<Self, IngestError> {
        let compiled = match rule {
            RelevanceRule::Body {
                inclusion_stems,
                exclusion_stems,
            } => RelevanceFilter::new(inclusion_stems, exclusion_stems).map(Classifier::Body),
            RelevanceRule::Title {
                department_pattern,
                interest_pattern,
                exclusion_pattern,
            } => TitleFilter::new(department_pattern, interest_pattern, exclusion_pattern)
                .map(Classifier::Title),
        };
        compiled.map_err(|e| IngestError::configuration(format!("invalid relevance pattern: {}", e)))
    }

    /// Body rules see `content`; title rules see `title` and the listing's
    /// department label, never the body.
    pub fn classify(&self, title: &str, department: Option<&str>, content: &str) -> Verdict {
        match self {
            Classifier::Body(filter) => filter.classify(content),
            Classifier::Title(filter) => filter.classify(title, department),
        }
    }
}
