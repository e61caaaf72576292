//! Heading-based provision segmenter.
//!
//! Splits a bulletin transcript into [`Provision`]s. All heading patterns of
//! a source are compiled into one alternation; each match start opens a new
//! provision that runs until the next match (or end of text). Text before
//! the first heading is the bulletin preamble and is not a provision.
//!
//! An unrecognized heading silently merges two provisions into one. That is
//! an accepted approximation.

use regex::Regex;

use crate::models::Provision;

/// Trimmed spans shorter than this (in characters) are layout noise.
pub const MIN_PROVISION_CHARS: usize = 80;

#[derive(Debug, Clone)]
pub struct Segmenter {
    /// `None` when the source defines no headings.
    headings: Option<Regex>,
}

impl Segmenter {
    pub fn new(patterns: &[String]) -> Result<Self, regex::Error> {
        let parts: Vec<String> = patterns
            .iter()
            .filter(|p| !p.trim().is_empty())
            .map(|p| format!("(?:{})", p))
            .collect();
        let headings = if parts.is_empty() {
            None
        } else {
            Some(Regex::new(&parts.join("|"))?)
        };
        Ok(Self { headings })
    }

    /// Start offsets of every heading match, in order.
    pub fn heading_offsets(&self, text: &str) -> Vec<usize> {
        match &self.headings {
            Some(re) => re.find_iter(text).map(|m| m.start()).collect(),
            None => Vec::new(),
        }
    }

    pub fn segment(&self, text: &str) -> Vec<Provision> {
        let offsets = self.heading_offsets(text);

        if offsets.is_empty() {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Vec::new();
            }
            return vec![Provision {
                start: 0,
                end: text.len(),
                text: trimmed.to_string(),
            }];
        }

        let ends = offsets.iter().skip(1).copied().chain(std::iter::once(text.len()));
        offsets
            .iter()
            .copied()
            .zip(ends)
            .filter_map(|(start, end)| {
                let span = text[start..end].trim();
                if span.chars().count() < MIN_PROVISION_CHARS {
                    return None;
                }
                Some(Provision {
                    start,
                    end,
                    text: span.to_string(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter() -> Segmenter {
        Segmenter::new(&[r"\bORDEN\s+de\b".to_string(), r"\bRESOLUCI[ÓO]N\s+de\b".to_string()])
            .unwrap()
    }

    /// `len` characters starting with `heading`, padded with filler words.
    fn block(heading: &str, len: usize) -> String {
        let mut s = heading.to_string();
        while s.len() < len {
            s.push_str(" lorem");
        }
        s.truncate(len - 1);
        s.push(' ');
        s
    }

    #[test]
    fn no_heading_yields_whole_transcript() {
        let text = "  Anexo sin encabezado reconocible.\nSegunda línea del anexo.  ";
        let provisions = segmenter().segment(text);
        assert_eq!(provisions.len(), 1);
        assert_eq!(provisions[0].text, text.trim());
        assert_eq!((provisions[0].start, provisions[0].end), (0, text.len()));
    }

    #[test]
    fn empty_transcript_yields_nothing() {
        assert!(segmenter().segment("   \n ").is_empty());
    }

    #[test]
    fn spans_run_between_heading_offsets() {
        let text = format!(
            "{}{}{}",
            block("ORDEN de 1 de enero", 500),
            block("RESOLUCIÓN de 2 de enero", 700),
            block("ORDEN de 3 de enero", 801)
        );
        let second = 500;
        let third = 1200;
        assert_eq!(segmenter().heading_offsets(&text), vec![0, second, third]);

        let provisions = segmenter().segment(&text);
        let spans: Vec<(usize, usize)> = provisions.iter().map(|p| (p.start, p.end)).collect();
        assert_eq!(spans, vec![(0, second), (second, third), (third, text.len())]);
        assert!(provisions[1].text.starts_with("RESOLUCIÓN de 2 de enero"));
    }

    #[test]
    fn offsets_0_500_1200_over_2000_chars() {
        let text = format!(
            "{}{}{}",
            block("ORDEN de 1 de enero", 500),
            block("ORDEN de 2 de enero", 700),
            block("ORDEN de 3 de enero", 800)
        );
        assert_eq!(text.len(), 2000);
        let spans: Vec<(usize, usize)> = segmenter()
            .segment(&text)
            .iter()
            .map(|p| (p.start, p.end))
            .collect();
        assert_eq!(spans, vec![(0, 500), (500, 1200), (1200, 2000)]);
    }

    #[test]
    fn short_spans_are_dropped_as_noise() {
        let text = format!(
            "{}ORDEN de 2 de enero. Página 3 {}",
            block("ORDEN de 1 de enero", 300),
            block("RESOLUCIÓN de 4 de enero", 300)
        );
        let provisions = segmenter().segment(&text);
        assert_eq!(provisions.len(), 2);
        assert!(provisions[0].text.starts_with("ORDEN de 1"));
        assert!(provisions[1].text.starts_with("RESOLUCIÓN de 4"));
    }

    #[test]
    fn preamble_before_first_heading_is_not_a_provision() {
        let text = format!(
            "BOLETÍN OFICIAL número 12, lunes 1 de enero. Sumario de disposiciones generales del día. {}",
            block("ORDEN de 1 de enero", 200)
        );
        let provisions = segmenter().segment(&text);
        assert_eq!(provisions.len(), 1);
        assert!(provisions[0].text.starts_with("ORDEN de 1 de enero"));
    }

    #[test]
    fn spans_never_overlap() {
        let text = (0..6)
            .map(|i| block(&format!("ORDEN de {} de marzo", i + 1), 150))
            .collect::<String>();
        let provisions = segmenter().segment(&text);
        assert_eq!(provisions.len(), 6);
        for pair in provisions.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn no_patterns_means_single_provision() {
        let seg = Segmenter::new(&[]).unwrap();
        let provisions = seg.segment("ORDEN de 1 de enero, texto completo.");
        assert_eq!(provisions.len(), 1);
    }
}
