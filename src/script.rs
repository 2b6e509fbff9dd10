use std::collections::HashMap;

/// Location of an indexed word within the derived line list
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WordPosition {
    pub line_index: usize,
    pub word_index: usize,
}

/// A script split into lines under a wrap policy, plus a normalized-word
/// lookup used by voice alignment.
///
/// The derived line list is the single source of truth for "what is a line"
/// across every playback mode. The whole structure is rebuilt on any text or
/// wrap-limit change; it is never patched incrementally.
#[derive(Debug, Clone)]
pub struct Script {
    pub text: String,
    pub lines: Vec<Vec<String>>,
    index: HashMap<String, Vec<WordPosition>>,
}

/// Lowercase and strip everything outside `[a-z0-9]`. Idempotent.
pub fn normalize(word: &str) -> String {
    word.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

impl Script {
    /// Split `text` on line breaks; any line longer than a non-zero
    /// `max_words_per_line` is chunked into consecutive runs of exactly that
    /// many words (the last chunk may be shorter).
    pub fn build(text: &str, max_words_per_line: usize) -> Self {
        let mut lines: Vec<Vec<String>> = Vec::new();

        for raw_line in text.lines() {
            let words: Vec<String> = raw_line.split_whitespace().map(str::to_owned).collect();
            if words.is_empty() {
                continue;
            }
            if max_words_per_line == 0 || words.len() <= max_words_per_line {
                lines.push(words);
            } else {
                for chunk in words.chunks(max_words_per_line) {
                    lines.push(chunk.to_vec());
                }
            }
        }

        let mut index: HashMap<String, Vec<WordPosition>> = HashMap::new();
        for (line_index, line) in lines.iter().enumerate() {
            for (word_index, word) in line.iter().enumerate() {
                let norm = normalize(word);
                // Empty-normalizing words keep their rendering slot in the
                // line but never participate in alignment.
                if norm.is_empty() {
                    continue;
                }
                index.entry(norm).or_default().push(WordPosition {
                    line_index,
                    word_index,
                });
            }
        }

        Self {
            text: text.to_owned(),
            lines,
            index,
        }
    }

    /// Exact lookup of a normalized word. Positions are in script order.
    pub fn lookup(&self, normalized: &str) -> &[WordPosition] {
        self.index.get(normalized).map_or(&[], Vec::as_slice)
    }

    /// All distinct normalized words in the index.
    pub fn indexed_words(&self) -> impl Iterator<Item = (&str, &[WordPosition])> {
        self.index.iter().map(|(w, p)| (w.as_str(), p.as_slice()))
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn word_count(&self) -> usize {
        self.lines.iter().map(Vec::len).sum()
    }

    /// Flat word sequence in reading order, for RSVP.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().flatten().map(String::as_str)
    }

    /// Line text as displayed.
    pub fn line_text(&self, line_index: usize) -> String {
        self.lines
            .get(line_index)
            .map_or_else(String::new, |l| l.join(" "))
    }
}
