/// Classic Levenshtein edit distance with unit costs.
pub fn distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let sub_cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j] + sub_cost)
                .min(prev[j + 1] + 1)
                .min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Edit budget for a spoken word: capped at 2, scaled down for short words
/// so 2-3 letter words don't match half the index.
pub fn max_edits(spoken: &str) -> usize {
    2.min(spoken.chars().count() / 2)
}

/// Whether an indexed word is an acceptable fuzzy match for a spoken word.
pub fn is_match(spoken: &str, candidate: &str) -> bool {
    distance(spoken, candidate) <= max_edits(spoken)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_identical_is_zero() {
        assert_eq!(distance("hello", "hello"), 0);
        assert_eq!(distance("", ""), 0);
    }

    #[test]
    fn distance_handles_empty_sides() {
        assert_eq!(distance("", "abc"), 3);
        assert_eq!(distance("abc", ""), 3);
    }

    #[test]
    fn distance_counts_substitutions_insertions_deletions() {
        assert_eq!(distance("kitten", "sitting"), 3);
        assert_eq!(distance("flaw", "lawn"), 2);
        assert_eq!(distance("cat", "cart"), 1);
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [("kitten", "sitting"), ("abc", "xyz"), ("", "word")];
        for (a, b) in pairs {
            assert_eq!(distance(a, b), distance(b, a));
        }
    }

    #[test]
    fn max_edits_scales_with_word_length() {
        assert_eq!(max_edits("a"), 0);
        assert_eq!(max_edits("an"), 1);
        assert_eq!(max_edits("the"), 1);
        assert_eq!(max_edits("word"), 2);
        assert_eq!(max_edits("presentation"), 2);
    }

    #[test]
    fn short_words_reject_loose_matches() {
        // "to" vs "go" is one edit, within budget 1
        assert!(is_match("to", "go"));
        // single letters never fuzz
        assert!(!is_match("a", "i"));
    }

    #[test]
    fn long_words_accept_up_to_two_edits() {
        assert!(is_match("teleprompter", "teleprompters"));
        assert!(is_match("recieve", "receive"));
        assert!(!is_match("reading", "writing"));
    }
}
