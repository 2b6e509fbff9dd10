use unicode_segmentation::UnicodeSegmentation;

/// Punctuation stripped from word edges before the ORP is computed.
/// Covers Latin, CJK, and typographic quote/dash marks.
const EDGE_PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ';', ':', '"', '\'', '(', ')', '[', ']', '{', '}', '-', '_', '/', '\\',
    '…', '‘', '’', '“', '”', '–', '—', '「', '」', '『', '』', '（', '）', '。', '、', '，',
    '！', '？', '；', '：', '·',
];

const MAJOR_PUNCTUATION: &[char] = &['.', '!', '?', '。', '！', '？', '…'];
const MINOR_PUNCTUATION: &[char] = &[',', ';', ':', '、', '，', '；', '：'];

/// Optimal Recognition Point: the grapheme index within the stripped letter
/// run that should sit on the fixation pivot. 0-based.
pub fn orp_index(word: &str) -> usize {
    let stripped = word.trim_matches(|c| EDGE_PUNCTUATION.contains(&c));
    let len = stripped.graphemes(true).count();
    if len <= 3 {
        0
    } else {
        len / 3
    }
}

/// The word with edge punctuation removed, as displayed around the pivot.
pub fn strip_edges(word: &str) -> &str {
    word.trim_matches(|c| EDGE_PUNCTUATION.contains(&c))
}

/// Display delay for one word at the given pace. Sentence-ending punctuation
/// doubles the hold; clause punctuation adds half again. Never below base.
pub fn word_delay_ms(word: &str, words_per_minute: u32) -> u64 {
    let base = 60_000.0 / f64::from(words_per_minute.max(1));
    let multiplier = match word.chars().rev().find(|c| !c.is_whitespace()) {
        Some(c) if MAJOR_PUNCTUATION.contains(&c) => 2.0,
        Some(c) if MINOR_PUNCTUATION.contains(&c) => 1.5,
        _ => 1.0,
    };
    (base * multiplier).round() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RsvpState {
    Idle,
    Running,
    Paused,
}

/// One-word-at-a-time scheduler: a strict sequential deadline chain driven
/// by tick timestamps. Only one deadline exists at a time.
#[derive(Debug, Clone)]
pub struct RsvpScheduler {
    pub words: Vec<String>,
    pub current_word: usize,
    pub words_per_minute: u32,
    state: RsvpState,
    next_word_ms: Option<u64>,
    completed: bool,
}

impl RsvpScheduler {
    pub fn new(words: Vec<String>, words_per_minute: u32) -> Self {
        Self {
            words,
            current_word: 0,
            words_per_minute: words_per_minute.max(1),
            state: RsvpState::Idle,
            next_word_ms: None,
            completed: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == RsvpState::Running
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Begin (or resume) the chain from the current word. Starting past the
    /// final word resets to the beginning first.
    pub fn start(&mut self, now_ms: u64) {
        if self.words.is_empty() {
            return;
        }
        if self.current_word >= self.words.len() || self.completed {
            self.current_word = 0;
        }
        self.completed = false;
        self.state = RsvpState::Running;
        self.next_word_ms = Some(now_ms + self.current_delay_ms());
    }

    /// Stop the chain without losing the current index.
    pub fn pause(&mut self) {
        if self.state == RsvpState::Running {
            self.state = RsvpState::Paused;
            self.next_word_ms = None;
        }
    }

    pub fn stop(&mut self) {
        self.state = RsvpState::Idle;
        self.next_word_ms = None;
    }

    pub fn reset(&mut self) {
        self.stop();
        self.current_word = 0;
        self.completed = false;
    }

    /// Manual jump; only honored while the chain is not actively scheduling,
    /// so the timer and the user never race for the index.
    pub fn go_to_word(&mut self, index: usize) -> bool {
        if self.state == RsvpState::Running || self.words.is_empty() {
            return false;
        }
        self.current_word = index.min(self.words.len() - 1);
        self.completed = false;
        true
    }

    pub fn set_pace(&mut self, words_per_minute: u32) {
        self.words_per_minute = words_per_minute.max(1);
    }

    fn current_delay_ms(&self) -> u64 {
        self.words
            .get(self.current_word)
            .map_or(0, |w| word_delay_ms(w, self.words_per_minute))
    }

    /// Advance the chain if the current word's hold has elapsed. Returns true
    /// when the displayed word changed or the run just completed.
    pub fn on_tick(&mut self, now_ms: u64) -> bool {
        if self.state != RsvpState::Running {
            return false;
        }
        let Some(deadline) = self.next_word_ms else {
            return false;
        };
        if now_ms < deadline {
            return false;
        }

        // The final word holds for its own delay before we signal
        // completion, rather than being swapped away instantly.
        if self.current_word + 1 >= self.words.len() {
            self.completed = true;
            self.state = RsvpState::Idle;
            self.next_word_ms = None;
            return true;
        }

        self.current_word += 1;
        self.next_word_ms = Some(deadline + self.current_delay_ms());
        true
    }

    pub fn current_word_text(&self) -> &str {
        self.words
            .get(self.current_word)
            .map_or("", String::as_str)
    }
}
