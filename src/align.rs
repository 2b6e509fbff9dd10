use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use tracing::{debug, info, warn};

use crate::error::SpeechError;
use crate::fuzzy;
use crate::script::{normalize, Script};

/// How far ahead of the last confirmed line the matcher will look. The
/// reader is assumed to be progressing; backward jumps go through
/// `set_current_line` instead.
pub const SEARCH_WINDOW_LINES: usize = 50;

const MAX_RESTART_ATTEMPTS: u32 = 5;
const RESTART_BASE_DELAY_MS: u64 = 500;
const RESTART_MAX_DELAY_MS: u64 = 5_000;

/// One fragment pushed by a recognition session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEvent {
    /// Unfinalized text, for live captioning only.
    Interim(String),
    /// Finalized text, eligible for alignment.
    Final(String),
    /// Silence. Not an error; dropped without any state change.
    NoSpeech,
    /// The session ended on its own (transient; retried with backoff).
    Ended,
    /// The session failed in a way the source can classify.
    Failed(SpeechError),
}

/// Boundary to whatever produces speech transcripts. Implementations push
/// events from their own thread; the engine drains them cooperatively on
/// tick, so alignment logic stays single-threaded and testable.
pub trait SpeechSource {
    /// Capability probe; false means voice mode cannot start at all.
    fn is_available(&self) -> bool;
    /// Open a continuous recognition session.
    fn open(&mut self, locale: &str) -> Result<(), SpeechError>;
    /// Tear the session down; late events must be tolerated by the caller.
    fn close(&mut self);
    /// Non-blocking poll for the next pending event.
    fn try_recv(&mut self) -> Option<TranscriptEvent>;
}

/// Absence of any recognition capability.
#[derive(Debug, Default)]
pub struct NoSpeechSource;

impl SpeechSource for NoSpeechSource {
    fn is_available(&self) -> bool {
        false
    }
    fn open(&mut self, _locale: &str) -> Result<(), SpeechError> {
        Err(SpeechError::Unsupported)
    }
    fn close(&mut self) {}
    fn try_recv(&mut self) -> Option<TranscriptEvent> {
        None
    }
}

/// Reads newline-delimited transcript fragments from a file or FIFO, one
/// fragment per line; lines prefixed with `~` are interim. This is the
/// shipped stand-in for a platform recognizer and the way external ASR
/// tooling is piped in.
#[derive(Debug)]
pub struct FifoSpeechSource {
    path: PathBuf,
    rx: Option<Receiver<TranscriptEvent>>,
}

impl FifoSpeechSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            rx: None,
        }
    }
}

impl SpeechSource for FifoSpeechSource {
    fn is_available(&self) -> bool {
        true
    }

    fn open(&mut self, locale: &str) -> Result<(), SpeechError> {
        let (tx, rx) = mpsc::channel();
        let path = self.path.clone();
        info!(path = %path.display(), locale, "opening transcript source");

        // The open itself happens on the reader thread: opening a FIFO
        // blocks until a writer appears, and the playback loop must not.
        std::thread::spawn(move || {
            let file = match File::open(&path) {
                Ok(f) => f,
                Err(e) => {
                    let err = if e.kind() == std::io::ErrorKind::PermissionDenied {
                        SpeechError::PermissionDenied
                    } else {
                        SpeechError::SessionEnded
                    };
                    let _ = tx.send(TranscriptEvent::Failed(err));
                    return;
                }
            };
            for line in BufReader::new(file).lines() {
                let Ok(line) = line else { break };
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let event = match trimmed.strip_prefix('~') {
                    Some(rest) => TranscriptEvent::Interim(rest.trim().to_owned()),
                    None => TranscriptEvent::Final(trimmed.to_owned()),
                };
                if tx.send(event).is_err() {
                    return;
                }
            }
            let _ = tx.send(TranscriptEvent::Ended);
        });

        self.rx = Some(rx);
        Ok(())
    }

    fn close(&mut self) {
        self.rx = None;
    }

    fn try_recv(&mut self) -> Option<TranscriptEvent> {
        let rx = self.rx.as_ref()?;
        match rx.try_recv() {
            Ok(ev) => Some(ev),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => None,
        }
    }
}

/// Channel-fed source for headless tests and external integrations.
pub struct ChannelSpeechSource {
    rx: Receiver<TranscriptEvent>,
}

impl ChannelSpeechSource {
    pub fn new(rx: Receiver<TranscriptEvent>) -> Self {
        Self { rx }
    }

    pub fn pair() -> (Sender<TranscriptEvent>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self { rx })
    }
}

impl SpeechSource for ChannelSpeechSource {
    fn is_available(&self) -> bool {
        true
    }
    fn open(&mut self, _locale: &str) -> Result<(), SpeechError> {
        Ok(())
    }
    fn close(&mut self) {}
    fn try_recv(&mut self) -> Option<TranscriptEvent> {
        self.rx.try_recv().ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignState {
    Idle,
    Listening,
    Restarting,
    Stopped,
}

/// Events the alignment engine emits toward the playback layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlignmentEvent {
    /// Live caption text for display.
    Caption { text: String, interim: bool },
    /// The best-matching line changed.
    LineMatched(usize),
    /// A terminal speech failure; voice mode should be abandoned.
    Error(SpeechError),
}

/// Tracks the reader's position in the script from recognized speech.
///
/// Final transcript words are looked up exactly in the script index, with a
/// bounded-edit-distance fallback, candidates restricted to a forward
/// search window anchored at the last confirmed line. Sessions that die
/// unexpectedly are restarted with exponential backoff until a retry budget
/// is exhausted.
pub struct AlignmentEngine {
    source: Box<dyn SpeechSource>,
    locale: String,
    state: AlignState,
    pub last_matched_line: usize,
    restart_attempts: u32,
    restart_at_ms: Option<u64>,
}

impl AlignmentEngine {
    pub fn new(source: Box<dyn SpeechSource>, locale: impl Into<String>) -> Self {
        Self {
            source,
            locale: locale.into(),
            state: AlignState::Idle,
            last_matched_line: 0,
            restart_attempts: 0,
            restart_at_ms: None,
        }
    }

    pub fn state(&self) -> AlignState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        self.state == AlignState::Listening
    }

    /// Begin listening. Capability and open failures are reported as events
    /// rather than returned: the caller treats them exactly like failures
    /// that happen mid-session.
    pub fn start(&mut self, now_ms: u64) -> Vec<AlignmentEvent> {
        if self.state == AlignState::Listening {
            return Vec::new();
        }
        if !self.source.is_available() {
            self.state = AlignState::Stopped;
            return vec![AlignmentEvent::Error(SpeechError::Unsupported)];
        }
        match self.source.open(&self.locale) {
            Ok(()) => {
                info!(locale = %self.locale, "speech session listening");
                self.state = AlignState::Listening;
                self.restart_attempts = 0;
                self.restart_at_ms = None;
                Vec::new()
            }
            Err(err) if err.is_retryable() => self.report_failure(err, now_ms),
            Err(err) => {
                self.state = AlignState::Stopped;
                vec![AlignmentEvent::Error(err)]
            }
        }
    }

    /// End the session and cancel any pending restart, from any sub-state.
    pub fn stop(&mut self) {
        self.source.close();
        self.restart_at_ms = None;
        self.state = AlignState::Idle;
    }

    /// Manual navigation override: re-center the search window so voice
    /// tracking and the user never fight.
    pub fn set_current_line(&mut self, line_index: usize) {
        self.last_matched_line = line_index;
    }

    pub fn reset(&mut self) {
        self.last_matched_line = 0;
    }

    /// Drain pending transcript events and service the restart timer.
    pub fn on_tick(&mut self, script: &Script, now_ms: u64) -> Vec<AlignmentEvent> {
        let mut out = Vec::new();

        if self.state == AlignState::Restarting {
            if let Some(at) = self.restart_at_ms {
                if now_ms >= at {
                    self.restart_at_ms = None;
                    match self.source.open(&self.locale) {
                        Ok(()) => {
                            info!(attempt = self.restart_attempts, "speech session restarted");
                            self.state = AlignState::Listening;
                            self.restart_attempts = 0;
                        }
                        Err(err) if err.is_retryable() => {
                            out.extend(self.report_failure(err, now_ms));
                        }
                        Err(err) => {
                            self.state = AlignState::Stopped;
                            out.push(AlignmentEvent::Error(err));
                        }
                    }
                }
            }
        }

        // Late/duplicate events after stop() are dropped by this guard.
        if self.state != AlignState::Listening {
            return out;
        }

        while let Some(event) = self.source.try_recv() {
            match event {
                TranscriptEvent::Interim(text) => {
                    out.push(AlignmentEvent::Caption {
                        text,
                        interim: true,
                    });
                }
                TranscriptEvent::Final(text) => {
                    for line in self.align_fragment(script, &text) {
                        out.push(AlignmentEvent::LineMatched(line));
                    }
                    out.push(AlignmentEvent::Caption {
                        text,
                        interim: false,
                    });
                }
                TranscriptEvent::NoSpeech => {}
                TranscriptEvent::Ended => {
                    warn!("speech session ended unexpectedly");
                    out.extend(self.report_failure(SpeechError::SessionEnded, now_ms));
                    break;
                }
                TranscriptEvent::Failed(err) if err.is_retryable() => {
                    out.extend(self.report_failure(err, now_ms));
                    break;
                }
                TranscriptEvent::Failed(err) => {
                    self.state = AlignState::Stopped;
                    out.push(AlignmentEvent::Error(err));
                    break;
                }
            }
        }

        out
    }

    /// Align one finalized fragment; returns each distinct line the anchor
    /// moved to, in order. Repeated matches to the same line emit nothing.
    fn align_fragment(&mut self, script: &Script, text: &str) -> Vec<usize> {
        let mut moved = Vec::new();

        for raw in text.split_whitespace() {
            let spoken = normalize(raw);
            if spoken.is_empty() {
                continue;
            }
            if let Some(line) = self.best_line_for(script, &spoken) {
                if line != self.last_matched_line {
                    self.last_matched_line = line;
                    moved.push(line);
                    debug!(line, "alignment anchor moved");
                }
            }
        }

        moved
    }

    /// Best-scoring candidate line for a spoken word inside the forward
    /// search window. Score is window distance plus edit distance.
    fn best_line_for(&self, script: &Script, spoken: &str) -> Option<usize> {
        let window_start = self.last_matched_line;
        let window_end = window_start + SEARCH_WINDOW_LINES;
        let in_window =
            |line: usize| line >= window_start && line <= window_end;

        let mut best: Option<(usize, usize)> = None; // (score, line)
        let mut consider = |line: usize, edits: usize| {
            let score = line - window_start + edits;
            if best.map_or(true, |(s, _)| score < s) {
                best = Some((score, line));
            }
        };

        let exact = script.lookup(spoken);
        if !exact.is_empty() {
            for pos in exact.iter().filter(|p| in_window(p.line_index)) {
                consider(pos.line_index, 0);
            }
        } else {
            // Fuzzy fallback, pre-filtered to words with at least one
            // position inside the window so the edit-distance work stays
            // bounded.
            for (word, positions) in script.indexed_words() {
                if !positions.iter().any(|p| in_window(p.line_index)) {
                    continue;
                }
                if !fuzzy::is_match(spoken, word) {
                    continue;
                }
                let edits = fuzzy::distance(spoken, word);
                for pos in positions.iter().filter(|p| in_window(p.line_index)) {
                    consider(pos.line_index, edits);
                }
            }
        }

        best.map(|(_, line)| line)
    }

    /// Record a session failure: schedule a backoff restart, or give up once
    /// the retry budget is spent. Never schedules past the budget.
    fn report_failure(&mut self, err: SpeechError, now_ms: u64) -> Vec<AlignmentEvent> {
        self.source.close();

        if self.restart_attempts >= MAX_RESTART_ATTEMPTS {
            warn!(attempts = self.restart_attempts, "speech recovery exhausted");
            self.state = AlignState::Stopped;
            self.restart_at_ms = None;
            return vec![AlignmentEvent::Error(SpeechError::RecoveryExhausted {
                attempts: self.restart_attempts,
            })];
        }

        let delay =
            (RESTART_BASE_DELAY_MS << self.restart_attempts).min(RESTART_MAX_DELAY_MS);
        self.restart_attempts += 1;
        self.restart_at_ms = Some(now_ms + delay);
        self.state = AlignState::Restarting;
        debug!(delay_ms = delay, attempt = self.restart_attempts, err = %err, "scheduling speech restart");
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    /// Source whose open() outcomes are scripted, for driving the restart
    /// and backoff paths.
    struct ScriptedSource {
        opens: Vec<Result<(), SpeechError>>,
        events: Vec<TranscriptEvent>,
    }

    impl SpeechSource for ScriptedSource {
        fn is_available(&self) -> bool {
            true
        }
        fn open(&mut self, _locale: &str) -> Result<(), SpeechError> {
            if self.opens.is_empty() {
                Ok(())
            } else {
                self.opens.remove(0)
            }
        }
        fn close(&mut self) {}
        fn try_recv(&mut self) -> Option<TranscriptEvent> {
            if self.events.is_empty() {
                None
            } else {
                Some(self.events.remove(0))
            }
        }
    }

    fn engine_with_events(events: Vec<TranscriptEvent>) -> AlignmentEngine {
        AlignmentEngine::new(
            Box::new(ScriptedSource {
                opens: vec![],
                events,
            }),
            "en-US",
        )
    }

    fn two_line_script() -> Script {
        Script::build("one two three\nfour five six", 0)
    }

    #[test]
    fn start_without_capability_reports_unsupported() {
        let mut engine = AlignmentEngine::new(Box::new(NoSpeechSource), "en-US");
        let events = engine.start(0);
        assert_eq!(
            events,
            vec![AlignmentEvent::Error(SpeechError::Unsupported)]
        );
        assert_eq!(engine.state(), AlignState::Stopped);
    }

    #[test]
    fn interim_fragments_caption_but_never_align() {
        let mut engine =
            engine_with_events(vec![TranscriptEvent::Interim("four five".into())]);
        engine.start(0);
        let script = two_line_script();
        let events = engine.on_tick(&script, 0);
        assert_eq!(
            events,
            vec![AlignmentEvent::Caption {
                text: "four five".into(),
                interim: true
            }]
        );
        assert_eq!(engine.last_matched_line, 0);
    }

    #[test]
    fn final_fragment_moves_anchor_forward() {
        let mut engine =
            engine_with_events(vec![TranscriptEvent::Final("four five".into())]);
        engine.start(0);
        let script = two_line_script();
        let events = engine.on_tick(&script, 0);
        assert!(events.contains(&AlignmentEvent::LineMatched(1)));
        assert_eq!(engine.last_matched_line, 1);
    }

    #[test]
    fn repeated_matches_on_same_line_emit_once() {
        let mut engine = engine_with_events(vec![
            TranscriptEvent::Final("four".into()),
            TranscriptEvent::Final("five six".into()),
        ]);
        engine.start(0);
        let script = two_line_script();
        let events = engine.on_tick(&script, 0);
        let matches: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, AlignmentEvent::LineMatched(_)))
            .collect();
        assert_eq!(matches.len(), 1);
    }

    #[test]
    fn anchor_never_moves_backward_within_session() {
        let mut engine = engine_with_events(vec![
            TranscriptEvent::Final("four five".into()),
            TranscriptEvent::Final("one two".into()),
        ]);
        engine.start(0);
        let script = two_line_script();
        engine.on_tick(&script, 0);
        // "one two" is behind the anchor; the forward-only window keeps the
        // anchor where it is (line 0's words are outside [1, 51]... they are
        // at line 0 which is < window start).
        assert_eq!(engine.last_matched_line, 1);
    }

    #[test]
    fn fuzzy_fallback_matches_misrecognized_words() {
        let mut engine = engine_with_events(vec![TranscriptEvent::Final("fiv".into())]);
        engine.start(0);
        let script = two_line_script();
        let events = engine.on_tick(&script, 0);
        assert!(events.contains(&AlignmentEvent::LineMatched(1)));
    }

    #[test]
    fn candidates_outside_window_are_ignored() {
        let text = (0..60)
            .map(|i| format!("filler{i}"))
            .collect::<Vec<_>>()
            .join("\n")
            + "\nmarker";
        let script = Script::build(&text, 0);
        let mut engine = engine_with_events(vec![TranscriptEvent::Final("marker".into())]);
        engine.start(0);
        let events = engine.on_tick(&script, 0);
        // marker is on line 60, outside [0, 50]
        assert!(events
            .iter()
            .all(|e| !matches!(e, AlignmentEvent::LineMatched(_))));
        assert_eq!(engine.last_matched_line, 0);
    }

    #[test]
    fn set_current_line_recenters_window() {
        let mut engine = engine_with_events(vec![]);
        engine.start(0);
        engine.set_current_line(30);
        assert_eq!(engine.last_matched_line, 30);
        engine.reset();
        assert_eq!(engine.last_matched_line, 0);
    }

    #[test]
    fn duplicate_word_resolves_to_nearest_in_window() {
        let script = Script::build("echo alpha\nbeta\ngamma\necho delta", 0);
        let mut engine = engine_with_events(vec![TranscriptEvent::Final("echo".into())]);
        engine.start(0);
        engine.on_tick(&script, 0);
        // both line 0 and line 3 hold "echo"; line 0 scores 0, line 3 scores 3
        assert_eq!(engine.last_matched_line, 0);
    }

    #[test]
    fn transient_end_schedules_backoff_restart() {
        let mut engine = engine_with_events(vec![TranscriptEvent::Ended]);
        engine.start(0);
        let script = two_line_script();
        engine.on_tick(&script, 1_000);
        assert_eq!(engine.state(), AlignState::Restarting);
        // before the deadline nothing happens
        engine.on_tick(&script, 1_400);
        assert_eq!(engine.state(), AlignState::Restarting);
        // first backoff is 500ms
        engine.on_tick(&script, 1_500);
        assert_eq!(engine.state(), AlignState::Listening);
    }

    #[test]
    fn five_failed_restarts_exhaust_recovery() {
        let source = ScriptedSource {
            // initial open succeeds, every restart open fails transiently
            opens: vec![
                Ok(()),
                Err(SpeechError::SessionEnded),
                Err(SpeechError::SessionEnded),
                Err(SpeechError::SessionEnded),
                Err(SpeechError::SessionEnded),
                Err(SpeechError::SessionEnded),
            ],
            events: vec![TranscriptEvent::Ended],
        };
        let mut engine = AlignmentEngine::new(Box::new(source), "en-US");
        engine.start(0);
        let script = two_line_script();

        let mut now = 0;
        engine.on_tick(&script, now); // consume Ended, schedule restart 1
        let mut terminal = Vec::new();
        for _ in 0..10 {
            now += RESTART_MAX_DELAY_MS;
            terminal.extend(engine.on_tick(&script, now));
            if engine.state() == AlignState::Stopped {
                break;
            }
        }
        assert_eq!(engine.state(), AlignState::Stopped);
        assert_matches!(
            terminal.as_slice(),
            [AlignmentEvent::Error(SpeechError::RecoveryExhausted { attempts: 5 })]
        );
        // a further tick never schedules another restart
        let after = engine.on_tick(&script, now + 60_000);
        assert!(after.is_empty());
        assert_eq!(engine.state(), AlignState::Stopped);
    }

    #[test]
    fn backoff_delays_grow_and_cap() {
        let source = ScriptedSource {
            opens: vec![
                Ok(()),
                Err(SpeechError::SessionEnded),
                Err(SpeechError::SessionEnded),
            ],
            events: vec![TranscriptEvent::Ended],
        };
        let mut engine = AlignmentEngine::new(Box::new(source), "en-US");
        engine.start(0);
        let script = two_line_script();

        engine.on_tick(&script, 0); // failure 1: restart at 500
        engine.on_tick(&script, 499);
        assert_eq!(engine.state(), AlignState::Restarting);
        engine.on_tick(&script, 500); // open fails: restart at 500 + 1000
        assert_eq!(engine.state(), AlignState::Restarting);
        engine.on_tick(&script, 1_499);
        assert_eq!(engine.state(), AlignState::Restarting);
        engine.on_tick(&script, 1_500); // open fails: restart at 1500 + 2000
        assert_eq!(engine.state(), AlignState::Restarting);
        engine.on_tick(&script, 3_500); // succeeds
        assert_eq!(engine.state(), AlignState::Listening);
    }

    #[test]
    fn permission_denied_is_terminal() {
        let mut engine = engine_with_events(vec![TranscriptEvent::Failed(
            SpeechError::PermissionDenied,
        )]);
        engine.start(0);
        let script = two_line_script();
        let events = engine.on_tick(&script, 0);
        assert_eq!(
            events,
            vec![AlignmentEvent::Error(SpeechError::PermissionDenied)]
        );
        assert_eq!(engine.state(), AlignState::Stopped);
    }

    #[test]
    fn stop_cancels_pending_restart() {
        let mut engine = engine_with_events(vec![TranscriptEvent::Ended]);
        engine.start(0);
        let script = two_line_script();
        engine.on_tick(&script, 0);
        assert_eq!(engine.state(), AlignState::Restarting);
        engine.stop();
        assert_eq!(engine.state(), AlignState::Idle);
        // restart deadline is gone
        let events = engine.on_tick(&script, 60_000);
        assert!(events.is_empty());
        assert_eq!(engine.state(), AlignState::Idle);
    }

    #[test]
    fn events_after_stop_are_dropped() {
        let mut engine =
            engine_with_events(vec![TranscriptEvent::Final("four five".into())]);
        engine.start(0);
        engine.stop();
        let script = two_line_script();
        let events = engine.on_tick(&script, 0);
        assert!(events.is_empty());
        assert_eq!(engine.last_matched_line, 0);
    }

    #[test]
    fn silence_is_not_an_error() {
        let mut engine = engine_with_events(vec![
            TranscriptEvent::NoSpeech,
            TranscriptEvent::Final("four five".into()),
        ]);
        engine.start(0);
        let script = two_line_script();
        let events = engine.on_tick(&script, 0);
        assert_eq!(engine.state(), AlignState::Listening);
        assert!(events.contains(&AlignmentEvent::LineMatched(1)));
    }

    #[test]
    fn channel_source_round_trip() {
        let (tx, source) = ChannelSpeechSource::pair();
        let mut engine = AlignmentEngine::new(Box::new(source), "en-US");
        engine.start(0);
        tx.send(TranscriptEvent::Final("one two".into())).unwrap();
        let script = two_line_script();
        let events = engine.on_tick(&script, 0);
        assert!(events
            .iter()
            .any(|e| matches!(e, AlignmentEvent::Caption { interim: false, .. })));
    }
}
