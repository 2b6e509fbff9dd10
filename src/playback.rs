use crate::align::{AlignmentEngine, AlignmentEvent, SpeechSource};
use crate::error::SpeechError;
use crate::page::{PageDirection, Paginator};
use crate::rsvp::RsvpScheduler;
use crate::script::Script;
use crate::scroll::KinematicScroller;

/// Playback mode; cycling order is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Mode {
    Continuous,
    Paging,
    Voice,
    Rsvp,
}

impl Mode {
    pub fn next(self) -> Self {
        match self {
            Mode::Continuous => Mode::Paging,
            Mode::Paging => Mode::Voice,
            Mode::Voice => Mode::Rsvp,
            Mode::Rsvp => Mode::Continuous,
        }
    }
}

/// The single authoritative position, tagged by the mode that owns it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackPosition {
    Continuous { translate_y: f64 },
    Paging { page_index: usize },
    Voice { line_index: usize },
    Rsvp { word_index: usize },
}

/// Top-level coordinator: owns the script and the four pacing engines, and
/// decides which one is authoritative for the current mode. Mode switches
/// stop the outgoing engine completely (no dangling deadlines or sessions)
/// before the incoming one takes over.
pub struct Playback {
    pub script: Script,
    pub mode: Mode,
    pub scroller: KinematicScroller,
    pub paginator: Paginator,
    pub rsvp: RsvpScheduler,
    pub align: AlignmentEngine,
    pub caption: Option<(String, bool)>,
    pub voice_line: usize,
    pub speech_fault: Option<SpeechError>,
    wrap_limit: usize,
}

impl Playback {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        text: &str,
        wrap_limit: usize,
        speed_lines_per_sec: f64,
        line_height_px: f64,
        words_per_minute: u32,
        overlap: f64,
        speech: Box<dyn SpeechSource>,
        locale: &str,
    ) -> Self {
        let script = Script::build(text, wrap_limit);
        let rsvp_words: Vec<String> = script.words().map(str::to_owned).collect();
        Self {
            script,
            mode: Mode::Continuous,
            scroller: KinematicScroller::new(speed_lines_per_sec, line_height_px),
            paginator: Paginator::new(overlap),
            rsvp: RsvpScheduler::new(rsvp_words, words_per_minute),
            align: AlignmentEngine::new(speech, locale),
            caption: None,
            voice_line: 0,
            speech_fault: None,
            wrap_limit,
        }
    }

    /// Replace the script text; every derived structure is rebuilt and all
    /// per-session state is discarded.
    pub fn set_script(&mut self, text: &str) {
        self.script = Script::build(text, self.wrap_limit);
        self.rsvp = RsvpScheduler::new(
            self.script.words().map(str::to_owned).collect(),
            self.rsvp.words_per_minute,
        );
        self.scroller.reset();
        self.paginator.reset();
        self.align.stop();
        self.align.reset();
        self.voice_line = 0;
        self.caption = None;
    }

    pub fn set_wrap_limit(&mut self, wrap_limit: usize) {
        self.wrap_limit = wrap_limit;
        let text = self.script.text.clone();
        self.set_script(&text);
    }

    pub fn wrap_limit(&self) -> usize {
        self.wrap_limit
    }

    /// Switch to the next mode in the fixed cycle.
    pub fn cycle_mode(&mut self) {
        let next = self.mode.next();
        self.set_mode(next);
    }

    pub fn set_mode(&mut self, mode: Mode) {
        if mode == self.mode {
            return;
        }
        // Outgoing engine goes fully idle first.
        self.scroller.stop();
        self.rsvp.stop();
        self.align.stop();
        self.caption = None;
        self.speech_fault = None;
        self.mode = mode;
        if mode == Mode::Voice {
            self.align.set_current_line(self.voice_line);
        }
    }

    /// Primary transport control for the current mode.
    pub fn toggle_play(&mut self, now_ms: u64) {
        match self.mode {
            Mode::Continuous => self.scroller.toggle_play(now_ms),
            Mode::Paging => {
                self.page(PageDirection::Forward, now_ms);
            }
            Mode::Voice => {
                if self.align.is_listening() {
                    self.align.stop();
                } else {
                    self.speech_fault = None;
                    let events = self.align.start(now_ms);
                    self.apply_alignment_events(events);
                }
            }
            Mode::Rsvp => {
                if self.rsvp.is_running() {
                    self.rsvp.pause();
                } else {
                    self.rsvp.start(now_ms);
                }
            }
        }
    }

    /// Drive whichever clocks are live. Returns true when presentation
    /// state changed and a redraw is warranted.
    pub fn on_tick(&mut self, now_ms: u64) -> bool {
        let mut changed = self.scroller.on_tick(now_ms);

        match self.mode {
            Mode::Paging => {
                if self.paginator.in_transition() {
                    self.paginator.transition_progress(now_ms);
                    changed = true;
                }
            }
            Mode::Voice => {
                let events = self.align.on_tick(&self.script, now_ms);
                if !events.is_empty() {
                    changed = true;
                }
                self.apply_alignment_events(events);
            }
            Mode::Rsvp => {
                changed |= self.rsvp.on_tick(now_ms);
            }
            Mode::Continuous => {}
        }

        changed
    }

    fn apply_alignment_events(&mut self, events: Vec<AlignmentEvent>) {
        for event in events {
            match event {
                AlignmentEvent::Caption { text, interim } => {
                    self.caption = Some((text, interim));
                }
                AlignmentEvent::LineMatched(line) => {
                    self.voice_line = line;
                    self.scroller.scroll_to_line(line);
                }
                AlignmentEvent::Error(err) => {
                    self.speech_fault = Some(err);
                }
            }
        }
    }

    /// Manual line navigation (arrows / wheel detents), mode-aware.
    pub fn seek_lines(&mut self, delta: isize, now_ms: u64) {
        match self.mode {
            Mode::Continuous | Mode::Voice => {
                let max_line = self.script.line_count().saturating_sub(1);
                let current = if self.mode == Mode::Voice {
                    self.voice_line
                } else {
                    self.scroller.active_line().min(max_line)
                };
                let target = current
                    .saturating_add_signed(delta)
                    .min(max_line);
                self.scroller.scroll_to_line(target);
                if self.mode == Mode::Voice {
                    self.voice_line = target;
                    // manual navigation re-anchors the voice search window
                    self.align.set_current_line(target);
                }
            }
            Mode::Paging => {
                let dir = if delta >= 0 {
                    PageDirection::Forward
                } else {
                    PageDirection::Backward
                };
                self.page(dir, now_ms);
            }
            Mode::Rsvp => {
                let target = self.rsvp.current_word.saturating_add_signed(delta);
                self.rsvp.go_to_word(target);
            }
        }
    }

    /// Jump to the beginning of the script in whatever unit the mode uses.
    pub fn seek_to_start(&mut self) {
        match self.mode {
            Mode::Continuous | Mode::Voice => {
                self.scroller.scroll_to_line(0);
                if self.mode == Mode::Voice {
                    self.voice_line = 0;
                    self.align.set_current_line(0);
                }
            }
            Mode::Paging => self.paginator.reset(),
            Mode::Rsvp => {
                self.rsvp.go_to_word(0);
            }
        }
    }

    pub fn page(&mut self, direction: PageDirection, now_ms: u64) -> bool {
        self.paginator.advance(
            direction,
            self.scroller.content_height,
            self.scroller.viewport_height,
            now_ms,
        )
    }

    /// Adjust the pace of the active mode: lines/sec for scrolling, WPM for
    /// RSVP.
    pub fn adjust_speed(&mut self, increase: bool) {
        match self.mode {
            Mode::Rsvp => {
                let step: i64 = if increase { 25 } else { -25 };
                let next = (i64::from(self.rsvp.words_per_minute) + step).clamp(60, 1_200);
                self.rsvp.set_pace(next as u32);
            }
            _ => {
                let step = if increase { 0.25 } else { -0.25 };
                let next = (self.scroller.speed_lines_per_sec + step).clamp(0.25, 10.0);
                self.scroller.set_speed(next);
            }
        }
    }

    pub fn set_metrics(&mut self, content_height: f64, viewport_height: f64) {
        self.scroller.set_metrics(content_height, viewport_height);
        self.paginator.clamp_to(content_height, viewport_height);
    }

    /// The authoritative position in mode-tagged form.
    pub fn position(&self) -> PlaybackPosition {
        match self.mode {
            Mode::Continuous => PlaybackPosition::Continuous {
                translate_y: self.scroller.offset_px,
            },
            Mode::Paging => PlaybackPosition::Paging {
                page_index: self.paginator.current_page,
            },
            Mode::Voice => PlaybackPosition::Voice {
                line_index: self.voice_line,
            },
            Mode::Rsvp => PlaybackPosition::Rsvp {
                word_index: self.rsvp.current_word,
            },
        }
    }

    /// Line to highlight for display. Suppressed from passive recomputation
    /// while a manual seek animation is in flight.
    pub fn active_line(&self) -> usize {
        let max_line = self.script.line_count().saturating_sub(1);
        match self.mode {
            Mode::Voice => self.voice_line.min(max_line),
            Mode::Paging => {
                let offset = self.paginator.page_offset(self.scroller.viewport_height);
                ((offset / self.scroller.line_height_px) as usize).min(max_line)
            }
            _ => self.scroller.active_line().min(max_line),
        }
    }

    pub fn is_playing(&self) -> bool {
        match self.mode {
            Mode::Continuous => self.scroller.is_playing(),
            Mode::Paging => self.paginator.in_transition(),
            Mode::Voice => self.align.is_listening(),
            Mode::Rsvp => self.rsvp.is_running(),
        }
    }
}
