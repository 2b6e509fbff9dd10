use std::f64::consts::FRAC_PI_2;

pub const COUNTDOWN_TICKS: u32 = 3;
pub const COUNTDOWN_TICK_MS: u64 = 1_000;
pub const RAMP_DURATION_MS: u64 = 1_500;

const SEEK_SMOOTHING: f64 = 0.15;
const SEEK_SNAP_PX: f64 = 0.5;

/// Playback phase for continuous scrolling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollPhase {
    Idle,
    CountingDown,
    RampingUp,
    Steady,
    RampingDown,
}

/// Integrates elapsed time into a scroll offset, with eased speed ramps at
/// start/stop, a cancellable countdown, end-of-script detection, and a
/// smooth manual seek that is independent of playback speed.
///
/// The offset is a translate-y in pixels: zero at the top of the script and
/// decreasing as the text scrolls upward. Its magnitude is clamped to
/// `content_height - viewport_height` so there is never a blank viewport.
#[derive(Debug, Clone)]
pub struct KinematicScroller {
    pub offset_px: f64,
    pub speed_lines_per_sec: f64,
    pub line_height_px: f64,
    pub content_height: f64,
    pub viewport_height: f64,
    /// Slack before the bottom edge that counts as "reached the end";
    /// half a line, so it stays sensible at any line height.
    pub end_threshold_px: f64,
    phase: ScrollPhase,
    countdown_remaining: u32,
    countdown_next_ms: u64,
    ramp_started_ms: u64,
    last_frame_ms: Option<u64>,
    seek_target_px: Option<f64>,
    ended: bool,
}

impl KinematicScroller {
    pub fn new(speed_lines_per_sec: f64, line_height_px: f64) -> Self {
        Self {
            offset_px: 0.0,
            speed_lines_per_sec: speed_lines_per_sec.max(0.0),
            line_height_px: line_height_px.max(1.0),
            content_height: 0.0,
            viewport_height: 0.0,
            end_threshold_px: line_height_px.max(1.0) / 2.0,
            phase: ScrollPhase::Idle,
            countdown_remaining: 0,
            countdown_next_ms: 0,
            ramp_started_ms: 0,
            last_frame_ms: None,
            seek_target_px: None,
            ended: false,
        }
    }

    pub fn phase(&self) -> ScrollPhase {
        self.phase
    }

    pub fn is_playing(&self) -> bool {
        !matches!(self.phase, ScrollPhase::Idle)
    }

    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Countdown value for display, if counting down.
    pub fn countdown(&self) -> Option<u32> {
        (self.phase == ScrollPhase::CountingDown).then_some(self.countdown_remaining)
    }

    /// Viewport/content geometry, supplied by the presentation layer on
    /// every resize. Clamped so per-frame math never divides by zero.
    pub fn set_metrics(&mut self, content_height: f64, viewport_height: f64) {
        self.content_height = content_height.max(0.0);
        self.viewport_height = viewport_height.max(1.0);
        self.offset_px = self.clamp_offset(self.offset_px);
    }

    pub fn set_speed(&mut self, lines_per_sec: f64) {
        self.speed_lines_per_sec = lines_per_sec.max(0.0);
    }

    fn max_scroll(&self) -> f64 {
        (self.content_height - self.viewport_height).max(0.0)
    }

    fn clamp_offset(&self, offset: f64) -> f64 {
        offset.clamp(-self.max_scroll(), 0.0)
    }

    /// Toggle play/pause.
    ///
    /// Idle starts a 3-tick countdown (restarting from the top when the
    /// script previously ended); toggling during the countdown cancels it
    /// with no scrolling; toggling while moving begins the ramp-down; a
    /// second toggle during ramp-down is ignored so the deceleration
    /// finishes cleanly.
    pub fn toggle_play(&mut self, now_ms: u64) {
        match self.phase {
            ScrollPhase::Idle => {
                if self.ended {
                    self.offset_px = 0.0;
                    self.ended = false;
                }
                self.phase = ScrollPhase::CountingDown;
                self.countdown_remaining = COUNTDOWN_TICKS;
                self.countdown_next_ms = now_ms + COUNTDOWN_TICK_MS;
            }
            ScrollPhase::CountingDown => {
                self.phase = ScrollPhase::Idle;
                self.last_frame_ms = None;
            }
            ScrollPhase::RampingUp | ScrollPhase::Steady => {
                self.phase = ScrollPhase::RampingDown;
                self.ramp_started_ms = now_ms;
            }
            ScrollPhase::RampingDown => {}
        }
    }

    /// Hard stop: no ramp, no pending deadlines.
    pub fn stop(&mut self) {
        self.phase = ScrollPhase::Idle;
        self.last_frame_ms = None;
        self.seek_target_px = None;
    }

    pub fn reset(&mut self) {
        self.stop();
        self.offset_px = 0.0;
        self.ended = false;
    }

    /// Center the given line in the viewport via exponential smoothing,
    /// decoupled from playback speed.
    pub fn scroll_to_line(&mut self, line_index: usize) {
        let line_top = line_index as f64 * self.line_height_px;
        let center = (self.viewport_height - self.line_height_px) / 2.0;
        self.seek_target_px = Some(self.clamp_offset(center - line_top));
    }

    /// Wheel-style direct adjustment; cancels any in-flight smooth seek.
    pub fn nudge(&mut self, delta_px: f64) {
        self.seek_target_px = None;
        self.offset_px = self.clamp_offset(self.offset_px + delta_px);
        if self.ended && delta_px > 0.0 {
            self.ended = false;
        }
    }

    /// Whether a manual-seek animation is in flight (suppresses passive
    /// active-line recomputation so user intent is never overwritten).
    pub fn seeking(&self) -> bool {
        self.seek_target_px.is_some()
    }

    /// Line index closest to the viewport center at the current offset.
    pub fn active_line(&self) -> usize {
        let center = -self.offset_px + self.viewport_height / 2.0;
        (center / self.line_height_px).floor().max(0.0) as usize
    }

    fn ramp_multiplier(&self, now_ms: u64) -> f64 {
        let elapsed = now_ms.saturating_sub(self.ramp_started_ms) as f64;
        let t = (elapsed / RAMP_DURATION_MS as f64).min(1.0);
        match self.phase {
            ScrollPhase::RampingUp => (t * FRAC_PI_2).sin(),
            ScrollPhase::RampingDown => (t * FRAC_PI_2).cos(),
            ScrollPhase::Steady => 1.0,
            _ => 0.0,
        }
    }

    /// Advance the state machine one frame. Returns true if the offset or
    /// phase changed (the caller redraws on true).
    pub fn on_tick(&mut self, now_ms: u64) -> bool {
        let mut changed = self.interpolate_seek();

        match self.phase {
            ScrollPhase::Idle => {}
            ScrollPhase::CountingDown => {
                if now_ms >= self.countdown_next_ms {
                    self.countdown_remaining = self.countdown_remaining.saturating_sub(1);
                    if self.countdown_remaining == 0 {
                        self.phase = ScrollPhase::RampingUp;
                        self.ramp_started_ms = now_ms;
                        self.last_frame_ms = Some(now_ms);
                    } else {
                        self.countdown_next_ms += COUNTDOWN_TICK_MS;
                    }
                    changed = true;
                }
            }
            ScrollPhase::RampingUp | ScrollPhase::Steady | ScrollPhase::RampingDown => {
                let last = self.last_frame_ms.unwrap_or(now_ms);
                let elapsed_secs = now_ms.saturating_sub(last) as f64 / 1_000.0;
                self.last_frame_ms = Some(now_ms);

                let multiplier = self.ramp_multiplier(now_ms);
                let delta =
                    self.line_height_px * self.speed_lines_per_sec * multiplier * elapsed_secs;
                // A manual seek owns the offset until it lands; otherwise an
                // upward seek and the integration tug in opposite directions
                // and the animation never crosses the snap threshold.
                if delta > 0.0 && self.seek_target_px.is_none() {
                    self.offset_px = self.clamp_offset(self.offset_px - delta);
                    changed = true;
                }

                if self.phase == ScrollPhase::RampingUp
                    && now_ms.saturating_sub(self.ramp_started_ms) >= RAMP_DURATION_MS
                {
                    self.phase = ScrollPhase::Steady;
                    changed = true;
                } else if self.phase == ScrollPhase::RampingDown
                    && now_ms.saturating_sub(self.ramp_started_ms) >= RAMP_DURATION_MS
                {
                    self.phase = ScrollPhase::Idle;
                    self.last_frame_ms = None;
                    changed = true;
                }

                if self.at_end() && self.phase != ScrollPhase::RampingDown {
                    self.phase = ScrollPhase::Idle;
                    self.last_frame_ms = None;
                    self.ended = true;
                    changed = true;
                }
            }
        }

        changed
    }

    fn at_end(&self) -> bool {
        self.content_height > 0.0
            && self.offset_px.abs() + self.viewport_height
                >= self.content_height - self.end_threshold_px
    }

    fn interpolate_seek(&mut self) -> bool {
        let Some(target) = self.seek_target_px else {
            return false;
        };
        let delta = target - self.offset_px;
        if delta.abs() <= SEEK_SNAP_PX {
            self.offset_px = target;
            self.seek_target_px = None;
        } else {
            self.offset_px += delta * SEEK_SMOOTHING;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scroller() -> KinematicScroller {
        let mut s = KinematicScroller::new(2.0, 20.0);
        s.set_metrics(2_000.0, 400.0);
        s
    }

    fn run_countdown(s: &mut KinematicScroller, start_ms: u64) -> u64 {
        s.toggle_play(start_ms);
        let mut now = start_ms;
        for _ in 0..COUNTDOWN_TICKS {
            now += COUNTDOWN_TICK_MS;
            s.on_tick(now);
        }
        assert_eq!(s.phase(), ScrollPhase::RampingUp);
        now
    }

    #[test]
    fn play_enters_countdown_with_three_ticks() {
        let mut s = scroller();
        s.toggle_play(0);
        assert_eq!(s.phase(), ScrollPhase::CountingDown);
        assert_eq!(s.countdown(), Some(3));
        s.on_tick(1_000);
        assert_eq!(s.countdown(), Some(2));
        s.on_tick(2_000);
        assert_eq!(s.countdown(), Some(1));
        s.on_tick(3_000);
        assert_eq!(s.phase(), ScrollPhase::RampingUp);
    }

    #[test]
    fn countdown_is_cancellable_without_scrolling() {
        let mut s = scroller();
        s.toggle_play(0);
        s.on_tick(1_000);
        s.toggle_play(1_100);
        assert_eq!(s.phase(), ScrollPhase::Idle);
        assert_eq!(s.offset_px, 0.0);
    }

    #[test]
    fn ramp_up_reaches_steady_and_integrates_speed() {
        let mut s = scroller();
        let mut now = run_countdown(&mut s, 0);
        now += RAMP_DURATION_MS;
        s.on_tick(now);
        assert_eq!(s.phase(), ScrollPhase::Steady);
        assert!(s.offset_px < 0.0, "ramp-up should have scrolled some");

        let before = s.offset_px;
        now += 1_000;
        s.on_tick(now);
        // steady: 20px/line * 2 lines/s * 1s = 40px
        assert!((before - s.offset_px - 40.0).abs() < 1e-6);
    }

    #[test]
    fn ramp_multiplier_starts_near_zero() {
        let mut s = scroller();
        let now = run_countdown(&mut s, 0);
        s.on_tick(now + 16);
        // 16ms into a 1500ms sine ramp is ~1.7% of full speed
        assert!(s.offset_px.abs() < 0.05);
    }

    #[test]
    fn pause_ramps_down_then_idles() {
        let mut s = scroller();
        let mut now = run_countdown(&mut s, 0);
        now += RAMP_DURATION_MS + 500;
        s.on_tick(now);
        s.toggle_play(now);
        assert_eq!(s.phase(), ScrollPhase::RampingDown);

        // a second toggle during ramp-down is ignored
        s.toggle_play(now + 100);
        assert_eq!(s.phase(), ScrollPhase::RampingDown);

        now += RAMP_DURATION_MS;
        s.on_tick(now);
        assert_eq!(s.phase(), ScrollPhase::Idle);
    }

    #[test]
    fn offset_magnitude_never_exceeds_scrollable_range() {
        let mut s = KinematicScroller::new(100.0, 20.0);
        s.set_metrics(500.0, 300.0);
        let mut now = run_countdown(&mut s, 0);
        for _ in 0..200 {
            now += 100;
            s.on_tick(now);
            assert!(s.offset_px.abs() <= 200.0 + 1e-9);
            assert!(s.offset_px <= 0.0);
        }
    }

    #[test]
    fn end_detection_pauses_and_marks_ended() {
        let mut s = KinematicScroller::new(50.0, 20.0);
        s.set_metrics(600.0, 300.0);
        let mut now = run_countdown(&mut s, 0);
        for _ in 0..100 {
            now += 100;
            s.on_tick(now);
            if s.has_ended() {
                break;
            }
        }
        assert!(s.has_ended());
        assert_eq!(s.phase(), ScrollPhase::Idle);
    }

    #[test]
    fn play_after_end_restarts_from_top() {
        let mut s = KinematicScroller::new(50.0, 20.0);
        s.set_metrics(600.0, 300.0);
        let mut now = run_countdown(&mut s, 0);
        for _ in 0..100 {
            now += 100;
            s.on_tick(now);
        }
        assert!(s.has_ended());
        s.toggle_play(now);
        assert_eq!(s.offset_px, 0.0);
        assert!(!s.has_ended());
        assert_eq!(s.phase(), ScrollPhase::CountingDown);
    }

    #[test]
    fn smooth_seek_converges_and_snaps() {
        let mut s = scroller();
        s.scroll_to_line(30);
        assert!(s.seeking());
        for _ in 0..200 {
            s.on_tick(0);
            if !s.seeking() {
                break;
            }
        }
        assert!(!s.seeking());
        let expected_center: f64 = (400.0 - 20.0) / 2.0 - 30.0 * 20.0;
        assert!((s.offset_px - expected_center.clamp(-1_600.0, 0.0)).abs() < 1e-9);
    }

    #[test]
    fn seek_is_independent_of_playback() {
        let mut s = scroller();
        // seek while idle still animates
        s.scroll_to_line(10);
        assert!(s.on_tick(0));
        assert!(s.offset_px < 0.0);
    }

    #[test]
    fn upward_seek_during_steady_playback_converges() {
        let mut s = scroller();
        let mut now = run_countdown(&mut s, 0);
        now += RAMP_DURATION_MS + 2_000;
        s.on_tick(now);
        assert_eq!(s.phase(), ScrollPhase::Steady);

        // seek one line back against the direction of playback
        let back = s.active_line().saturating_sub(1);
        s.scroll_to_line(back);
        for _ in 0..200 {
            now += 50;
            s.on_tick(now);
            if !s.seeking() {
                break;
            }
        }
        assert!(!s.seeking());
        assert_eq!(s.phase(), ScrollPhase::Steady);

        // integration picks back up once the seek lands
        let before = s.offset_px;
        now += 1_000;
        s.on_tick(now);
        assert!((before - s.offset_px - 40.0).abs() < 1e-6);
    }

    #[test]
    fn nudge_clamps_and_cancels_seek() {
        let mut s = scroller();
        s.scroll_to_line(10);
        s.nudge(100.0);
        assert!(!s.seeking());
        assert_eq!(s.offset_px, 0.0); // clamped at top
        s.nudge(-10_000.0);
        assert_eq!(s.offset_px, -1_600.0); // clamped at bottom
    }

    #[test]
    fn negative_speed_is_clamped() {
        let mut s = KinematicScroller::new(-3.0, 20.0);
        assert_eq!(s.speed_lines_per_sec, 0.0);
        s.set_speed(-1.0);
        assert_eq!(s.speed_lines_per_sec, 0.0);
    }

    #[test]
    fn active_line_follows_offset() {
        let mut s = scroller();
        assert_eq!(s.active_line(), 10); // viewport center 200px / 20px lines
        s.nudge(-200.0);
        assert_eq!(s.active_line(), 20);
    }
}
