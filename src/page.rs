/// Discrete page navigation over the scroll container.
///
/// Pages deliberately overlap: the tail of the previous page is re-shown at
/// the top of the next one so readers don't lose their place across a flip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paginator {
    pub current_page: usize,
    pub overlap: f64,
    transition_ends_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDirection {
    Forward,
    Backward,
}

pub const DEFAULT_OVERLAP: f64 = 0.10;
const TRANSITION_MS: u64 = 350;

impl Paginator {
    pub fn new(overlap: f64) -> Self {
        Self {
            current_page: 0,
            overlap: overlap.clamp(0.0, 0.9),
            transition_ends_ms: None,
        }
    }

    /// Effective page height once overlap is taken off the viewport.
    pub fn page_height(&self, viewport_height: f64) -> f64 {
        (viewport_height.max(1.0)) * (1.0 - self.overlap)
    }

    /// Total pages needed to cover the content, minimum 1.
    pub fn total_pages(&self, content_height: f64, viewport_height: f64) -> usize {
        let page_h = self.page_height(viewport_height);
        ((content_height.max(0.0) / page_h).ceil() as usize).max(1)
    }

    /// Pixel offset of the current page's top edge.
    pub fn page_offset(&self, viewport_height: f64) -> f64 {
        self.current_page as f64 * self.page_height(viewport_height)
    }

    /// Step one page; clamps at both ends rather than wrapping. Returns true
    /// if the page actually changed.
    pub fn advance(
        &mut self,
        direction: PageDirection,
        content_height: f64,
        viewport_height: f64,
        now_ms: u64,
    ) -> bool {
        let total = self.total_pages(content_height, viewport_height);
        let next = match direction {
            PageDirection::Forward => (self.current_page + 1).min(total - 1),
            PageDirection::Backward => self.current_page.saturating_sub(1),
        };
        if next == self.current_page {
            return false;
        }
        self.current_page = next;
        self.transition_ends_ms = Some(now_ms + TRANSITION_MS);
        true
    }

    /// Eased transition progress in [0, 1]; 1 when no transition is active.
    /// Active-line bookkeeping resumes once this reports 1.
    pub fn transition_progress(&mut self, now_ms: u64) -> f64 {
        match self.transition_ends_ms {
            None => 1.0,
            Some(ends) if now_ms >= ends => {
                self.transition_ends_ms = None;
                1.0
            }
            Some(ends) => {
                let remaining = (ends - now_ms) as f64 / TRANSITION_MS as f64;
                let t = 1.0 - remaining;
                // ease-out quadratic
                1.0 - (1.0 - t) * (1.0 - t)
            }
        }
    }

    /// Re-clamp after a content or viewport change; the page the reader was
    /// on can stop existing when the viewport grows or the script shrinks.
    pub fn clamp_to(&mut self, content_height: f64, viewport_height: f64) {
        let last = self.total_pages(content_height, viewport_height) - 1;
        if self.current_page > last {
            self.current_page = last;
            self.transition_ends_ms = None;
        }
    }

    pub fn in_transition(&self) -> bool {
        self.transition_ends_ms.is_some()
    }

    pub fn reset(&mut self) {
        self.current_page = 0;
        self.transition_ends_ms = None;
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(DEFAULT_OVERLAP)
    }
}
