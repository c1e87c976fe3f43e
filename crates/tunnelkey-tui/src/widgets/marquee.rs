//! Horizontally scrolling text for content wider than its viewport.
//!
//! Text that fits is shown as-is. Overflowing text scrolls toward the far
//! end one cell at a time, holds there, then scrolls back, bouncing until
//! the content changes. Replacing the text resets the scroll to the left
//! edge and restarts the cycle.

use std::time::{Duration, Instant};

/// Time per scrolled cell.
const SCROLL_STEP: Duration = Duration::from_millis(80);

/// Pause at each end before reversing.
const END_HOLD: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Right,
    Left,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Holding { until: Instant },
    Scrolling { next_step: Instant },
}

/// Scroll state for a single line of text.
#[derive(Debug)]
pub struct Marquee {
    text: String,
    width: usize,
    offset: usize,
    direction: Direction,
    phase: Phase,
}

impl Marquee {
    pub fn new(width: usize) -> Self {
        Self {
            text: String::new(),
            width,
            offset: 0,
            direction: Direction::Right,
            phase: Phase::Holding {
                until: Instant::now(),
            },
        }
    }

    /// Replace the content. A changed text resets the scroll to the left
    /// edge and restarts the cycle; identical text is left undisturbed.
    pub fn set_text(&mut self, text: &str, now: Instant) {
        if self.text == text {
            return;
        }
        self.text = text.to_owned();
        self.reset(now);
    }

    /// Update the viewport width (e.g. after a terminal resize).
    pub fn set_width(&mut self, width: usize, now: Instant) {
        if self.width == width {
            return;
        }
        self.width = width;
        self.reset(now);
    }

    fn reset(&mut self, now: Instant) {
        self.offset = 0;
        self.direction = Direction::Right;
        self.phase = Phase::Holding {
            until: now + END_HOLD,
        };
    }

    /// Cells hidden beyond the viewport. Zero when the text fits.
    fn overflow(&self) -> usize {
        self.text.chars().count().saturating_sub(self.width)
    }

    /// Advance the scroll position to `now`.
    pub fn advance(&mut self, now: Instant) {
        let overflow = self.overflow();
        if overflow == 0 {
            self.offset = 0;
            return;
        }
        self.offset = self.offset.min(overflow);

        loop {
            match self.phase {
                Phase::Holding { until } => {
                    if now < until {
                        return;
                    }
                    self.phase = Phase::Scrolling { next_step: until };
                }
                Phase::Scrolling { next_step } => {
                    if now < next_step {
                        return;
                    }
                    match self.direction {
                        Direction::Right => self.offset += 1,
                        Direction::Left => self.offset -= 1,
                    }

                    let at_end = match self.direction {
                        Direction::Right => self.offset >= overflow,
                        Direction::Left => self.offset == 0,
                    };
                    if at_end {
                        self.direction = match self.direction {
                            Direction::Right => Direction::Left,
                            Direction::Left => Direction::Right,
                        };
                        self.phase = Phase::Holding {
                            until: next_step + END_HOLD,
                        };
                    } else {
                        self.phase = Phase::Scrolling {
                            next_step: next_step + SCROLL_STEP,
                        };
                    }
                }
            }
        }
    }

    /// The currently visible window of the text.
    pub fn visible(&self) -> String {
        self.text
            .chars()
            .skip(self.offset)
            .take(self.width)
            .collect()
    }

    #[allow(dead_code)]
    pub fn text(&self) -> &str {
        &self.text
    }
}
