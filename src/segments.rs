//! Time Segments
//!
//! Ownership windows of student products are reduced to [`TimestampSegment`]s
//! so the sibling discount can be granted only while a student and one of
//! their siblings both hold an eligible product.
//!
//! Bounds are inclusive calendar days. Two windows "touch" when the second
//! starts on the day after the first ends.

use jiff::civil::Date;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when building segments.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SegmentError {
    /// The start date is after the end date.
    #[error("segment starts on {start} after it ends on {end}")]
    Inverted {
        /// Requested start.
        start: Date,

        /// Requested end.
        end: Date,
    },
}

/// A `{start, end}` window with inclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimestampSegment {
    start: Date,
    end: Date,
}

impl TimestampSegment {
    /// Create a segment.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError::Inverted`] when `start` is after `end`.
    pub fn new(start: Date, end: Date) -> Result<Self, SegmentError> {
        if start > end {
            return Err(SegmentError::Inverted { start, end });
        }

        Ok(Self { start, end })
    }

    /// First day of the segment.
    #[must_use]
    pub const fn start(&self) -> Date {
        self.start
    }

    /// Last day of the segment.
    #[must_use]
    pub const fn end(&self) -> Date {
        self.end
    }

    /// Whether `day` falls inside the segment.
    #[must_use]
    pub fn contains(&self, day: Date) -> bool {
        self.start <= day && day <= self.end
    }

    /// Whether `next` starts inside this segment or on the day right after it.
    fn touches(&self, next: &Self) -> bool {
        next.start <= self.end.tomorrow().unwrap_or(Date::MAX)
    }
}

/// Merge chronologically ordered windows into the minimal run of segments.
///
/// A window extends the running segment only when it touches it and does not
/// end before it. Any other window closes the running segment and starts a
/// new one, including a window nested inside the running segment.
pub fn coalesce<I>(windows: I) -> Vec<TimestampSegment>
where
    I: IntoIterator<Item = TimestampSegment>,
{
    let mut windows = windows.into_iter();

    let Some(mut running) = windows.next() else {
        return Vec::new();
    };

    let mut segments = Vec::new();

    for window in windows {
        if running.touches(&window) && window.end >= running.end {
            running.end = window.end;
        } else {
            segments.push(running);
            running = window;
        }
    }

    segments.push(running);

    segments
}

/// Windows in which both the student and the sibling held a segment.
///
/// Each student segment is scanned against every sibling segment. A sibling
/// segment that ends first truncates the student segment and is emitted right
/// away; scanning then continues against the tail of the student segment. A
/// sibling segment that covers the rest of the student segment is emitted
/// once the scan is over.
pub fn overlap(student: &[TimestampSegment], sibling: &[TimestampSegment]) -> Vec<TimestampSegment> {
    let mut overlaps = Vec::new();

    if student.is_empty() || sibling.is_empty() {
        return overlaps;
    }

    for segment in student {
        let mut tail: Option<TimestampSegment> = None;

        for other in sibling {
            if other.end < segment.start || other.start > segment.end {
                continue;
            }

            let start = segment.start.max(other.start);

            if other.end < segment.end {
                overlaps.push(TimestampSegment {
                    start,
                    end: other.end,
                });

                continue;
            }

            tail = Some(match tail {
                Some(existing) => TimestampSegment {
                    start: existing.start.min(start),
                    end: segment.end,
                },
                None => TimestampSegment {
                    start,
                    end: segment.end,
                },
            });
        }

        overlaps.extend(tail);
    }

    overlaps
}
