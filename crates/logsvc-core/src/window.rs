//! Windowed retrieval.
//!
//! One logical query over `[start, end]` is split into consecutive windows of
//! at most `window_seconds`, fetched one after another until the range is
//! exhausted or `limit` lines have been collected.
//!
//! ```text
//! backward:  [start ........ | w3 | w2 | w1 ] end     cursor walks end → start
//! forward:   start [ w1 | w2 | w3 | ........] end     cursor walks start → end
//! ```
//!
//! Adjacent windows share their boundary instant; lines stamped exactly on a
//! boundary may be returned twice.

use chrono::{DateTime, Duration, Utc};
use logsvc_common::{Direction, LogLine, Result};
use tracing::trace;

/// A closed sub-range of the outer query range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Fetches the lines of one window from a log backend.
pub trait LogFetcher {
    /// Return at most `limit` lines matching `query` inside `window`.
    fn fetch(
        &self,
        query: &str,
        window: TimeWindow,
        limit: usize,
        direction: Direction,
    ) -> Result<Vec<LogLine>>;
}

impl<F: LogFetcher + ?Sized> LogFetcher for Box<F> {
    fn fetch(
        &self,
        query: &str,
        window: TimeWindow,
        limit: usize,
        direction: Direction,
    ) -> Result<Vec<LogLine>> {
        (**self).fetch(query, window, limit, direction)
    }
}

/// Iterator over the windows covering `[start, end]` in walk order.
///
/// The cursor always advances by one window, so the iterator terminates for
/// any positive window size.
#[derive(Debug, Clone)]
pub struct Windows {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
    direction: Direction,
    cursor: DateTime<Utc>,
}

impl Windows {
    /// Windows of `window_seconds` (at least one second) over `[start, end]`.
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        window_seconds: u64,
        direction: Direction,
    ) -> Self {
        let secs = i64::try_from(window_seconds.max(1)).unwrap_or(i64::MAX);
        let step = Duration::try_seconds(secs).unwrap_or(Duration::MAX);
        let cursor = match direction {
            Direction::Backward => end,
            Direction::Forward => start,
        };
        Self {
            start,
            end,
            step,
            direction,
            cursor,
        }
    }
}

impl Iterator for Windows {
    type Item = TimeWindow;

    fn next(&mut self) -> Option<TimeWindow> {
        match self.direction {
            Direction::Backward => {
                if self.cursor <= self.start {
                    return None;
                }
                let window_start = self
                    .cursor
                    .checked_sub_signed(self.step)
                    .map_or(self.start, |t| t.max(self.start));
                let window = TimeWindow::new(window_start, self.cursor);
                self.cursor = window_start;
                Some(window)
            }
            Direction::Forward => {
                if self.cursor >= self.end {
                    return None;
                }
                let window_end = self
                    .cursor
                    .checked_add_signed(self.step)
                    .map_or(self.end, |t| t.min(self.end));
                let window = TimeWindow::new(self.cursor, window_end);
                self.cursor = window_end;
                Some(window)
            }
        }
    }
}

/// Run `query` over `[start, end]` window by window.
///
/// Each window asks for the lines still missing (`limit - collected`). The
/// walk stops once `limit` lines are collected or the range is exhausted,
/// and the result holds at most `limit` lines in fetch order. The first
/// failing window fails the whole call; nothing collected so far is returned.
pub fn query_with_slicing<F: LogFetcher + ?Sized>(
    fetcher: &F,
    query: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    limit: usize,
    window_seconds: u64,
    direction: Direction,
) -> Result<Vec<LogLine>> {
    let mut results: Vec<LogLine> = Vec::new();
    if limit == 0 {
        return Ok(results);
    }

    for window in Windows::new(start, end, window_seconds, direction) {
        let remaining = limit - results.len();
        let batch = fetcher.fetch(query, window, remaining, direction)?;
        trace!(
            window_start = %window.start.to_rfc3339(),
            window_end = %window.end.to_rfc3339(),
            fetched = batch.len(),
            "window fetched"
        );
        results.extend(batch);
        if results.len() >= limit {
            break;
        }
    }

    results.truncate(limit);
    Ok(results)
}
