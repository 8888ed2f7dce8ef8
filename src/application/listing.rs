//! Listing window policy shared by the domain services.

use time::OffsetDateTime;

/// Page size substituted when a caller sends no usable limit.
pub const DEFAULT_PAGE_SIZE: i64 = 20;
/// Largest limit a caller may request before the default is substituted.
pub const MAX_PAGE_SIZE: i64 = 100;

/// A listing request: an optional creation-time threshold plus a row cap.
///
/// Cursoring is by `created_at > from_ts`, never by skip counts: a skip
/// offset shifts under concurrent inserts, a timestamp threshold does not.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ListWindow {
    pub from_ts: Option<OffsetDateTime>,
    pub limit: Option<i64>,
}

impl ListWindow {
    pub fn new(from_ts: Option<OffsetDateTime>, limit: Option<i64>) -> Self {
        Self { from_ts, limit }
    }

    /// The row cap actually applied to the store query. Absent, zero,
    /// negative, and oversized requests all fall back to
    /// [`DEFAULT_PAGE_SIZE`]; [`MAX_PAGE_SIZE`] itself is honored.
    pub fn effective_limit(&self) -> i64 {
        match self.limit {
            Some(limit) if limit > 0 && limit <= MAX_PAGE_SIZE => limit,
            _ => DEFAULT_PAGE_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_limit_uses_default() {
        assert_eq!(ListWindow::default().effective_limit(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn zero_and_negative_limits_use_default() {
        assert_eq!(
            ListWindow::new(None, Some(0)).effective_limit(),
            DEFAULT_PAGE_SIZE
        );
        assert_eq!(
            ListWindow::new(None, Some(-3)).effective_limit(),
            DEFAULT_PAGE_SIZE
        );
    }

    #[test]
    fn in_range_limits_are_honored() {
        assert_eq!(ListWindow::new(None, Some(7)).effective_limit(), 7);
        assert_eq!(
            ListWindow::new(None, Some(MAX_PAGE_SIZE)).effective_limit(),
            MAX_PAGE_SIZE
        );
    }

    #[test]
    fn oversized_limits_fall_back_to_default() {
        assert_eq!(
            ListWindow::new(None, Some(MAX_PAGE_SIZE + 1)).effective_limit(),
            DEFAULT_PAGE_SIZE
        );
        assert_eq!(
            ListWindow::new(None, Some(500)).effective_limit(),
            DEFAULT_PAGE_SIZE
        );
    }
}
