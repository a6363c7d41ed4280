//! Page/limit handling shared by every listing endpoint. Pages are 1-based
//! and page N skips N-1 full pages, so consecutive pages never overlap and
//! never leave a gap for a fixed data set.

pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u64,
    pub limit: i64,
}

impl Page {
    /// Clamp raw query values: page floors at 1, limit lands in
    /// `1..=MAX_LIMIT` with `default_limit` filling in when absent.
    pub fn clamp(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> Self {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(default_limit).clamp(1, MAX_LIMIT);
        Self {
            page: u64::from(page),
            limit: i64::from(limit),
        }
    }

    /// Documents to skip: everything on the preceding pages.
    pub fn skip(&self) -> u64 {
        (self.page - 1) * self.limit as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_is_given() {
        let page = Page::clamp(None, None, 20);
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, 20);
        assert_eq!(page.skip(), 0);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let page = Page::clamp(Some(0), Some(0), 20);
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, 1);

        let page = Page::clamp(Some(2), Some(5000), 20);
        assert_eq!(page.limit, i64::from(MAX_LIMIT));
    }

    #[test]
    fn skip_covers_exactly_the_preceding_pages() {
        assert_eq!(Page::clamp(Some(1), Some(30), 30).skip(), 0);
        assert_eq!(Page::clamp(Some(2), Some(30), 30).skip(), 30);
        assert_eq!(Page::clamp(Some(5), Some(10), 30).skip(), 40);
    }
}
