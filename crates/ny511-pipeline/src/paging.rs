//! Page layout for raw event fetches.

use ny511_config::{PagingMode, PagingSettings};

/// Rows per page in the reference layout.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;
/// Pages requested in the reference layout.
pub const DEFAULT_PAGE_COUNT: u32 = 5;

/// How the rows of one date range are split into requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStrategy {
    /// Exactly `page_count` pages, requested whether or not earlier pages came
    /// back short. Rows beyond `page_size * page_count` are never fetched.
    Fixed {
        page_size: u32,
        page_count: u32,
        concurrent: bool,
    },
    /// Sequential pages until one comes back short, at most `max_pages`.
    Cursor { page_size: u32, max_pages: u32 },
}

impl Default for PageStrategy {
    fn default() -> Self {
        Self::Fixed {
            page_size: DEFAULT_PAGE_SIZE,
            page_count: DEFAULT_PAGE_COUNT,
            concurrent: true,
        }
    }
}

impl PageStrategy {
    pub fn fixed(page_size: u32, page_count: u32) -> Self {
        Self::Fixed {
            page_size,
            page_count,
            concurrent: true,
        }
    }

    pub fn cursor(page_size: u32, max_pages: u32) -> Self {
        Self::Cursor {
            page_size,
            max_pages,
        }
    }

    pub fn from_settings(settings: &PagingSettings) -> Self {
        match settings.mode {
            PagingMode::Fixed => Self::Fixed {
                page_size: settings.page_size,
                page_count: settings.page_count,
                concurrent: settings.concurrent,
            },
            PagingMode::Cursor => Self::Cursor {
                page_size: settings.page_size,
                max_pages: settings.cursor_page_limit,
            },
        }
    }

    pub fn page_size(&self) -> u32 {
        match *self {
            Self::Fixed { page_size, .. } | Self::Cursor { page_size, .. } => page_size,
        }
    }

    /// Most pages this strategy will request.
    pub fn max_pages(&self) -> u32 {
        match *self {
            Self::Fixed { page_count, .. } => page_count,
            Self::Cursor { max_pages, .. } => max_pages,
        }
    }

    /// Most rows one fetch can return.
    pub fn row_cap(&self) -> u64 {
        u64::from(self.page_size()) * u64::from(self.max_pages())
    }

    /// `$offset` of page `index`.
    pub fn offset(&self, index: u32) -> u32 {
        index.saturating_mul(self.page_size())
    }
}
