//! Pagination bar for listing pages
//!
//! Shows the current page with `siblings` neighbours on each side, the first
//! and last page when they fall outside that window, and an ellipsis when
//! there is a gap. With one sibling on page 5 of 10 the bar reads
//! `1 … 4 [5] 6 … 10`.

use askama::Template;

pub const DEFAULT_SIBLINGS: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub number: u32,
    pub href: String,
}

impl PageLink {
    fn new(base_path: &str, number: u32) -> Self {
        Self {
            number,
            href: format!("{}?page={}", base_path, number),
        }
    }
}

#[derive(Debug, Clone, Template)]
#[template(path = "components/pagination.html")]
pub struct Pagination {
    pub total_count: u64,
    pub current_page: u32,
    pub per_page: u32,
    pub last_page: u32,
    pub first: Option<PageLink>,
    pub leading_gap: bool,
    pub previous: Vec<PageLink>,
    pub next: Vec<PageLink>,
    pub trailing_gap: bool,
    pub last: Option<PageLink>,
    pub range_start: u64,
    pub range_end: u64,
}

/// Pages in `(from, to]`, skipping anything below 1.
fn page_range(from: i64, to: i64) -> Vec<u32> {
    ((from + 1)..=to)
        .filter(|page| *page > 0)
        .map(|page| page as u32)
        .collect()
}

impl Pagination {
    pub fn new(
        base_path: &str,
        total_count: u64,
        current_page: u32,
        per_page: u32,
        siblings: u32,
    ) -> Self {
        let per_page = per_page.max(1);
        let last_page = total_count.div_ceil(per_page as u64).max(1) as u32;
        let requested_page = current_page.max(1);
        // Links past the end would point at empty pages
        let current_page = requested_page.min(last_page);

        let current = current_page as i64;
        let last = last_page as i64;
        let siblings_i = siblings as i64;

        let previous = if current > 1 {
            page_range(current - 1 - siblings_i, current - 1)
        } else {
            Vec::new()
        };

        let next = if current < last {
            page_range(current, (current + siblings_i).min(last))
        } else {
            Vec::new()
        };

        let show_first = current > 1 + siblings_i;
        let show_last = current + siblings_i < last;

        let start = (requested_page as u64 - 1) * per_page as u64 + 1;
        let (range_start, range_end) = if start > total_count {
            (0, 0)
        } else {
            (start, (requested_page as u64 * per_page as u64).min(total_count))
        };

        Self {
            total_count,
            current_page,
            per_page,
            last_page,
            first: show_first.then(|| PageLink::new(base_path, 1)),
            leading_gap: current > 2 + siblings_i,
            previous: previous
                .into_iter()
                .map(|n| PageLink::new(base_path, n))
                .collect(),
            next: next.into_iter().map(|n| PageLink::new(base_path, n)).collect(),
            trailing_gap: current + 1 + siblings_i < last,
            last: show_last.then(|| PageLink::new(base_path, last_page)),
            range_start,
            range_end,
        }
    }

    /// Page numbers in display order, `None` marking an ellipsis.
    pub fn items(&self) -> Vec<Option<u32>> {
        let mut items = Vec::new();
        if let Some(first) = &self.first {
            items.push(Some(first.number));
        }
        if self.leading_gap {
            items.push(None);
        }
        items.extend(self.previous.iter().map(|link| Some(link.number)));
        items.push(Some(self.current_page));
        items.extend(self.next.iter().map(|link| Some(link.number)));
        if self.trailing_gap {
            items.push(None);
        }
        if let Some(last) = &self.last {
            items.push(Some(last.number));
        }
        items
    }
}
