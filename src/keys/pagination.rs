use crate::{Error, Result};

/// Returns the half-open offset range `[start, end)` of a 1-based page.
///
/// Fails with [`Error::PageNotFound`] when the page starts past `total`. A page
/// starting exactly at `total` is valid and empty.
pub fn page_range(total: usize, page_size: usize, page: usize) -> Result<(usize, usize)> {
    let start = page.saturating_sub(1).saturating_mul(page_size);
    if start > total {
        return Err(Error::PageNotFound);
    }
    let end = page.saturating_mul(page_size).min(total);
    Ok((start, end))
}

/// Number of pages needed to hold `total` elements.
pub fn pages_count(total: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    total.div_ceil(page_size)
}

/// Slices out the requested page of `items`.
pub fn page_of<T>(mut items: Vec<T>, page_size: usize, page: usize) -> Result<Vec<T>> {
    let (start, end) = page_range(items.len(), page_size, page)?;
    items.truncate(end);
    Ok(items.split_off(start))
}
