//! Keyset pagination over ordered query results

use std::collections::VecDeque;

use crate::error::StorageError;

/// Iterator that pulls an ordered result set one page at a time
///
/// `fetch` receives the key of the last row already yielded (`None` for the
/// first page) and the page size, and must return rows with strictly greater
/// keys in ascending order. At most one page is buffered.
pub(crate) struct KeysetPages<T, F> {
    fetch: F,
    key: fn(&T) -> i64,
    after: Option<i64>,
    page_size: usize,
    buffer: VecDeque<T>,
    exhausted: bool,
}

impl<T, F> KeysetPages<T, F>
where
    F: FnMut(Option<i64>, usize) -> Result<Vec<T>, StorageError>,
{
    pub(crate) fn new(page_size: usize, key: fn(&T) -> i64, fetch: F) -> Self {
        Self {
            fetch,
            key,
            after: None,
            page_size: page_size.max(1),
            buffer: VecDeque::new(),
            exhausted: false,
        }
    }
}

impl<T, F> Iterator for KeysetPages<T, F>
where
    F: FnMut(Option<i64>, usize) -> Result<Vec<T>, StorageError>,
{
    type Item = Result<T, StorageError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() {
            if self.exhausted {
                return None;
            }
            match (self.fetch)(self.after, self.page_size) {
                Ok(page) => {
                    if page.len() < self.page_size {
                        self.exhausted = true;
                    }
                    if let Some(last) = page.last() {
                        self.after = Some((self.key)(last));
                    }
                    self.buffer.extend(page);
                }
                Err(e) => {
                    // A failed page ends the stream; the caller sees the error once.
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
