//! Fixed-size batching of the work list.

use std::num::NonZeroUsize;

/// Lazy iterator over consecutive chunks of at most `size` items.
///
/// Every chunk has exactly `size` items except possibly the last one.
/// Empty input yields no chunks.
pub struct Chunks<T> {
    items: std::vec::IntoIter<T>,
    size: usize,
}

impl<T> Iterator for Chunks<T> {
    type Item = Vec<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk: Vec<T> = self.items.by_ref().take(self.size).collect();
        if chunk.is_empty() { None } else { Some(chunk) }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.items.len().div_ceil(self.size);
        (n, Some(n))
    }
}

impl<T> ExactSizeIterator for Chunks<T> {}

/// Split `items` into chunks of `size`, preserving order.
pub fn chunked<T>(items: Vec<T>, size: NonZeroUsize) -> Chunks<T> {
    Chunks {
        items: items.into_iter(),
        size: size.get(),
    }
}
