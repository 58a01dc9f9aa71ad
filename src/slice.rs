//! Slice extension methods.

/// Extensions for immutable slices.
pub trait SliceExt<'a, T> {
    /// Returns an iterator that yields non-overlapping chunks of `N` elements as arrays.
    ///
    /// # Panics
    ///
    /// Panics if `N` is 0 or does not evenly divide the slice length.
    fn array_chunks_exact<const N: usize>(self) -> ArrayChunksExact<'a, N, T>;
}

impl<'a, T> SliceExt<'a, T> for &'a [T] {
    fn array_chunks_exact<const N: usize>(self) -> ArrayChunksExact<'a, N, T> {
        assert_ne!(N, 0);
        assert_eq!(self.len() % N, 0);
        ArrayChunksExact { remainder: self }
    }
}

pub struct ArrayChunksExact<'a, const N: usize, T> {
    remainder: &'a [T],
}

impl<'a, const N: usize, T> Iterator for ArrayChunksExact<'a, N, T> {
    type Item = &'a [T; N];

    fn next(&mut self) -> Option<Self::Item> {
        if self.remainder.is_empty() {
            return None;
        }
        let (chunk, rest) = self.remainder.split_at(N);
        self.remainder = rest;
        Some(chunk.try_into().unwrap())
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let chunks = self.remainder.len() / N;
        (chunks, Some(chunks))
    }
}

impl<'a, const N: usize, T> ExactSizeIterator for ArrayChunksExact<'a, N, T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_arrays() {
        let values = [1, 2, 3, 4, 5, 6];
        let chunks: Vec<_> = values[..].array_chunks_exact::<3>().collect();
        assert_eq!(chunks, [&[1, 2, 3], &[4, 5, 6]]);
    }

    #[test]
    fn reports_exact_length() {
        let values = [0.0_f32; 12];
        assert_eq!(values[..].array_chunks_exact::<4>().len(), 3);
    }

    #[test]
    #[should_panic]
    fn rejects_uneven_lengths() {
        [1, 2, 3][..].array_chunks_exact::<2>();
    }
}
