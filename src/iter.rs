//! Iterator adapters and utilities.

use std::iter::Zip;

/// Zips two exact-size iterators, panicking if their lengths differ.
///
/// [`Iterator::zip`] silently stops at the end of the shorter iterator, which turns a length
/// mismatch into missing data. Merging of per-anchor model output rows goes through this
/// function instead so that a mismatch is caught where it happens.
#[track_caller]
pub fn zip_exact<A, B>(a: A, b: B) -> Zip<A::IntoIter, B::IntoIter>
where
    A: IntoIterator,
    B: IntoIterator,
    A::IntoIter: ExactSizeIterator,
    B::IntoIter: ExactSizeIterator,
{
    let a = a.into_iter();
    let b = b.into_iter();
    assert_eq!(
        a.len(),
        b.len(),
        "`zip_exact` called on iterators of different lengths"
    );
    a.zip(b)
}
