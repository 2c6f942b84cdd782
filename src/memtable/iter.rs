use std::ops::Bound;

use bytes::Bytes;

pub fn bounds_as_slices<'a>(
    start: &'a Bound<Bytes>,
    end: &'a Bound<Bytes>,
) -> (Bound<&'a [u8]>, Bound<&'a [u8]>) {
    (as_slice(start), as_slice(end))
}

fn as_slice(bound: &Bound<Bytes>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(k) => Bound::Included(k.as_ref()),
        Bound::Excluded(k) => Bound::Excluded(k.as_ref()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// True when no key can satisfy both bounds.
pub(crate) fn is_empty_range(bounds: &(Bound<&[u8]>, Bound<&[u8]>)) -> bool {
    match bounds {
        (Bound::Included(s), Bound::Included(e)) => s > e,
        (Bound::Included(s), Bound::Excluded(e))
        | (Bound::Excluded(s), Bound::Included(e))
        | (Bound::Excluded(s), Bound::Excluded(e)) => s >= e,
        _ => false,
    }
}
