use crate::{MetricError, ensure_same_len};

/// Maximum proximity order used for Kademlia binning.
pub const MAX_PO: u8 = 31;

/// Proximity order window used where a finer closeness rank is needed.
pub const EXTENDED_PO: u8 = MAX_PO + 5;

/// Returns the proximity order of the MSB distance between `one` and `other`.
///
/// The distance metric MSB(x, y) of two equal length byte sequences x and y is the
/// value of the binary integer cast of the x^y, ie., x and y bitwise xor-ed.
/// The binary cast is big endian: most significant bit first (=MSB).
///
/// Proximity(x, y) is a discrete logarithmic scaling of the MSB distance.
/// It is defined as the reverse rank of the integer part of the base 2
/// logarithm of the distance.
/// It is calculated by counting the number of common leading zeros in the (MSB)
/// binary representation of the x^y.
///
/// (0 farthest, [`MAX_PO`] closest or self)
pub fn proximity(one: &[u8], other: &[u8]) -> Result<u8, MetricError> {
    proximity_within(one, other, MAX_PO)
}

/// Same as [`proximity`] over the [`EXTENDED_PO`] window.
pub fn extended_proximity(one: &[u8], other: &[u8]) -> Result<u8, MetricError> {
    proximity_within(one, other, EXTENDED_PO)
}

/// Proximity order scanning at most `max_po / 8 + 1` leading bytes.
///
/// Returns the index of the first differing bit, or `max_po` when no bit
/// differs inside the window. A differing bit in the last scanned byte may
/// sit past `max_po`; its index is returned as is.
pub fn proximity_within(one: &[u8], other: &[u8], max_po: u8) -> Result<u8, MetricError> {
    ensure_same_len(one.len(), other.len())?;
    Ok(po_unchecked(one, other, max_po))
}

#[inline]
pub(crate) fn po_unchecked(one: &[u8], other: &[u8], max_po: u8) -> u8 {
    let window = usize::from(max_po / 8 + 1);
    for (i, (a, b)) in one.iter().zip(other).take(window).enumerate() {
        let oxo = a ^ b;
        if oxo != 0 {
            return (i as u8) * 8 + oxo.leading_zeros() as u8;
        }
    }
    max_po
}
