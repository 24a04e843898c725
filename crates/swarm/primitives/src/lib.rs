//! Overlay addressing primitives for Ethereum Swarm nodes.
//!
//! Every node and every chunk lives in one shared address space. Routing and
//! neighbourhood structure are derived entirely from the XOR metric defined
//! here:
//!
//! - [`distance`] / [`distance_raw`] - XOR distance as an integer or as bytes
//! - [`distance_cmp`] - which of two addresses is closer to a reference point
//! - [`proximity`] / [`extended_proximity`] - saturating count of shared
//!   leading bits (the Kademlia bin index)
//!
//! The free functions accept arbitrary byte slices and reject inputs of
//! different lengths with [`MetricError::LengthMismatch`]. For the fixed-size
//! [`OverlayAddress`] the [`AddressMetric`] extension trait offers the same
//! metric without the error path.

use std::cmp::Ordering;

use alloy_primitives::B256;
use num_bigint::BigUint;

mod distance;
mod proximity;

pub use distance::{distance, distance_cmp, distance_raw};
pub use proximity::{EXTENDED_PO, MAX_PO, extended_proximity, proximity, proximity_within};

/// Size in bytes of an overlay address.
pub const ADDRESS_SIZE: usize = 32;

/// Swarm overlay address (32 bytes).
///
/// Identifies a node or a chunk in the XOR metric space. Rendered as lowercase
/// hex at the boundary with storage and presentation layers.
pub type OverlayAddress = B256;

/// Errors produced by the overlay metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MetricError {
    /// Two compared addresses have different lengths.
    #[error("address length must match: {left} != {right}")]
    LengthMismatch { left: usize, right: usize },
}

/// The overlay metric on fixed-size addresses.
///
/// Both operands always have [`ADDRESS_SIZE`] bytes, so none of these methods
/// can fail.
pub trait AddressMetric {
    /// XOR distance between `self` and `other`.
    fn distance(&self, other: &Self) -> BigUint;

    /// Compares `x` and `y` by their distance to `self`.
    ///
    /// `Greater` means `x` is closer, `Less` means `y` is closer and `Equal`
    /// means `x == y`.
    fn distance_cmp(&self, x: &Self, y: &Self) -> Ordering;

    /// Proximity order of `self` and `other`, saturating at [`MAX_PO`].
    fn proximity(&self, other: &Self) -> u8;

    /// Proximity order over the wider [`EXTENDED_PO`] window.
    fn extended_proximity(&self, other: &Self) -> u8;

    /// Returns true if `x` is strictly closer to `self` than `y` is.
    fn is_closer(&self, x: &Self, y: &Self) -> bool {
        self.distance_cmp(x, y) == Ordering::Greater
    }
}

impl AddressMetric for OverlayAddress {
    fn distance(&self, other: &Self) -> BigUint {
        let raw: Vec<u8> = self.iter().zip(other.iter()).map(|(a, b)| a ^ b).collect();
        BigUint::from_bytes_be(&raw)
    }

    fn distance_cmp(&self, x: &Self, y: &Self) -> Ordering {
        distance::cmp_unchecked(self.as_slice(), x.as_slice(), y.as_slice())
    }

    fn proximity(&self, other: &Self) -> u8 {
        proximity::po_unchecked(self.as_slice(), other.as_slice(), MAX_PO)
    }

    fn extended_proximity(&self, other: &Self) -> u8 {
        proximity::po_unchecked(self.as_slice(), other.as_slice(), EXTENDED_PO)
    }
}

#[inline]
fn ensure_same_len(left: usize, right: usize) -> Result<(), MetricError> {
    if left != right {
        return Err(MetricError::LengthMismatch { left, right });
    }
    Ok(())
}
