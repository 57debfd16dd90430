//! Reconstruction of uncompressed secp256k1 public keys.
//!
//! The chainstate stores uncompressed P2PK keys in compressed form (nSize 4 or
//! 5 followed by the x-coordinate). Recovering the y-coordinate only needs a
//! modular square root on `y² = x³ + 7 (mod p)`.

use crate::{Error, Result};
use num_bigint::BigUint;
use num_traits::One;

/// Field prime of secp256k1, `2^256 - 2^32 - 977`.
const FIELD_PRIME: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE, 0xFF, 0xFF, 0xFC, 0x2F,
];

const CURVE_B: u32 = 7;

pub const COMPRESSED_LEN: usize = 33;
pub const UNCOMPRESSED_LEN: usize = 65;

/// A compressed curve point: a parity marker followed by the x-coordinate.
///
/// In the chainstate the marker is the nSize itself (2..=5), so the point is
/// assembled from the discriminant and the 32 bytes that follow it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompressedPoint {
    marker: u8,
    x: [u8; 32],
}

impl CompressedPoint {
    pub fn new(marker: u8, x: [u8; 32]) -> Self {
        Self { marker, x }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let (marker, x) = bytes
            .split_first()
            .filter(|_| bytes.len() == COMPRESSED_LEN)
            .ok_or(Error::InvalidPublicKeyLength { len: bytes.len() })?;

        let mut coordinate = [0u8; 32];
        coordinate.copy_from_slice(x);
        Ok(Self::new(*marker, coordinate))
    }

    pub fn marker(&self) -> u8 {
        self.marker
    }

    /// Whether the y-coordinate is odd. Markers 2 and 4 mean even, 3 and 5 odd.
    pub fn is_odd(&self) -> bool {
        self.marker & 1 == 1
    }

    pub fn to_bytes(&self) -> [u8; COMPRESSED_LEN] {
        let mut out = [0u8; COMPRESSED_LEN];
        out[0] = self.marker;
        out[1..].copy_from_slice(&self.x);
        out
    }

    /// Returns `0x04 || x || y`.
    ///
    /// The result is not checked against the curve equation: an x-coordinate
    /// without a square root still produces 65 bytes.
    pub fn decompress(&self) -> [u8; UNCOMPRESSED_LEN] {
        let p = BigUint::from_bytes_be(&FIELD_PRIME);
        let x = BigUint::from_bytes_be(&self.x);

        let y_squared = (x.modpow(&BigUint::from(3u32), &p) + BigUint::from(CURVE_B)) % &p;

        // p = 3 (mod 4), so a square root is y²^((p + 1) / 4).
        let exponent = (&p + BigUint::one()) >> 2;
        let mut y = y_squared.modpow(&exponent, &p);

        if y.bit(0) != self.is_odd() {
            y = &p - y;
        }

        let mut out = [0u8; UNCOMPRESSED_LEN];
        out[0] = 0x04;
        out[1..33].copy_from_slice(&self.x);

        let y_bytes = y.to_bytes_be();
        out[UNCOMPRESSED_LEN - y_bytes.len()..].copy_from_slice(&y_bytes);
        out
    }
}

/// Decompresses a 33 byte `marker || x` payload into its 65 byte form.
pub fn decompress_public_key(compressed: &[u8]) -> Result<[u8; UNCOMPRESSED_LEN]> {
    Ok(CompressedPoint::from_slice(compressed)?.decompress())
}
