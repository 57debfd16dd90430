use crate::{Error, Result};

/// Decompresses an amount stored with Bitcoin Core's amount compression.
///
/// Ref: <https://github.com/bitcoin/bitcoin/blob/0903ce8dbc25d3823b03d52f6e6bff74d19e801e/src/compressor.cpp#L168>
pub fn decompress_amount(compressed: u64) -> Result<u64> {
    if compressed == 0 {
        return Ok(0);
    }

    let mut x = compressed - 1;

    // The lowest decimal digit holds the exponent.
    let e = (x % 10) as u32;
    x /= 10;

    let n = if e < 9 {
        let d = x % 9 + 1;
        x /= 9;
        x * 10 + d
    } else {
        x + 1
    };

    10u64
        .checked_pow(e)
        .and_then(|scale| n.checked_mul(scale))
        .ok_or(Error::AmountOverflow { compressed })
}
