use crate::{Error, Result};

/// Key byte of the record holding the obfuscation key (`0x0e`).
pub const OBFUSCATE_KEY_PREFIX: u8 = 14;

/// Per-database XOR key used to obfuscate chainstate values.
///
/// The key is written once by the node and stored under the
/// `\x0e\x00obfuscate_key` record, which sorts before every UTXO record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ObfuscationKey {
    /// The obfuscation key record has not been observed yet.
    #[default]
    Unset,
    Set(Vec<u8>),
}

impl ObfuscationKey {
    /// Builds the key from the value of the obfuscation key record.
    ///
    /// The first byte of the value is the key length and is not part of the key.
    pub fn from_record_value(value: &[u8]) -> Self {
        match value.split_first() {
            Some((_, key)) => Self::Set(key.to_vec()),
            None => Self::Set(Vec::new()),
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    pub fn as_bytes(&self) -> Result<&[u8]> {
        match self {
            Self::Set(key) if !key.is_empty() => Ok(key),
            _ => Err(Error::EmptyObfuscationKey),
        }
    }

    /// Expands the key into a keystream of at least `len` bytes.
    ///
    /// ```text
    /// key:      08 b1 2d ce
    /// extended: 08 b1 2d ce 08 b1 2d ce 08 b1
    /// ```
    pub fn keystream(&self, len: usize) -> Result<Vec<u8>> {
        let key = self.as_bytes()?;

        let mut extended = key.to_vec();
        let mut k = 0;
        while extended.len() < len {
            extended.push(extended[k]);
            k += 1;
        }

        Ok(extended)
    }

    /// XORs `value` with the keystream, returning the de-obfuscated bytes.
    pub fn deobfuscate(&self, value: &[u8]) -> Result<Vec<u8>> {
        let keystream = self.keystream(value.len())?;

        Ok(value
            .iter()
            .zip(keystream.iter())
            .map(|(v, k)| v ^ k)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use hex_lit::hex;
    use proptest::prelude::*;

    #[test]
    fn test_strips_length_byte() {
        let key = ObfuscationKey::from_record_value(&[0x01, 0xFF]);
        assert_eq!(key, ObfuscationKey::Set(vec![0xFF]));

        let key = ObfuscationKey::from_record_value(&hex!("08b12dcefd8f872536"));
        assert_eq!(key.as_bytes().unwrap(), &hex!("b12dcefd8f872536"));
    }

    #[test]
    fn test_single_byte_key() {
        let key = ObfuscationKey::Set(vec![0xFF]);
        assert_eq!(key.keystream(4).unwrap(), vec![0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_key_longer_than_value() {
        let key = ObfuscationKey::Set(vec![1, 2, 3, 4]);
        assert_eq!(key.keystream(2).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(key.deobfuscate(&[1, 2]).unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_deobfuscate_known_value() {
        let key = ObfuscationKey::from_record_value(&hex!("08b12dcefd8f872536"));
        let obfuscated = hex!("71a9e87d62de25953e189f706bcf59263f15de1bf6c893bda9b045");
        assert_eq!(
            key.deobfuscate(&obfuscated).unwrap(),
            hex!("c0842680ed5900a38f35518de4487c108e3810e6794fb68b189d8b")
        );
    }

    #[test]
    fn test_unset_key_is_rejected() {
        assert_matches!(
            ObfuscationKey::Unset.deobfuscate(&[1, 2, 3]),
            Err(Error::EmptyObfuscationKey)
        );
        assert_matches!(
            ObfuscationKey::from_record_value(&[0x00]).keystream(1),
            Err(Error::EmptyObfuscationKey)
        );
    }

    proptest! {
        #[test]
        fn keystream_is_cyclic(key in prop::collection::vec(any::<u8>(), 1..16), len in 0usize..256) {
            let keystream = ObfuscationKey::Set(key.clone()).keystream(len).unwrap();
            prop_assert!(keystream.len() >= len);
            for (i, byte) in keystream.iter().enumerate() {
                prop_assert_eq!(*byte, key[i % key.len()]);
            }
        }

        #[test]
        fn deobfuscate_is_an_involution(key in prop::collection::vec(any::<u8>(), 1..16), value in prop::collection::vec(any::<u8>(), 0..128)) {
            let key = ObfuscationKey::Set(key);
            let masked = key.deobfuscate(&value).unwrap();
            prop_assert_eq!(key.deobfuscate(&masked).unwrap(), value);
        }
    }
}
