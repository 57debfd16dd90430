use crate::{Error, Result};
use bitcoin::base58;
use bitcoin::bech32::{hrp, segwit, Fe32, Hrp};
use bitcoin::hashes::{hash160, sha256d, Hash};
use bitcoin::Network;

const CHECKSUM_LEN: usize = 4;

/// Address prefixes of a network.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressParams {
    pub pubkey_hash_prefix: u8,
    pub script_hash_prefix: u8,
    pub hrp: Hrp,
}

impl AddressParams {
    pub const MAINNET: Self = Self {
        pubkey_hash_prefix: 0x00,
        script_hash_prefix: 0x05,
        hrp: hrp::BC,
    };

    pub const TESTNET: Self = Self {
        pubkey_hash_prefix: 0x6f,
        script_hash_prefix: 0xc4,
        hrp: hrp::TB,
    };

    pub const REGTEST: Self = Self {
        pubkey_hash_prefix: 0x6f,
        script_hash_prefix: 0xc4,
        hrp: hrp::BCRT,
    };

    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Bitcoin => Self::MAINNET,
            Network::Regtest => Self::REGTEST,
            _ => Self::TESTNET,
        }
    }

    pub fn p2pkh(&self, pubkey_hash: &[u8]) -> String {
        base58check(self.pubkey_hash_prefix, pubkey_hash)
    }

    pub fn p2sh(&self, script_hash: &[u8]) -> String {
        base58check(self.script_hash_prefix, script_hash)
    }

    /// P2PKH address of a public key, used for P2PK outputs.
    pub fn p2pk(&self, public_key: &[u8]) -> String {
        self.p2pkh(&hash160(public_key))
    }

    pub fn segwit(&self, version: u8, program: &[u8]) -> Result<String> {
        segwit_address(self.hrp, version, program)
    }
}

impl Default for AddressParams {
    fn default() -> Self {
        Self::MAINNET
    }
}

/// `RIPEMD160(SHA256(data))`.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    hash160::Hash::hash(data).to_byte_array()
}

/// Base58Check encoding of `prefix || payload`.
///
/// ```text
/// [00] [cb c2 98 6f ... 80] [38 84 dd b3]
/// prefix      hash160         checksum
/// ```
pub fn base58check(prefix: u8, payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(1 + payload.len() + CHECKSUM_LEN);
    data.push(prefix);
    data.extend_from_slice(payload);

    let checksum = sha256d::Hash::hash(&data);
    data.extend_from_slice(&checksum.as_byte_array()[..CHECKSUM_LEN]);

    base58::encode(&data)
}

/// Encodes a witness program. Version 0 uses Bech32, later versions Bech32m.
pub fn segwit_address(hrp: Hrp, version: u8, program: &[u8]) -> Result<String> {
    let encoded = match version {
        0 => segwit::encode_v0(hrp, program),
        1 => segwit::encode_v1(hrp, program),
        _ => {
            let version = Fe32::try_from(version)
                .map_err(|e| Error::Encoding(format!("witness version {}: {}", version, e)))?;
            segwit::encode(hrp, version, program)
        }
    };

    encoded.map_err(|e| Error::Encoding(e.to_string()))
}
