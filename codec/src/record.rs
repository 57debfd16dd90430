use crate::address::AddressParams;
use crate::amount::decompress_amount;
use crate::obfuscation::{ObfuscationKey, OBFUSCATE_KEY_PREFIX};
use crate::pubkey::{CompressedPoint, COMPRESSED_LEN};
use crate::script::{
    classify_script, CompressedScript, ScriptPatternMatcher, ScriptType, StandardMatcher,
    SPECIAL_SCRIPTS,
};
use crate::varint::next_varint;
use crate::{Error, Result};
use bitcoin::Network;

/// Key byte of UTXO records (`'C'`).
pub const UTXO_PREFIX: u8 = 67;

const TXID_LEN: usize = 32;
const HASH_LEN: usize = 20;

/// Outpoint encoded in the key of a UTXO record.
///
/// ```text
/// 430000155b9869d56c66d9e86e3c01de38e3892a42b99949fe109ac034fff6583900
/// <><--------------------------------------------------------------><>
/// /                               |                                  \
/// prefix                  txid (little-endian)                vout (varint)
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UtxoKey {
    /// Big-endian (display order) transaction id.
    pub txid: [u8; TXID_LEN],
    pub vout: u64,
}

impl UtxoKey {
    pub fn decode(key: &[u8]) -> Result<Self> {
        if key.len() <= 1 + TXID_LEN || key[0] != UTXO_PREFIX {
            return Err(Error::MalformedKey { len: key.len() });
        }

        let mut txid = [0u8; TXID_LEN];
        txid.copy_from_slice(&key[1..=TXID_LEN]);
        txid.reverse();

        let mut offset = 1 + TXID_LEN;
        let vout = next_varint(key, &mut offset)?;

        Ok(Self { txid, vout })
    }

    pub fn txid_hex(&self) -> String {
        hex::encode(self.txid)
    }
}

/// A decoded UTXO value.
///
/// ```text
/// c0842680ed5900a38f35518de4487c108e3810e6794fb68b189d8b
/// <----><----><><-------------------------------------->
///  /      |    \                   |
/// varint varint varint          script
///   |      |    nSize
///   |   amount (compressed)
/// height << 1 | coinbase
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UtxoValue {
    pub height: u64,
    pub is_coinbase: bool,
    pub amount: u64,
    pub size_code: u64,
    pub script: CompressedScript,
}

impl UtxoValue {
    /// Decodes an already de-obfuscated value.
    pub fn decode(value: &[u8]) -> Result<Self> {
        let mut offset = 0;

        let height_and_coinbase = next_varint(value, &mut offset)?;
        let compressed_amount = next_varint(value, &mut offset)?;
        let size_code = next_varint(value, &mut offset)?;

        let amount = decompress_amount(compressed_amount)?;
        let rest = &value[offset..];

        let script = match size_code {
            0 => CompressedScript::PubKeyHash(hash_payload(rest)?),
            1 => CompressedScript::ScriptHash(hash_payload(rest)?),
            n if n < SPECIAL_SCRIPTS => {
                // The nSize doubles as the first byte of the compressed key.
                let mut compressed = Vec::with_capacity(COMPRESSED_LEN);
                compressed.push(n as u8);
                compressed.extend_from_slice(rest);
                let point = CompressedPoint::from_slice(&compressed)?;
                if n < 4 {
                    CompressedScript::PubKey(point)
                } else {
                    CompressedScript::PubKeyUncompressed(point)
                }
            }
            n => {
                if rest.len() as u64 != n - SPECIAL_SCRIPTS {
                    tracing::warn!(
                        "Script of nSize {} has {} bytes instead of {}",
                        n,
                        rest.len(),
                        n - SPECIAL_SCRIPTS
                    );
                }
                CompressedScript::Raw(rest.to_vec())
            }
        };

        Ok(Self {
            height: height_and_coinbase >> 1,
            is_coinbase: height_and_coinbase & 1 == 1,
            amount,
            size_code,
            script,
        })
    }
}

fn hash_payload(rest: &[u8]) -> Result<Vec<u8>> {
    if rest.len() != HASH_LEN {
        return Err(Error::InvalidHashLength { len: rest.len() });
    }
    Ok(rest.to_vec())
}

/// A fully decoded, classified UTXO.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UtxoRecord {
    pub txid: String,
    pub vout: u64,
    pub height: u64,
    pub is_coinbase: bool,
    pub amount: u64,
    pub size_code: u64,
    /// Hash for P2PKH/P2SH, public key for P2PK (65 bytes when uncompressed),
    /// the full script otherwise.
    pub script: Vec<u8>,
    pub script_type: ScriptType,
    pub address: Option<String>,
}

impl UtxoRecord {
    pub fn script_hex(&self) -> String {
        hex::encode(&self.script)
    }
}

/// What a single chainstate entry turned out to be.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Entry {
    ObfuscationKey,
    Utxo(UtxoRecord),
    /// Any other record kind, such as the best block hash.
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParserConfig {
    pub network: Network,
    /// Derive P2PKH addresses for the keys of P2PK outputs.
    pub p2pk_addresses: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            network: Network::Bitcoin,
            p2pk_addresses: false,
        }
    }
}

/// Turns raw chainstate entries into [`UtxoRecord`]s.
///
/// Entries must be fed in key order so that the obfuscation key record is
/// seen before any UTXO. After that the parser is only read, so
/// [`ChainstateParser::decode_utxo`] can be called from several threads.
#[derive(Debug)]
pub struct ChainstateParser<M = StandardMatcher> {
    obfuscation_key: ObfuscationKey,
    params: AddressParams,
    p2pk_addresses: bool,
    matcher: M,
}

impl ChainstateParser<StandardMatcher> {
    pub fn new(config: ParserConfig) -> Self {
        Self::with_matcher(config, StandardMatcher)
    }
}

impl<M: ScriptPatternMatcher> ChainstateParser<M> {
    pub fn with_matcher(config: ParserConfig, matcher: M) -> Self {
        Self {
            obfuscation_key: ObfuscationKey::Unset,
            params: AddressParams::for_network(config.network),
            p2pk_addresses: config.p2pk_addresses,
            matcher,
        }
    }

    pub fn obfuscation_key(&self) -> &ObfuscationKey {
        &self.obfuscation_key
    }

    pub fn set_obfuscation_key(&mut self, key: ObfuscationKey) {
        if self.obfuscation_key.is_set() && self.obfuscation_key != key {
            tracing::warn!("Replacing previously observed obfuscation key");
        }
        self.obfuscation_key = key;
    }

    /// Handles one entry in key order.
    pub fn parse_entry(&mut self, key: &[u8], value: &[u8]) -> Result<Entry> {
        match key.first() {
            Some(&OBFUSCATE_KEY_PREFIX) => {
                self.set_obfuscation_key(ObfuscationKey::from_record_value(value));
                Ok(Entry::ObfuscationKey)
            }
            Some(&UTXO_PREFIX) => self.decode_utxo(key, value).map(Entry::Utxo),
            _ => Ok(Entry::Other),
        }
    }

    /// Decodes a UTXO entry with the current obfuscation key.
    pub fn decode_utxo(&self, key: &[u8], value: &[u8]) -> Result<UtxoRecord> {
        let outpoint = UtxoKey::decode(key)?;
        let value = UtxoValue::decode(&self.obfuscation_key.deobfuscate(value)?)?;

        let (script, script_type) = match value.script {
            CompressedScript::PubKeyHash(hash) => (hash, ScriptType::PubKeyHash),
            CompressedScript::ScriptHash(hash) => (hash, ScriptType::ScriptHash),
            CompressedScript::PubKey(point) => (point.to_bytes().to_vec(), ScriptType::PubKey),
            CompressedScript::PubKeyUncompressed(point) => {
                (point.decompress().to_vec(), ScriptType::PubKeyUncompressed)
            }
            CompressedScript::Raw(script) => {
                let script_type = classify_script(&self.matcher, &script);
                (script, script_type)
            }
        };

        let address = match self.address(script_type, &script) {
            Ok(address) => address,
            Err(err) => {
                tracing::warn!(
                    "No address for {}:{} ({}): {}",
                    outpoint.txid_hex(),
                    outpoint.vout,
                    script_type,
                    err
                );
                None
            }
        };

        Ok(UtxoRecord {
            txid: outpoint.txid_hex(),
            vout: outpoint.vout,
            height: value.height,
            is_coinbase: value.is_coinbase,
            amount: value.amount,
            size_code: value.size_code,
            script,
            script_type,
            address,
        })
    }

    fn address(&self, script_type: ScriptType, script: &[u8]) -> Result<Option<String>> {
        let address = match script_type {
            ScriptType::PubKeyHash => Some(self.params.p2pkh(script)),
            ScriptType::ScriptHash => Some(self.params.p2sh(script)),
            ScriptType::PubKey | ScriptType::PubKeyUncompressed if self.p2pk_addresses => {
                Some(self.params.p2pk(script))
            }
            ScriptType::WitnessV0KeyHash
            | ScriptType::WitnessV0ScriptHash
            | ScriptType::WitnessV1Taproot
            | ScriptType::WitnessUnknown => match self.matcher.witness_program(script) {
                Some(witness) => Some(self.params.segwit(witness.version, witness.program)?),
                None => None,
            },
            _ => None,
        };

        Ok(address)
    }
}
