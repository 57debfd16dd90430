pub mod scripts;

pub const MAX_MONEY: u64 = 21_000_000 * 100_000_000;

const OBFUSCATE_KEY_RECORD: &[u8] = b"\x0e\x00obfuscate_key";
const UTXO_PREFIX: u8 = b'C';

/// Encodes `n` with Bitcoin Core's MSB-first varint.
///
/// Ref: <https://github.com/bitcoin/bitcoin/blob/aa87e0b44600a32b32a4b123d4f90d097f1f106f/src/serialize.h#L431>
pub fn encode_varint(mut n: u64) -> Vec<u8> {
    let mut tmp = Vec::with_capacity(10);
    loop {
        let continuation = if tmp.is_empty() { 0x00 } else { 0x80 };
        tmp.push((n & 0x7F) as u8 | continuation);
        if n <= 0x7F {
            break;
        }
        n = (n >> 7) - 1;
    }
    tmp.reverse();
    tmp
}

/// Bitcoin Core's amount compression. Defined for `0 <= n <= MAX_MONEY`.
///
/// Ref: <https://github.com/bitcoin/bitcoin/blob/0903ce8dbc25d3823b03d52f6e6bff74d19e801e/src/compressor.cpp#L140>
pub fn compress_amount(n: u64) -> u64 {
    assert!(n <= MAX_MONEY);

    if n == 0 {
        return 0;
    }
    let mut e = 0;
    let mut n = n;
    while n % 10 == 0 && e < 9 {
        n /= 10;
        e += 1;
    }
    if e < 9 {
        let d = n % 10;
        n /= 10;
        1 + (n * 9 + d - 1) * 10 + e
    } else {
        1 + (n - 1) * 10 + 9
    }
}

/// XORs `value` with `key` repeated over its length.
pub fn obfuscate(value: &[u8], key: &[u8]) -> Vec<u8> {
    value
        .iter()
        .zip(key.iter().cycle())
        .map(|(v, k)| v ^ k)
        .collect()
}

/// The `obfuscate_key` record: the value is the key prefixed with its length.
pub fn obfuscation_key_entry(key: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut value = vec![key.len() as u8];
    value.extend_from_slice(key);
    (OBFUSCATE_KEY_RECORD.to_vec(), value)
}

/// The script of a UTXO as stored in the chainstate.
#[derive(Clone, Debug)]
enum StoredScript {
    PubKeyHash([u8; 20]),
    ScriptHash([u8; 20]),
    /// nSize 2..=5 and the x-coordinate.
    PubKey(u8, [u8; 32]),
    Raw(Vec<u8>),
}

impl StoredScript {
    fn serialize(&self) -> Vec<u8> {
        match self {
            StoredScript::PubKeyHash(hash) => [&[0x00][..], &hash[..]].concat(),
            StoredScript::ScriptHash(hash) => [&[0x01][..], &hash[..]].concat(),
            StoredScript::PubKey(size_code, x) => [&[*size_code][..], &x[..]].concat(),
            StoredScript::Raw(script) => {
                let mut out = encode_varint(script.len() as u64 + 6);
                out.extend_from_slice(script);
                out
            }
        }
    }
}

/// Builds a `(key, value)` pair of a UTXO record, obfuscated with a given key.
#[derive(Clone, Debug)]
pub struct UtxoEntryBuilder {
    txid: [u8; 32],
    vout: u64,
    height: u64,
    coinbase: bool,
    amount: u64,
    script: StoredScript,
}

impl Default for UtxoEntryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl UtxoEntryBuilder {
    pub fn new() -> Self {
        Self {
            txid: [0; 32],
            vout: 0,
            height: 0,
            coinbase: false,
            amount: 50_000,
            script: StoredScript::PubKeyHash([0; 20]),
        }
    }

    /// Sets the txid in display (big-endian) order.
    pub fn with_txid(mut self, txid: [u8; 32]) -> Self {
        self.txid = txid;
        self
    }

    pub fn with_vout(mut self, vout: u64) -> Self {
        self.vout = vout;
        self
    }

    pub fn with_height(mut self, height: u64) -> Self {
        self.height = height;
        self
    }

    pub fn with_coinbase(mut self, coinbase: bool) -> Self {
        self.coinbase = coinbase;
        self
    }

    pub fn with_amount(mut self, amount: u64) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_p2pkh(mut self, pubkey_hash: [u8; 20]) -> Self {
        self.script = StoredScript::PubKeyHash(pubkey_hash);
        self
    }

    pub fn with_p2sh(mut self, script_hash: [u8; 20]) -> Self {
        self.script = StoredScript::ScriptHash(script_hash);
        self
    }

    /// A P2PK output stored with nSize `size_code` (2..=5).
    pub fn with_p2pk(mut self, size_code: u8, x: [u8; 32]) -> Self {
        assert!((2..=5).contains(&size_code));
        self.script = StoredScript::PubKey(size_code, x);
        self
    }

    pub fn with_script(mut self, script: Vec<u8>) -> Self {
        self.script = StoredScript::Raw(script);
        self
    }

    /// Returns the LevelDB key and the value obfuscated with `obfuscation_key`.
    pub fn build(&self, obfuscation_key: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let mut key = vec![UTXO_PREFIX];
        key.extend(self.txid.iter().rev());
        key.extend(encode_varint(self.vout));

        let mut value = encode_varint((self.height << 1) | u64::from(self.coinbase));
        value.extend(encode_varint(compress_amount(self.amount)));
        value.extend(self.script.serialize());

        (key, obfuscate(&value, obfuscation_key))
    }
}
