//! Decoding of Bitcoin Core `chainstate` UTXO records.
//!
//! ```ignore
//! use chainstate_codec::{ChainstateParser, Entry, ParserConfig};
//! let mut parser = ChainstateParser::new(ParserConfig::default());
//! for (key, value) in entries {
//!     if let Entry::Utxo(utxo) = parser.parse_entry(&key, &value)? {
//!         println!("{}:{} {}", utxo.txid, utxo.vout, utxo.amount);
//!     }
//! }
//! ```

mod error;

pub mod address;
pub mod amount;
pub mod obfuscation;
pub mod pubkey;
pub mod record;
pub mod script;
pub mod varint;

pub use crate::address::AddressParams;
pub use crate::error::{Error, Result};
pub use crate::obfuscation::{ObfuscationKey, OBFUSCATE_KEY_PREFIX};
pub use crate::record::{
    ChainstateParser, Entry, ParserConfig, UtxoKey, UtxoRecord, UtxoValue, UTXO_PREFIX,
};
pub use crate::script::{
    HeuristicMatcher, ScriptPatternMatcher, ScriptType, StandardMatcher, WitnessProgram,
};

pub use bitcoin::Network;
