use std::collections::BTreeMap;
use std::fmt;

use chainstate_codec::{ScriptType, UtxoRecord};

const SATOSHIS_PER_BTC: f64 = 100_000_000.0;

/// Running totals over the dumped UTXOs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Stats {
    pub(crate) count: u64,
    pub(crate) total_amount: u64,
    pub(crate) script_types: BTreeMap<ScriptType, u64>,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            count: 0,
            total_amount: 0,
            script_types: ScriptType::ALL.into_iter().map(|t| (t, 0)).collect(),
        }
    }
}

impl Stats {
    pub(crate) fn record(&mut self, utxo: &UtxoRecord) {
        self.count += 1;
        self.total_amount = self.total_amount.saturating_add(utxo.amount);
        *self.script_types.entry(utxo.script_type).or_insert(0) += 1;
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total UTXOs: {}", self.count)?;
        writeln!(
            f,
            "Total BTC:   {:.8}",
            self.total_amount as f64 / SATOSHIS_PER_BTC
        )?;
        writeln!(f, "Script Types:")?;
        for (script_type, count) in &self.script_types {
            writeln!(f, " {:<18} {}", script_type.as_str(), count)?;
        }
        Ok(())
    }
}
