use std::str::FromStr;

use chainstate_codec::UtxoRecord;

/// A column of the dump.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Field {
    Count,
    Txid,
    Vout,
    Height,
    Coinbase,
    Amount,
    Nsize,
    Script,
    Type,
    Address,
}

impl Field {
    pub(crate) const ALL: [Field; 10] = [
        Field::Count,
        Field::Txid,
        Field::Vout,
        Field::Height,
        Field::Coinbase,
        Field::Amount,
        Field::Nsize,
        Field::Script,
        Field::Type,
        Field::Address,
    ];

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Field::Count => "count",
            Field::Txid => "txid",
            Field::Vout => "vout",
            Field::Height => "height",
            Field::Coinbase => "coinbase",
            Field::Amount => "amount",
            Field::Nsize => "nsize",
            Field::Script => "script",
            Field::Type => "type",
            Field::Address => "address",
        }
    }

    /// The cell of this column for the `count`-th record.
    pub(crate) fn value(&self, count: u64, record: &UtxoRecord) -> String {
        match self {
            Field::Count => count.to_string(),
            Field::Txid => record.txid.clone(),
            Field::Vout => record.vout.to_string(),
            Field::Height => record.height.to_string(),
            Field::Coinbase => u8::from(record.is_coinbase).to_string(),
            Field::Amount => record.amount.to_string(),
            Field::Nsize => record.size_code.to_string(),
            Field::Script => record.script_hex(),
            Field::Type => record.script_type.to_string(),
            Field::Address => record.address.clone().unwrap_or_default(),
        }
    }
}

impl FromStr for Field {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|field| field.name() == s)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "'{}' is not a field you can use for the output.\nChoose from the following: {}",
                    s,
                    Field::ALL.map(|field| field.name()).join(",")
                )
            })
    }
}

/// Parses a comma separated field list, keeping the requested order.
pub(crate) fn parse_fields(fields: &str) -> anyhow::Result<Vec<Field>> {
    fields.split(',').map(|field| field.trim().parse()).collect()
}
