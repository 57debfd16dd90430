use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use chainstate_codec::{ChainstateParser, Entry, Error as CodecError, ScriptPatternMatcher};
use rusty_leveldb::{LdbIterator, Options, DB};

use crate::sink::RecordSink;
use crate::stats::Stats;

const PROGRESS_INTERVAL: u64 = 100_000;

/// Opens an existing chainstate directory.
pub(crate) fn open_chainstate(path: &Path) -> Result<DB> {
    let mut options = Options::default();
    options.create_if_missing = false;
    DB::open(path, options).with_context(|| format!("Couldn't open LevelDB at {}", path.display()))
}

/// All entries of the database in key order.
pub(crate) fn entries(database: &mut DB) -> Result<impl Iterator<Item = (Vec<u8>, Vec<u8>)>> {
    let mut db_iter = database
        .new_iter()
        .context("Couldn't iterate over LevelDB")?;
    db_iter.reset();
    Ok(std::iter::from_fn(move || LdbIterator::next(&mut db_iter)))
}

/// Decodes `entries` and writes every UTXO to `sink` until the entries run out
/// or `running` is cleared.
pub(crate) fn dump<I, M>(
    entries: I,
    parser: &mut ChainstateParser<M>,
    sink: &mut dyn RecordSink,
    running: &AtomicBool,
) -> Result<Stats>
where
    I: IntoIterator<Item = (Vec<u8>, Vec<u8>)>,
    M: ScriptPatternMatcher,
{
    let mut stats = Stats::default();

    for (key, value) in entries {
        if !running.load(Ordering::SeqCst) {
            tracing::info!("Interrupt signal caught. Shutting down gracefully.");
            break;
        }

        match parser.parse_entry(&key, &value) {
            Ok(Entry::Utxo(utxo)) => {
                stats.record(&utxo);
                sink.write(stats.count, &utxo)?;
                if stats.count % PROGRESS_INTERVAL == 0 {
                    tracing::info!("{} utxos processed", stats.count);
                }
            }
            Ok(Entry::ObfuscationKey) => {
                let key = parser.obfuscation_key().as_bytes().unwrap_or_default();
                tracing::info!(">>> Obfuscation key: {}", hex::encode(key));
            }
            Ok(Entry::Other) => {}
            Err(CodecError::EmptyObfuscationKey) => anyhow::bail!(
                "No obfuscation key found in chainstate database.\n\
                 This database may be corrupted or from an older version that doesn't use obfuscation.\n\
                 Cannot process UTXO values without the obfuscation key."
            ),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to decode entry {}", hex::encode(&key)))
            }
        }
    }

    Ok(stats)
}

/// Flushes `sink` and returns the outcome of the dump. A failed dump is
/// reported over a failed flush.
pub(crate) fn finish(result: Result<Stats>, sink: Box<dyn RecordSink + '_>) -> Result<Stats> {
    let finished = sink.finish();
    match (result, finished) {
        (Ok(stats), finished) => finished.map(|()| stats),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(flush_err)) => {
            tracing::warn!("Failed to flush the output: {:#}", flush_err);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{parse_fields, Field};
    use crate::sink::CsvSink;
    use assert_matches::assert_matches;
    use chainstate_codec::{ParserConfig, ScriptType, UtxoRecord};
    use chainstate_test_utils::{obfuscation_key_entry, scripts, UtxoEntryBuilder};

    const OBFUSCATION_KEY: [u8; 8] = [0x1f, 0x2e, 0x3d, 0x4c, 0x5b, 0x6a, 0x79, 0x88];

    fn chainstate() -> Vec<(Vec<u8>, Vec<u8>)> {
        vec![
            obfuscation_key_entry(&OBFUSCATION_KEY),
            UtxoEntryBuilder::new()
                .with_txid([0x01; 32])
                .with_vout(0)
                .with_height(1)
                .with_coinbase(true)
                .with_amount(5_000_000_000)
                .build(&OBFUSCATION_KEY),
            UtxoEntryBuilder::new()
                .with_txid([0x02; 32])
                .with_vout(1)
                .with_height(700_000)
                .with_amount(0)
                .with_script(scripts::op_return(b"hello"))
                .build(&OBFUSCATION_KEY),
            // Best block hash record.
            (b"B".to_vec(), vec![0xAB; 32]),
        ]
    }

    fn run(entries: Vec<(Vec<u8>, Vec<u8>)>, running: bool) -> (Result<Stats>, String) {
        let mut out = Vec::new();
        let mut sink = CsvSink::new(
            &mut out,
            parse_fields("count,txid,vout,height,coinbase,amount,type").unwrap(),
            false,
        )
        .unwrap();
        let mut parser = ChainstateParser::new(ParserConfig::default());
        let result = dump(entries, &mut parser, &mut sink, &AtomicBool::new(running));
        Box::new(sink).finish().unwrap();
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_dump_writes_every_utxo() {
        let (stats, csv) = run(chainstate(), true);
        let stats = stats.unwrap();

        assert_eq!(stats.count, 2);
        assert_eq!(stats.total_amount, 5_000_000_000);
        assert_eq!(stats.script_types[&ScriptType::PubKeyHash], 1);
        assert_eq!(stats.script_types[&ScriptType::NullData], 1);

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "count,txid,vout,height,coinbase,amount,type");
        assert_eq!(
            lines[1],
            format!("1,{},0,1,1,5000000000,p2pkh", "01".repeat(32))
        );
        assert_eq!(
            lines[2],
            format!("2,{},1,700000,0,0,nulldata", "02".repeat(32))
        );
    }

    #[test]
    fn test_dump_stops_when_interrupted() {
        let (stats, csv) = run(chainstate(), false);
        assert_eq!(stats.unwrap().count, 0);
        assert_eq!(csv, "count,txid,vout,height,coinbase,amount,type\n");
    }

    #[test]
    fn test_dump_requires_obfuscation_key() {
        let mut entries = chainstate();
        entries.remove(0);
        let (stats, _) = run(entries, true);
        let err = stats.unwrap_err();
        assert!(err
            .to_string()
            .starts_with("No obfuscation key found in chainstate database."));
    }

    #[test]
    fn test_dump_reports_undecodable_entry() {
        let mut entries = chainstate();
        // A UTXO key without a vout.
        entries.insert(1, (vec![b'C'; 33], vec![0x00; 4]));
        let (stats, _) = run(entries, true);
        let err = stats.unwrap_err();
        assert!(err.to_string().starts_with("Failed to decode entry 4343"));
        assert_matches!(
            err.downcast_ref::<CodecError>(),
            Some(CodecError::MalformedKey { len: 33 })
        );
    }

    struct BrokenSink;

    impl RecordSink for BrokenSink {
        fn write(&mut self, _count: u64, _record: &UtxoRecord) -> Result<()> {
            Ok(())
        }

        fn finish(self: Box<Self>) -> Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[test]
    fn test_finish_keeps_decode_error() {
        let err = finish(Err(anyhow::anyhow!("bad entry")), Box::new(BrokenSink)).unwrap_err();
        assert_eq!(err.to_string(), "bad entry");
    }

    #[test]
    fn test_finish_reports_flush_error() {
        let err = finish(Ok(Stats::default()), Box::new(BrokenSink)).unwrap_err();
        assert_eq!(err.to_string(), "disk full");

        let mut out = Vec::new();
        let sink = CsvSink::new(&mut out, vec![Field::Count], false).unwrap();
        let stats = finish(Ok(Stats::default()), Box::new(sink)).unwrap();
        assert_eq!(stats.count, 0);
    }

    #[test]
    fn test_dump_from_leveldb() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut database = DB::open(dir.path(), Options::default()).unwrap();
            for (key, value) in chainstate() {
                database.put(&key, &value).unwrap();
            }
            database.flush().unwrap();
        }

        let mut database = open_chainstate(dir.path()).unwrap();
        let (stats, csv) = run(entries(&mut database).unwrap().collect(), true);

        // The obfuscation key record sorts before every UTXO.
        assert_eq!(stats.unwrap().count, 2);
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn test_open_missing_chainstate() {
        let dir = tempfile::tempdir().unwrap();
        assert!(open_chainstate(&dir.path().join("chainstate")).is_err());
    }
}
