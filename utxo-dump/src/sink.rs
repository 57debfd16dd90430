use std::io::{BufWriter, Write};
use std::mem;
use std::sync::mpsc::{self, SyncSender};
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use chainstate_codec::UtxoRecord;
use serde::Serialize;

use crate::fields::Field;

pub(crate) const JSON_BATCH_SIZE: usize = 1024;

/// Batches queued for the writer thread before `write` blocks.
const PENDING_BATCHES: usize = 4;

/// Destination of decoded UTXOs.
pub(crate) trait RecordSink {
    /// Writes the `count`-th UTXO of the dump.
    fn write(&mut self, count: u64, record: &UtxoRecord) -> Result<()>;

    /// Flushes whatever is still buffered and releases the output.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Comma separated rows with the selected fields, preceded by a header.
pub(crate) struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    fields: Vec<Field>,
    echo: bool,
}

impl<W: Write> CsvSink<W> {
    pub(crate) fn new(output: W, fields: Vec<Field>, echo: bool) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new().from_writer(output);
        let header: Vec<&str> = fields.iter().map(Field::name).collect();
        writer.write_record(&header)?;
        if echo {
            println!("{}", header.join(","));
        }
        Ok(Self {
            writer,
            fields,
            echo,
        })
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn write(&mut self, count: u64, record: &UtxoRecord) -> Result<()> {
        let row: Vec<String> = self
            .fields
            .iter()
            .map(|field| field.value(count, record))
            .collect();
        self.writer.write_record(&row)?;
        if self.echo {
            println!("{}", row.join(","));
        }
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct UtxoDocument {
    tx_id: String,
    vout: u64,
    height: u64,
    coinbase: bool,
    amount: u64,
    nsize: u64,
    script: String,
    #[serde(rename = "type")]
    script_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<String>,
}

impl From<&UtxoRecord> for UtxoDocument {
    fn from(record: &UtxoRecord) -> Self {
        Self {
            tx_id: record.txid.clone(),
            vout: record.vout,
            height: record.height,
            coinbase: record.is_coinbase,
            amount: record.amount,
            nsize: record.size_code,
            script: record.script_hex(),
            script_type: record.script_type.as_str(),
            address: record.address.clone(),
        }
    }
}

/// One JSON document per line. Full batches are handed to a writer thread.
pub(crate) struct JsonLinesSink {
    batch: Vec<UtxoDocument>,
    batch_size: usize,
    sender: SyncSender<Vec<UtxoDocument>>,
    writer: Option<JoinHandle<Result<u64>>>,
}

impl JsonLinesSink {
    pub(crate) fn spawn<W: Write + Send + 'static>(output: W, batch_size: usize) -> Self {
        let (sender, receiver) = mpsc::sync_channel::<Vec<UtxoDocument>>(PENDING_BATCHES);
        let writer = thread::spawn(move || -> Result<u64> {
            let mut output = BufWriter::new(output);
            let mut written = 0;
            for batch in receiver {
                for document in &batch {
                    serde_json::to_writer(&mut output, document)?;
                    output.write_all(b"\n")?;
                }
                written += batch.len() as u64;
                tracing::debug!("{} documents written", written);
            }
            output.flush()?;
            Ok(written)
        });

        Self {
            batch: Vec::with_capacity(batch_size),
            batch_size: batch_size.max(1),
            sender,
            writer: Some(writer),
        }
    }

    fn send_batch(&mut self) -> Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let batch = mem::replace(&mut self.batch, Vec::with_capacity(self.batch_size));
        if self.sender.send(batch).is_err() {
            // The receiver only goes away when the writer thread has failed.
            return Err(join_writer(self.writer.take())
                .err()
                .unwrap_or_else(|| anyhow!("JSON writer thread stopped early")));
        }
        Ok(())
    }
}

fn join_writer(writer: Option<JoinHandle<Result<u64>>>) -> Result<u64> {
    let writer = writer.context("JSON writer thread already joined")?;
    writer
        .join()
        .map_err(|_| anyhow!("JSON writer thread panicked"))?
}

impl RecordSink for JsonLinesSink {
    fn write(&mut self, _count: u64, record: &UtxoRecord) -> Result<()> {
        self.batch.push(record.into());
        if self.batch.len() >= self.batch_size {
            self.send_batch()?;
        }
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        self.send_batch()?;
        let Self { sender, writer, .. } = *self;
        drop(sender);
        let written = join_writer(writer)?;
        tracing::debug!("JSON writer finished after {} documents", written);
        Ok(())
    }
}
