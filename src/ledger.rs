use crate::data::PriceRecord;
use anyhow::Context;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::fs;
use std::path::{Path, PathBuf};

/// Rolling log of price records that is cut back to the newest record once
/// a full cycle of appends has been written.
pub trait PriceLedger: Send {
    /// Persists `record` and returns the number of records now stored.
    fn append(&mut self, record: PriceRecord, cycle_interval: usize) -> anyhow::Result<usize>;
    fn reset(&mut self);
    /// Appends written since the last truncation or reset.
    fn count(&self) -> usize;
}

pub struct JsonLedger {
    path: PathBuf,
    scrape_count: usize,
}

impl JsonLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            scrape_count: 0,
        }
    }

    /// Reads the ledger file. A missing or undecodable file is an empty ledger.
    pub fn load(path: &Path) -> Vec<PriceRecord> {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) => {
                debug!("No ledger data at {}: {e}", path.display());
                return vec![];
            }
        };

        serde_json::from_str(&json).unwrap_or_else(|e| {
            warn!("Ignoring unreadable ledger {}: {e}", path.display());
            vec![]
        })
    }

    fn save(&self, records: &[PriceRecord]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let mut buf = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        records
            .serialize(&mut serializer)
            .context("Failed to serialise price records")?;

        fs::write(&self.path, &buf)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

impl PriceLedger for JsonLedger {
    fn append(&mut self, record: PriceRecord, cycle_interval: usize) -> anyhow::Result<usize> {
        let mut records = Self::load(&self.path);
        records.push(record);

        // the file may hold records from an earlier process
        let mut scrape_count = self.scrape_count + 1;
        if scrape_count >= cycle_interval || records.len() > cycle_interval {
            info!("Completed {scrape_count} scrapes. Resetting data for next cycle.");
            records.drain(..records.len() - 1);
            scrape_count = 0;
        }

        self.save(&records)?;
        self.scrape_count = scrape_count;

        debug!(
            "Saved {} records to {} (cycle position {scrape_count})",
            records.len(),
            self.path.display()
        );
        Ok(records.len())
    }

    fn reset(&mut self) {
        self.scrape_count = 0;
    }

    fn count(&self) -> usize {
        self.scrape_count
    }
}
