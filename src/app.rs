use crate::config::Config;
use crate::data::PriceRecord;
use crate::extractor;
use crate::fetch::PageFetcher;
use crate::ledger::PriceLedger;
use crate::web::run_web_server;
use chrono::Local;
use log::{debug, error, info, warn};
use std::time::Duration;
use tokio::sync::broadcast::{self, Receiver, Sender};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Outcome of one scrape cycle, as shown to whoever drives the scraper.
#[derive(Clone, Debug)]
pub struct CycleReport {
    pub record: PriceRecord,
    /// Records in the ledger after the save, `None` when the save failed.
    pub record_count: Option<usize>,
    pub status: String,
}

pub struct App<F: PageFetcher, L: PriceLedger> {
    config: Config,
    fetcher: F,
    ledger: L,
    record_sender: Sender<PriceRecord>,
}

impl<F: PageFetcher, L: PriceLedger> App<F, L> {
    pub fn new(config: Config, fetcher: F, ledger: L) -> Self {
        let (record_sender, _) = broadcast::channel::<PriceRecord>(100);

        Self {
            config,
            fetcher,
            ledger,
            record_sender,
        }
    }

    pub fn subscribe(&self) -> Receiver<PriceRecord> {
        self.record_sender.subscribe()
    }

    #[cfg(test)]
    pub(crate) fn ledger(&self) -> &L {
        &self.ledger
    }

    pub async fn scrape_cycle(&mut self) -> CycleReport {
        let mut record = PriceRecord::stamped(Local::now());

        for source in &self.config.pairs {
            let html = match self.fetcher.fetch(&source.url).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("Error fetching {} from {}: {e}", source.pair, source.url);
                    String::new()
                }
            };

            let price = extractor::extract(&html, &source.pair);
            debug!("Current {} price: {price}", source.pair);
            record.insert_quote(&source.pair, price);
        }

        let cycle_interval = self.config.cycle_interval;
        let (record_count, status) = match self.ledger.append(record.clone(), cycle_interval) {
            Ok(count) if self.ledger.count() == 0 => (
                Some(count),
                format!("Completed {cycle_interval}-scrape cycle. Resetting data."),
            ),
            Ok(count) => (
                Some(count),
                format!("Data saved to {}", self.config.ledger_path.display()),
            ),
            Err(e) => {
                error!("Error saving price record: {e:#}");
                (None, format!("Error saving to JSON: {e:#}"))
            }
        };

        if self.record_sender.send(record.clone()).is_err() {
            debug!("No price subscribers");
        }

        CycleReport {
            record,
            record_count,
            status,
        }
    }

    /// Scrapes every `scrape_interval_sec` until cancelled, starting with a
    /// fresh ledger cycle.
    pub async fn run(&mut self, cancellation_token: CancellationToken) -> anyhow::Result<()> {
        self.ledger.reset();

        let server_handle = self.config.web.enabled.then(|| {
            run_web_server(
                cancellation_token.clone(),
                self.record_sender.clone(),
                self.config.ledger_path.clone(),
                self.config.web.host.clone(),
                self.config.web.port,
            )
        });

        let scrape_duration = Duration::from_secs(self.config.scrape_interval_sec);
        let mut scrape_interval = tokio::time::interval(scrape_duration);
        scrape_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    info!("Cancellation requested, exiting...");
                    break;
                }
                _ = scrape_interval.tick() => {
                    let report = self.scrape_cycle().await;
                    match report.record_count {
                        Some(count) => info!("{} (records: {count})", report.status),
                        None => error!("{}", report.status),
                    }
                },
            }
        }

        if let Some(handle) = server_handle {
            handle.await?;
        }

        Ok(())
    }
}
