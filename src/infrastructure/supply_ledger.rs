//! Circulating-supply ledger backed by a local CSV file.
//!
//! The file is append-only: one row per complete UTC day, written as
//! `date,circulating_supply_at_that_date,total_claimed_that_day` with
//! `DD/MM/YYYY` dates. Each refresh sums claim events for the days missing
//! since the last row and appends them. Existing bytes are kept as-is; the
//! file is replaced through a temp file so a failed write leaves it intact.

use crate::domain::{
    AdapterError, AdapterResult, BlockClock, ChainSource, CirculatingSupplyRow, SupplyLedger,
};
use crate::infrastructure::abi::round4;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const LEDGER_DATE_FORMAT: &str = "%d/%m/%Y";

#[derive(Debug, Serialize, Deserialize)]
struct LedgerRecord {
    date: String,
    circulating_supply_at_that_date: f64,
    total_claimed_that_day: f64,
}

impl LedgerRecord {
    fn into_row(self) -> AdapterResult<CirculatingSupplyRow> {
        Ok(CirculatingSupplyRow {
            date: parse_ledger_date(&self.date)?,
            circulating_supply: self.circulating_supply_at_that_date,
            total_claimed_that_day: self.total_claimed_that_day,
        })
    }

    fn from_row(row: &CirculatingSupplyRow) -> Self {
        Self {
            date: row.date.format(LEDGER_DATE_FORMAT).to_string(),
            circulating_supply_at_that_date: row.circulating_supply,
            total_claimed_that_day: row.total_claimed_that_day,
        }
    }
}

/// `DD/MM/YYYY`, with ISO dates accepted for hand-edited files.
fn parse_ledger_date(raw: &str) -> AdapterResult<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, LEDGER_DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .map_err(|e| AdapterError::decode(format!("ledger date {}: {}", raw, e)))
}

pub struct CsvSupplyLedger {
    path: PathBuf,
    chain: Arc<dyn ChainSource>,
    /// Held across read, compute and write so concurrent refreshes append once.
    refresh_lock: Mutex<()>,
}

impl CsvSupplyLedger {
    pub fn new<P: AsRef<Path>>(path: P, chain: Arc<dyn ChainSource>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            chain,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Raw file content and its parsed rows.
    async fn read_rows(&self) -> AdapterResult<(Vec<u8>, Vec<CirculatingSupplyRow>)> {
        let content = match fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Supply ledger {} does not exist yet", self.path.display());
                return Ok((Vec::new(), Vec::new()));
            }
            Err(e) => return Err(e.into()),
        };

        let rows = csv::Reader::from_reader(content.as_slice())
            .deserialize::<LedgerRecord>()
            .map(|record| record?.into_row())
            .collect::<AdapterResult<Vec<_>>>()?;
        Ok((content, rows))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "circ_supply.csv".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn append_rows(&self, existing: Vec<u8>, rows: &[CirculatingSupplyRow]) -> AdapterResult<()> {
        let needs_header = existing.iter().all(u8::is_ascii_whitespace);
        let mut content = if needs_header { Vec::new() } else { existing };
        if !content.is_empty() && !content.ends_with(b"\n") {
            content.push(b'\n');
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(content);
        for row in rows {
            writer.serialize(LedgerRecord::from_row(row))?;
        }
        let content = writer
            .into_inner()
            .map_err(|e| AdapterError::decode(format!("ledger buffer: {}", e)))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let tmp = self.temp_path();
        fs::write(&tmp, &content).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Rows for every complete day after the last ledger row, up to yesterday.
    async fn missing_rows(&self, existing: &[CirculatingSupplyRow]) -> AdapterResult<Vec<CirculatingSupplyRow>> {
        let header = self.chain.latest_block().await?;
        let clock = BlockClock::from_header(header, self.chain.seconds_per_block());
        let epoch_block = self.chain.epoch_block();

        let last = existing.iter().max_by_key(|row| row.date);
        let first_missing = match last {
            Some(row) => row.date + Duration::days(1),
            None => clock.date_of(epoch_block),
        };
        let today = clock.anchor_date();
        if first_missing >= today {
            return Ok(Vec::new());
        }

        let from_block = clock.block_at_start_of(first_missing).max(epoch_block);
        let to_block = clock.block_at_start_of(today).saturating_sub(1);
        let claims = if to_block >= from_block {
            self.chain.read_claim_events(from_block, to_block).await?
        } else {
            Vec::new()
        };

        let mut claimed_by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for claim in &claims {
            *claimed_by_day.entry(clock.date_of(claim.block_number)).or_insert(0.0) += claim.amount;
        }

        Ok(fill_days(
            first_missing,
            today,
            last.map(|row| row.circulating_supply).unwrap_or(0.0),
            &claimed_by_day,
        ))
    }
}

/// One row per day in `[from, until)`, with the running circulating total.
fn fill_days(
    from: NaiveDate,
    until: NaiveDate,
    mut circulating: f64,
    claimed_by_day: &BTreeMap<NaiveDate, f64>,
) -> Vec<CirculatingSupplyRow> {
    let mut rows = Vec::new();
    let mut date = from;
    while date < until {
        let claimed = claimed_by_day.get(&date).copied().unwrap_or(0.0);
        circulating += claimed;
        rows.push(CirculatingSupplyRow {
            date,
            circulating_supply: round4(circulating),
            total_claimed_that_day: round4(claimed),
        });
        date += Duration::days(1);
    }
    rows
}

#[async_trait]
impl SupplyLedger for CsvSupplyLedger {
    async fn read_and_update_circulating_supply_csv(&self) -> AdapterResult<Vec<CirculatingSupplyRow>> {
        let _guard = self.refresh_lock.lock().await;
        let (content, mut rows) = self.read_rows().await?;

        match self.missing_rows(&rows).await {
            Ok(new_rows) if new_rows.is_empty() => {
                debug!("Supply ledger already up to date");
            }
            Ok(new_rows) => {
                self.append_rows(content, &new_rows).await?;
                info!(
                    "Appended {} days to supply ledger {}",
                    new_rows.len(),
                    self.path.display()
                );
                rows.extend(new_rows);
            }
            Err(e) => {
                warn!("Supply ledger refresh failed, serving existing rows: {}", e);
            }
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BlockHeader, ClaimEvent, MockChainSource};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    // 2024-06-10 12:00 UTC at block 1_000_000, 12s blocks
    fn chain_at_noon() -> MockChainSource {
        let mut chain = MockChainSource::new();
        let noon = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        chain.expect_latest_block().returning(move || {
            Ok(BlockHeader {
                number: 1_000_000,
                timestamp: noon.timestamp(),
            })
        });
        chain.expect_seconds_per_block().return_const(12.0);
        chain.expect_epoch_block().return_const(900_000u64);
        chain
    }

    #[test]
    fn parses_both_date_formats() {
        assert_eq!(parse_ledger_date("07/06/2024").unwrap(), d("2024-06-07"));
        assert_eq!(parse_ledger_date("2024-06-07").unwrap(), d("2024-06-07"));
        assert!(parse_ledger_date("June 7").is_err());
    }

    #[test]
    fn fill_days_runs_the_total_forward() {
        let claims = BTreeMap::from([(d("2024-06-08"), 5.0)]);
        let rows = fill_days(d("2024-06-07"), d("2024-06-10"), 100.0, &claims);
        let totals: Vec<_> = rows.iter().map(|r| r.circulating_supply).collect();
        assert_eq!(totals, vec![100.0, 105.0, 105.0]);
        assert_eq!(rows[1].total_claimed_that_day, 5.0);
        assert_eq!(rows.last().unwrap().date, d("2024-06-09"));
    }

    #[tokio::test]
    async fn appends_missing_days_up_to_yesterday() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("circ_supply.csv");
        std::fs::write(
            &path,
            "date,circulating_supply_at_that_date,total_claimed_that_day\n07/06/2024,100.0,1.0\n",
        )
        .unwrap();

        let mut chain = chain_at_noon();
        chain
            .expect_read_claim_events()
            .times(1)
            .returning(|from, to| {
                // Midnight 8 June through the last block of 9 June
                assert_eq!(from, 1_000_000 - 18_000);
                assert_eq!(to, 1_000_000 - 3_600 - 1);
                Ok(vec![
                    ClaimEvent { block_number: from + 10, amount: 2.5 },
                    ClaimEvent { block_number: to, amount: 1.5 },
                ])
            });

        let ledger = CsvSupplyLedger::new(&path, Arc::new(chain));
        let rows = ledger.read_and_update_circulating_supply_csv().await.unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].date, d("2024-06-08"));
        assert_eq!(rows[1].circulating_supply, 102.5);
        assert_eq!(rows[2].circulating_supply, 104.0);

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 4);
        assert!(written.contains("09/06/2024,104.0,1.5"));
    }

    #[tokio::test]
    async fn missing_final_newline_does_not_merge_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("circ_supply.csv");
        std::fs::write(
            &path,
            "date,circulating_supply_at_that_date,total_claimed_that_day\n07/06/2024,100.0,1.0",
        )
        .unwrap();

        let mut chain = chain_at_noon();
        chain
            .expect_read_claim_events()
            .times(1)
            .returning(|from, _| Ok(vec![ClaimEvent { block_number: from + 10, amount: 2.5 }]));

        let ledger = CsvSupplyLedger::new(&path, Arc::new(chain));
        assert_eq!(ledger.read_and_update_circulating_supply_csv().await.unwrap().len(), 3);

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("07/06/2024,100.0,1.0\n08/06/2024,102.5,2.5\n"));
        assert!(!ledger.temp_path().exists());

        // Up to date now: the file parses and no further claims are read
        let rows = ledger.read_and_update_circulating_supply_csv().await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].circulating_supply, 102.5);
    }

    #[tokio::test]
    async fn concurrent_refreshes_append_each_day_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("circ_supply.csv");
        std::fs::write(
            &path,
            "date,circulating_supply_at_that_date,total_claimed_that_day\n07/06/2024,100.0,1.0\n",
        )
        .unwrap();

        let mut chain = chain_at_noon();
        chain
            .expect_read_claim_events()
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let ledger = CsvSupplyLedger::new(&path, Arc::new(chain));
        let (first, second) = tokio::join!(
            ledger.read_and_update_circulating_supply_csv(),
            ledger.read_and_update_circulating_supply_csv()
        );
        assert_eq!(first.unwrap().len(), 3);
        assert_eq!(second.unwrap().len(), 3);

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 4);
        assert_eq!(written.matches("08/06/2024").count(), 1);
    }

    #[tokio::test]
    async fn new_ledger_gets_a_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("circ_supply.csv");

        let mut chain = chain_at_noon();
        chain.expect_read_claim_events().returning(|_, _| Ok(vec![]));

        let ledger = CsvSupplyLedger::new(&path, Arc::new(chain));
        let rows = ledger.read_and_update_circulating_supply_csv().await.unwrap();
        assert!(!rows.is_empty());

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("date,circulating_supply_at_that_date,total_claimed_that_day\n"));
        assert_eq!(written.lines().count(), rows.len() + 1);
    }

    #[tokio::test]
    async fn refresh_failure_serves_existing_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("circ_supply.csv");
        std::fs::write(
            &path,
            "date,circulating_supply_at_that_date,total_claimed_that_day\n07/06/2024,100.0,1.0\n",
        )
        .unwrap();

        let mut chain = MockChainSource::new();
        chain.expect_latest_block().returning(|| {
            Err(AdapterError::Rpc {
                method: "eth_getBlockByNumber".to_string(),
                message: "unavailable".to_string(),
            })
        });

        let ledger = CsvSupplyLedger::new(&path, Arc::new(chain));
        let rows = ledger.read_and_update_circulating_supply_csv().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].circulating_supply, 100.0);
    }

    #[tokio::test]
    async fn up_to_date_ledger_makes_no_log_queries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("circ_supply.csv");
        std::fs::write(
            &path,
            "date,circulating_supply_at_that_date,total_claimed_that_day\n09/06/2024,100.0,0.0\n",
        )
        .unwrap();

        let mut chain = chain_at_noon();
        chain.expect_read_claim_events().never();

        let ledger = CsvSupplyLedger::new(&path, Arc::new(chain));
        let rows = ledger.read_and_update_circulating_supply_csv().await.unwrap();
        assert_eq!(rows.len(), 1);
    }
}
