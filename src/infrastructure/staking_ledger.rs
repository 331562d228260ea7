//! Staking event history and emission schedule, both read from CSV snapshots.

use crate::domain::{AdapterError, AdapterResult, EmissionDay, StakeEvent, StakingLedger};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Columns before the per-category emission columns.
const EMISSION_KEY_COLUMNS: usize = 2;

pub struct CsvStakingLedger {
    events_path: PathBuf,
    emissions_path: PathBuf,
}

impl CsvStakingLedger {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(events_path: P, emissions_path: Q) -> Self {
        Self {
            events_path: events_path.as_ref().to_path_buf(),
            emissions_path: emissions_path.as_ref().to_path_buf(),
        }
    }
}

fn parse_emission_date(raw: &str) -> AdapterResult<NaiveDate> {
    let raw = raw.trim();
    ["%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| AdapterError::decode(format!("emission date {}", raw)))
}

/// Emission cells may carry thousands separators (`"1,234.5"`); blanks are zero.
fn parse_amount(raw: &str) -> AdapterResult<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Ok(0.0);
    }
    cleaned
        .parse()
        .map_err(|e| AdapterError::decode(format!("emission amount {}: {}", raw, e)))
}

fn parse_events(content: &[u8]) -> AdapterResult<Vec<StakeEvent>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content);
    reader
        .deserialize::<StakeEvent>()
        .map(|record| record.map_err(AdapterError::from))
        .collect()
}

fn parse_emissions(content: &[u8]) -> AdapterResult<Vec<EmissionDay>> {
    let mut reader = csv::Reader::from_reader(content);
    let categories: Vec<String> = reader
        .headers()?
        .iter()
        .skip(EMISSION_KEY_COLUMNS)
        .map(|h| h.trim().to_string())
        .collect();

    let mut days = Vec::new();
    for record in reader.records() {
        let record = record?;
        let date = parse_emission_date(record.get(1).unwrap_or_default())?;
        let emissions = categories
            .iter()
            .enumerate()
            .map(|(i, category)| {
                let cell = record.get(i + EMISSION_KEY_COLUMNS).unwrap_or_default();
                Ok((category.clone(), parse_amount(cell)?))
            })
            .collect::<AdapterResult<Vec<_>>>()?;
        days.push(EmissionDay { date, emissions });
    }
    days.sort_by_key(|day| day.date);
    Ok(days)
}

#[async_trait]
impl StakingLedger for CsvStakingLedger {
    async fn read_stake_events(&self) -> AdapterResult<Vec<StakeEvent>> {
        let content = fs::read(&self.events_path).await?;
        let events = parse_events(&content)?;
        debug!("Read {} stake events from {}", events.len(), self.events_path.display());
        Ok(events)
    }

    async fn read_emission_schedule(&self) -> AdapterResult<Vec<EmissionDay>> {
        let content = fs::read(&self.emissions_path).await?;
        parse_emissions(&content)
    }
}
