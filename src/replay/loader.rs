//! Bar file loading
//!
//! CSV with a header row: `timestamp,open,high,low,close[,volume]`. The
//! timestamp is the bar OPEN time, either RFC 3339 or `YYYY-MM-DD HH:MM:SS`
//! in UTC. Files ending in `.zst` are decompressed on the fly.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::trading_core::Bar;

#[derive(Debug, Deserialize)]
struct BarRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: u64,
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .with_context(|| format!("Failed to parse timestamp: {}", raw))?;
    Ok(naive.and_utc())
}

/// Parse bars from any CSV reader
pub fn read_bars<R: Read>(reader: R) -> Result<Vec<Bar>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut bars = Vec::new();
    for (line, result) in csv_reader.deserialize().enumerate() {
        let row: BarRow = result.with_context(|| format!("Failed to parse CSV row {}", line + 1))?;
        bars.push(Bar {
            timestamp: parse_timestamp(&row.timestamp)?,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    Ok(bars)
}

/// Load a bar file, zstd-compressed or plain
pub fn load_bars(path: &Path) -> Result<Vec<Bar>> {
    let file = File::open(path).with_context(|| format!("Failed to open file: {:?}", path))?;

    let bars = if path.extension().is_some_and(|ext| ext == "zst") {
        let decoder = zstd::stream::Decoder::new(file)
            .with_context(|| format!("Failed to create zstd decoder for: {:?}", path))?;
        read_bars(BufReader::new(decoder))
    } else {
        read_bars(BufReader::new(file))
    }
    .with_context(|| format!("Failed to load bars from {:?}", path))?;

    tracing::debug!("Loaded {} bars from {:?}", bars.len(), path);
    Ok(bars)
}
