use axum::extract::ws::{Message, WebSocket};
use serde::Serialize;
use std::io::{Read, Seek};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::core::bpl::Section;
use crate::core::error::{BsigError, Result};
use crate::core::format::TimeSeries;
use crate::core::reader::BsigReader;

// MTS timestamps are microseconds, plots want seconds
const MICROS_PER_SECOND: f64 = 1e6;

/// Which column of a file a streamed header refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalSource {
    pub name: String,
    /// Slot of an array signal, `None` for scalar signals.
    pub slot: Option<usize>,
}

impl SignalSource {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: None,
        }
    }

    pub fn slot(name: impl Into<String>, slot: usize) -> Self {
        Self {
            name: name.into(),
            slot: Some(slot),
        }
    }

    /// Header under which this column is exposed, `name` or `name[slot]`.
    pub fn header(&self) -> String {
        match self.slot {
            Some(slot) => format!("{}[{}]", self.name, slot),
            None => self.name.clone(),
        }
    }
}

#[derive(Serialize)]
struct SignalPayload {
    timestamp: f64,
    value: f64,
    desc: String,
    seq: u64,
    end_flag: bool,
}

/// Reads one column with its time axis.
///
/// Timestamps come from `time_signal` when the file has it with a matching
/// length, otherwise the sample index is used. The optional section is
/// applied in the time signal's own unit before scaling to seconds.
pub fn load_series<R: Read + Seek>(
    reader: &BsigReader<R>,
    source: &SignalSource,
    time_signal: &str,
    section: Option<&Section>,
) -> Result<TimeSeries> {
    let signal = reader.read(&source.name)?;
    let values = match source.slot {
        Some(slot) => signal.column_f64(slot).ok_or_else(|| {
            BsigError::InvalidShape(format!(
                "{} has {} slots, no slot {}",
                source.name,
                signal.array_length(),
                slot
            ))
        })?,
        None if signal.is_array() => {
            return Err(BsigError::InvalidShape(format!(
                "{} is an array signal, pick a slot",
                source.name
            )))
        }
        None => signal.values().to_f64_vec(),
    };

    let timed = match reader.descriptor(time_signal) {
        Some(desc) if desc.sample_count as usize == values.len() => {
            Some(reader.read(time_signal)?.values().to_f64_vec())
        }
        _ => None,
    };
    let divisor = if timed.is_some() { MICROS_PER_SECOND } else { 1.0 };
    let timestamps = timed.unwrap_or_else(|| (0..values.len()).map(|i| i as f64).collect());

    let (start, end) = match section {
        Some(section) => section.resolve(timestamps.first().copied().unwrap_or(0.0)),
        None => (f64::NEG_INFINITY, f64::INFINITY),
    };

    let mut series = TimeSeries::with_capacity(values.len());
    for (ts, val) in timestamps.into_iter().zip(values) {
        if ts >= start && ts <= end {
            series.timestamps.push(ts / divisor);
            series.values.push(val);
        }
    }
    Ok(series)
}

pub async fn handle_ws_fetch<R>(
    mut socket: WebSocket,
    reader: Arc<BsigReader<R>>,
    source: SignalSource,
    time_signal: String,
    section: Option<Section>,
) where
    R: Read + Seek + Send + 'static,
{
    let header = source.header();
    info!("ws_fetch streaming started: {}", header);

    let loaded = tokio::task::spawn_blocking(move || {
        load_series(&reader, &source, &time_signal, section.as_ref())
    })
    .await;

    let series = match loaded {
        Ok(Ok(series)) => series,
        Ok(Err(e)) => {
            error!("reading {} failed: {}", header, e);
            return;
        }
        Err(e) => {
            error!("reader task for {} failed: {}", header, e);
            return;
        }
    };

    let mut seq: u64 = 0;
    for (timestamp, value) in series.timestamps.iter().zip(&series.values) {
        let payload = SignalPayload {
            timestamp: *timestamp,
            value: *value,
            desc: String::new(),
            seq,
            end_flag: false,
        };

        let json = match serde_json::to_string(&payload) {
            Ok(j) => j,
            Err(e) => {
                error!("json serialize error: {}", e);
                return;
            }
        };

        if let Err(e) = socket.send(Message::Text(json.into())).await {
            warn!("ws send failed: {}", e);
            return;
        }

        seq += 1;
    }

    let end_payload = SignalPayload {
        timestamp: 0.0,
        value: 0.0,
        desc: String::new(),
        seq,
        end_flag: true,
    };

    if let Ok(json) = serde_json::to_string(&end_payload) {
        let _ = socket.send(Message::Text(json.into())).await;
    }

    info!("ws_fetch finished: {} ({} samples)", header, seq);
}
