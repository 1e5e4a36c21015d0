//! Seismic time-series containers.
//!
//! This module provides:
//! - `Stats`: channel metadata header (identity, timing, calibration, extra fields)
//! - `Trace`: one header plus its sample buffer
//! - `Stream`: an ordered collection of traces

use crate::error::{MatWaveError, Result};
use crate::waveform::{FieldValue, WaveformRecord};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

/// Reserved extra field holding the calibration factor.
pub const CALIB_FIELD: &str = "CALIB";

/// Metadata header of a trace.
#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub sampling_rate: f64,
    pub starttime: DateTime<Utc>,
    pub npts: usize,
    /// Scale factor converting raw samples to physical units.
    pub calib: f64,
    pub extra: BTreeMap<String, FieldValue>,
}

impl Stats {
    /// SEED-style `NET.STA.LOC.CHA` identifier.
    pub fn id(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }

    /// Sample spacing in seconds.
    pub fn delta(&self) -> f64 {
        if self.sampling_rate > 0.0 {
            1.0 / self.sampling_rate
        } else {
            0.0
        }
    }

    /// Offset of sample `index` from the start time, rounded to the microsecond.
    pub fn offset_of(&self, index: usize) -> Duration {
        Duration::microseconds((index as f64 * self.delta() * 1e6).round() as i64)
    }

    /// Time of sample `index`, or `None` past the end of the calendar.
    pub fn time_at(&self, index: usize) -> Option<DateTime<Utc>> {
        self.starttime.checked_add_signed(self.offset_of(index))
    }

    /// Time of the last sample; equals the start time for empty traces.
    ///
    /// Saturates at the latest representable timestamp.
    pub fn endtime(&self) -> DateTime<Utc> {
        self.time_at(self.npts.saturating_sub(1))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// One channel's samples with their metadata header.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub stats: Stats,
    pub data: Arc<[f64]>,
}

impl Trace {
    pub fn id(&self) -> String {
        self.stats.id()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Samples scaled by the calibration factor.
    pub fn calibrated(&self) -> Vec<f64> {
        self.data.iter().map(|v| v * self.stats.calib).collect()
    }

    /// Timestamps of every sample, stopping at the end of the calendar.
    pub fn times(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        (0..self.data.len()).map_while(move |i| self.stats.time_at(i))
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} - {} | {:.1} Hz, {} samples",
            self.id(),
            format_time(&self.stats.starttime),
            format_time(&self.stats.endtime()),
            self.stats.sampling_rate,
            self.stats.npts
        )
    }
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

fn calib_value(value: &FieldValue) -> Result<f64> {
    match value {
        FieldValue::Number(v) => Ok(*v),
        FieldValue::Text(text) => text.trim().parse::<f64>().map_err(|_| {
            MatWaveError::invalid_field(CALIB_FIELD, format!("'{}' is not a number", text))
        }),
        other => Err(MatWaveError::invalid_field(
            CALIB_FIELD,
            format!("expected a number, got {}", other),
        )),
    }
}

impl WaveformRecord {
    /// Converts the record into a trace.
    ///
    /// A `CALIB` extra field becomes the trace's calibration factor instead of
    /// generic metadata.
    pub fn into_trace(self) -> Result<Trace> {
        let mut extra = self.extra_fields;
        let calib = match extra.remove(CALIB_FIELD) {
            Some(value) => calib_value(&value)?,
            None => 1.0,
        };

        let stats = Stats {
            network: self.network,
            station: self.station,
            location: self.location,
            channel: self.channel,
            sampling_rate: self.sampling_rate,
            starttime: self.start_time,
            npts: self.samples.len(),
            calib,
            extra,
        };

        Ok(Trace {
            stats,
            data: self.samples,
        })
    }
}

/// Ordered collection of traces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stream {
    traces: Vec<Trace>,
}

impl Stream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, trace: Trace) {
        self.traces.push(trace);
    }

    pub fn traces(&self) -> &[Trace] {
        &self.traces
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trace> {
        self.traces.iter()
    }

    /// Total number of samples across all traces.
    pub fn total_samples(&self) -> usize {
        self.traces.iter().map(Trace::len).sum()
    }

    /// Traces whose id matches `id` exactly.
    pub fn select(&self, id: &str) -> impl Iterator<Item = &Trace> + '_ {
        let id = id.to_string();
        self.traces.iter().filter(move |t| t.id() == id)
    }
}

impl FromIterator<Trace> for Stream {
    fn from_iter<I: IntoIterator<Item = Trace>>(iter: I) -> Self {
        Self {
            traces: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Stream {
    type Item = Trace;
    type IntoIter = std::vec::IntoIter<Trace>;

    fn into_iter(self) -> Self::IntoIter {
        self.traces.into_iter()
    }
}

impl<'a> IntoIterator for &'a Stream {
    type Item = &'a Trace;
    type IntoIter = std::slice::Iter<'a, Trace>;

    fn into_iter(self) -> Self::IntoIter {
        self.traces.iter()
    }
}

impl Index<usize> for Stream {
    type Output = Trace;

    fn index(&self, index: usize) -> &Trace {
        &self.traces[index]
    }
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Trace(s) in Stream:", self.traces.len())?;
        for trace in &self.traces {
            write!(f, "\n{}", trace)?;
        }
        Ok(())
    }
}
