//! Flattening of streams into Polars DataFrames.
//!
//! Two layouts are provided:
//! - Samples: one row per sample (`variable`, `trace_id`, `timestamp`, `value`)
//! - Summary: one row per trace with identity, timing and calibration
//!
//! Timestamps are Int64 microseconds since the Unix epoch.

use crate::converter::Streams;
use crate::error::{MatWaveError, Result};
use crate::trace::Trace;
use polars::prelude::*;

/// Column builder for the long-format samples table.
pub struct SamplesFrameBuilder {
    variable: Vec<String>,
    trace_id: Vec<String>,
    timestamp: Vec<i64>,
    value: Vec<f64>,
}

impl SamplesFrameBuilder {
    /// Creates a new builder with pre-allocated capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            variable: Vec::with_capacity(capacity),
            trace_id: Vec::with_capacity(capacity),
            timestamp: Vec::with_capacity(capacity),
            value: Vec::with_capacity(capacity),
        }
    }

    /// Appends every sample of `trace`.
    pub fn push_trace(&mut self, variable: &str, trace: &Trace) {
        let id = trace.id();
        let start = trace.stats.starttime.timestamp_micros();
        let delta_us = trace.stats.delta() * 1e6;

        for (i, &sample) in trace.data.iter().enumerate() {
            self.variable.push(variable.to_string());
            self.trace_id.push(id.clone());
            let offset = (i as f64 * delta_us).round() as i64;
            self.timestamp.push(start.saturating_add(offset));
            self.value.push(sample);
        }
    }

    /// Returns the number of rows currently in the builder.
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// Returns true if the builder is empty.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Builds a Polars DataFrame from the accumulated rows.
    pub fn build(self) -> Result<DataFrame> {
        let columns: Vec<Column> = vec![
            Series::new("variable".into(), self.variable).into(),
            Series::new("trace_id".into(), self.trace_id).into(),
            Series::new("timestamp".into(), self.timestamp).into(),
            Series::new("value".into(), self.value).into(),
        ];
        DataFrame::new(columns).map_err(MatWaveError::PolarsError)
    }
}

/// Column builder for the one-row-per-trace summary table.
#[derive(Default)]
pub struct SummaryFrameBuilder {
    variable: Vec<String>,
    network: Vec<String>,
    station: Vec<String>,
    location: Vec<String>,
    channel: Vec<String>,
    sampling_rate: Vec<f64>,
    starttime: Vec<i64>,
    endtime: Vec<i64>,
    npts: Vec<i64>,
    calib: Vec<f64>,
}

impl SummaryFrameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_trace(&mut self, variable: &str, trace: &Trace) {
        let stats = &trace.stats;
        self.variable.push(variable.to_string());
        self.network.push(stats.network.clone());
        self.station.push(stats.station.clone());
        self.location.push(stats.location.clone());
        self.channel.push(stats.channel.clone());
        self.sampling_rate.push(stats.sampling_rate);
        self.starttime.push(stats.starttime.timestamp_micros());
        self.endtime.push(stats.endtime().timestamp_micros());
        self.npts.push(stats.npts as i64);
        self.calib.push(stats.calib);
    }

    pub fn len(&self) -> usize {
        self.variable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variable.is_empty()
    }

    pub fn build(self) -> Result<DataFrame> {
        let columns: Vec<Column> = vec![
            Series::new("variable".into(), self.variable).into(),
            Series::new("network".into(), self.network).into(),
            Series::new("station".into(), self.station).into(),
            Series::new("location".into(), self.location).into(),
            Series::new("channel".into(), self.channel).into(),
            Series::new("sampling_rate".into(), self.sampling_rate).into(),
            Series::new("starttime".into(), self.starttime).into(),
            Series::new("endtime".into(), self.endtime).into(),
            Series::new("npts".into(), self.npts).into(),
            Series::new("calib".into(), self.calib).into(),
        ];
        DataFrame::new(columns).map_err(MatWaveError::PolarsError)
    }
}

/// Flattens all streams into the long-format samples table.
pub fn samples_frame(streams: &Streams) -> Result<DataFrame> {
    let capacity = streams.values().map(|s| s.total_samples()).sum();
    let mut builder = SamplesFrameBuilder::new(capacity);

    for (variable, stream) in streams {
        for trace in stream {
            builder.push_trace(variable, trace);
        }
    }

    builder.build()
}

/// Builds the one-row-per-trace summary table.
pub fn summary_frame(streams: &Streams) -> Result<DataFrame> {
    let mut builder = SummaryFrameBuilder::new();

    for (variable, stream) in streams {
        for trace in stream {
            builder.push_trace(variable, trace);
        }
    }

    builder.build()
}
