//! Conversion of MATLAB waveform-suite MAT files into seismic trace streams.
//!
//! This library reads MAT-file level 5 data, picks out the variables holding
//! MATLAB `waveform` objects, and converts every waveform into a [`Trace`]:
//! station identity, sampling rate, start time, samples and metadata. Traces
//! are grouped into one [`Stream`] per MATLAB variable.
//!
//! # Features
//!
//! - Native MAT v5 reader (compressed and uncompressed, both byte orders)
//! - All numeric classes materialized as `f64`; cell, struct, object, char,
//!   logical and sparse arrays decoded
//! - Memory-mapped file I/O for `from_file()`
//! - Sample buffers shared between the loaded file and the traces
//! - Export to Polars DataFrames
//!
//! # Example
//!
//! ```no_run
//! use matwave::{ConvertOptions, MatWaveParser};
//!
//! let options = ConvertOptions::default().with_variables(["rms_waveforms"]);
//! let streams = MatWaveParser::from_file("sample_envelope_waveforms.mat", &options)?;
//! println!("{}", streams["rms_waveforms"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Field Mapping
//!
//! | MATLAB field | Trace |
//! |--------------|-------|
//! | `scnl.network` / `station` / `location` / `channel` | `stats.network` ... |
//! | `Fs` | `stats.sampling_rate` |
//! | `start` | `stats.starttime` |
//! | `data` | `data`, `stats.npts` |
//! | `misc_fields` / `misc_values` | `stats.extra`, `CALIB` as `stats.calib` |
//!
//! Extra field values reading "yes"/"no"/"true"/"false" (any case) become
//! booleans unless [`ConvertOptions::with_normalize_flags`] disables it.

pub mod config;
pub mod converter;
pub mod error;
pub mod frame;
pub mod loader;
pub mod matfile;
pub mod trace;
pub mod value;
pub mod waveform;

pub use config::{ConvertOptions, OrdinalEpoch};
pub use converter::{Streams, WaveformConverter};
pub use error::{MatWaveError, Result};
pub use loader::{MatLoader, MatVariable, VariableInfo};
pub use polars::prelude::DataFrame;
pub use trace::{Stats, Stream, Trace};
pub use value::MatValue;
pub use waveform::{FieldValue, WaveformRecord};

use std::fs::File;
use std::path::Path;

/// Main entry point for converting MAT files.
pub struct MatWaveParser;

impl MatWaveParser {
    /// Converts MAT data held in memory into streams keyed by variable name.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use matwave::{ConvertOptions, MatWaveParser};
    ///
    /// let data = std::fs::read("waveforms.mat")?;
    /// let streams = MatWaveParser::from_bytes(&data, &ConvertOptions::default())?;
    /// for (name, stream) in &streams {
    ///     println!("{}: {} traces", name, stream.len());
    /// }
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_bytes(data: &[u8], options: &ConvertOptions) -> Result<Streams> {
        WaveformConverter::from_bytes(data, options)
    }

    /// Converts a MAT file from disk using memory mapping.
    ///
    /// Fails with [`MatWaveError::Io`] when the file cannot be opened and
    /// [`MatWaveError::InvalidFormat`] when it is not a MAT v5 file.
    pub fn from_file<P: AsRef<Path>>(path: P, options: &ConvertOptions) -> Result<Streams> {
        let file = File::open(path)?;
        let mmap = unsafe { memmap2::Mmap::map(&file)? };
        WaveformConverter::from_bytes(&mmap, options)
    }
}

/// Loads the waveform variables of a MAT file with default options.
///
/// `variable_names` restricts loading to the named variables; `None` loads
/// every variable and keeps the waveform-tagged ones.
pub fn load_mat_waveforms<P: AsRef<Path>>(
    path: P,
    variable_names: Option<&[&str]>,
) -> Result<Streams> {
    let mut options = ConvertOptions::default();
    if let Some(names) = variable_names {
        options = options.with_variables(names.iter().copied());
    }
    MatWaveParser::from_file(path, &options)
}

/// Lists the top-level variables of MAT data without converting them.
///
/// # Example
///
/// ```no_run
/// let data = std::fs::read("waveforms.mat")?;
/// for info in matwave::whosmat(&data)? {
///     println!("{} {} {}", info.name, info.size_string(), info.type_name());
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn whosmat(data: &[u8]) -> Result<Vec<VariableInfo>> {
    MatLoader::list(data)
}
