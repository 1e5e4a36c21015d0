//! Field mapping from MATLAB waveform objects to `WaveformRecord`s.
//!
//! A waveform-suite `waveform` object element carries:
//!
//! | MATLAB field | Record field |
//! |--------------|--------------|
//! | `scnl.network`, `scnl.station`, `scnl.location`, `scnl.channel` | identity strings |
//! | `Fs` | `sampling_rate` |
//! | `start` | `start_time` (fractional day ordinal) |
//! | `data` | `samples` (shared, not copied) |
//! | `units` | `units` |
//! | `misc_fields` / `misc_values` | `extra_fields` (paired positionally) |

use crate::config::{ConvertOptions, OrdinalEpoch};
use crate::error::{MatWaveError, Result};
use crate::value::{MatValue, Record};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

const MICROS_PER_DAY: f64 = 86_400_000_000.0;

/// Day number of 9999-12-31, the last representable calendar day.
const MAX_ORDINAL: i64 = 3_652_059;

/// Value of an extra (`misc_fields`) entry.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    Numbers(Vec<f64>),
    /// Anything that is not a string, real scalar or real vector.
    Other(MatValue),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Interprets a yes/no/true/false string (any case) as a boolean.
    ///
    /// Non-text values never match.
    pub fn flag(&self) -> Option<bool> {
        let FieldValue::Text(text) = self else {
            return None;
        };
        match text.to_lowercase().as_str() {
            "yes" | "true" => Some(true),
            "no" | "false" => Some(false),
            _ => None,
        }
    }
}

impl From<&MatValue> for FieldValue {
    fn from(value: &MatValue) -> Self {
        if let Some(text) = value.as_str() {
            return FieldValue::Text(text.to_string());
        }
        if let Some(flag) = value.as_bool() {
            return FieldValue::Boolean(flag);
        }
        match value {
            MatValue::Numeric(a) if a.imag.is_none() && a.real.len() == 1 => {
                FieldValue::Number(a.real[0])
            }
            MatValue::Numeric(a) if a.imag.is_none() && value.squeezed_dims().len() <= 1 => {
                FieldValue::Numbers(a.real.to_vec())
            }
            other => FieldValue::Other(other.clone()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{}", s),
            FieldValue::Number(v) => write!(f, "{}", v),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Numbers(vs) => {
                let parts: Vec<String> = vs.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            FieldValue::Other(v) => write!(f, "{}", v),
        }
    }
}

/// Replaces yes/no/true/false strings with booleans, leaving everything else untouched.
pub fn normalize_flags(fields: &mut BTreeMap<String, FieldValue>) {
    for value in fields.values_mut() {
        if let Some(flag) = value.flag() {
            *value = FieldValue::Boolean(flag);
        }
    }
}

/// Pairs field names with values positionally.
///
/// Pairing stops at the shorter sequence; later duplicates of a name win.
pub fn pair_fields(names: &MatValue, values: &MatValue) -> BTreeMap<String, FieldValue> {
    let names = names.sequence();
    let values = values.sequence();

    if names.len() != values.len() {
        log::warn!(
            "misc_fields has {} names but misc_values has {} values; extra entries are dropped",
            names.len(),
            values.len()
        );
    }

    names
        .into_iter()
        .zip(values)
        .map(|(name, value)| (name.to_text(), FieldValue::from(value)))
        .collect()
}

/// Converts a fractional day ordinal into a UTC timestamp.
///
/// The integer part (truncated toward zero) selects the calendar day and the
/// remainder is added as a fraction of a day, rounded to the microsecond.
/// Days before 0001-01-01 or after 9999-12-31 are rejected.
pub fn ordinal_to_datetime(start: f64, epoch: OrdinalEpoch) -> Result<DateTime<Utc>> {
    if !start.is_finite() {
        return Err(MatWaveError::StartTime(start));
    }

    let ordinal = start.trunc();
    if ordinal < 1.0 || ordinal > i32::MAX as f64 {
        return Err(MatWaveError::StartTime(start));
    }
    let fraction = start - ordinal;
    let day = ordinal as i64 - epoch.offset_days();
    if !(1..=MAX_ORDINAL).contains(&day) {
        return Err(MatWaveError::StartTime(start));
    }

    let midnight = i32::try_from(day)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or(MatWaveError::StartTime(start))?;

    let offset = Duration::microseconds((fraction * MICROS_PER_DAY).round() as i64);
    let naive = midnight
        .checked_add_signed(offset)
        .ok_or(MatWaveError::StartTime(start))?;

    Ok(Utc.from_utc_datetime(&naive))
}

/// One continuous series of samples from a single channel.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformRecord {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub sampling_rate: f64,
    pub start_time: DateTime<Utc>,
    pub samples: Arc<[f64]>,
    pub units: String,
    pub extra_fields: BTreeMap<String, FieldValue>,
    pub version: u32,
    pub history: Vec<String>,
}

impl Default for WaveformRecord {
    fn default() -> Self {
        Self {
            network: String::new(),
            station: String::new(),
            location: String::new(),
            channel: String::new(),
            sampling_rate: 0.0,
            start_time: Utc::now(),
            samples: Arc::from(Vec::new()),
            units: "unknown".to_string(),
            extra_fields: BTreeMap::new(),
            version: 0,
            history: Vec::new(),
        }
    }
}

/// Reads one `scnl` code as a string.
///
/// Numbers use their shortest display form, so a network stored as the
/// double `7` reads `"7"` rather than `"7.0"`.
fn identity(scnl: &Record, field: &str) -> Result<String> {
    let value = scnl
        .get(field)
        .ok_or_else(|| MatWaveError::MissingField(format!("scnl.{}", field)))?;
    if value.is_empty() {
        return Ok(String::new());
    }
    Ok(value.to_text())
}

impl WaveformRecord {
    /// Maps one waveform object element.
    pub fn from_record(record: Record, options: &ConvertOptions) -> Result<Self> {
        let scnl = record
            .require("scnl")?
            .as_record()
            .ok_or_else(|| MatWaveError::invalid_field("scnl", "expected a 1x1 struct or object"))?;

        let sampling_rate = record
            .require("Fs")?
            .as_f64()
            .ok_or_else(|| MatWaveError::invalid_field("Fs", "expected a numeric scalar"))?;
        if !sampling_rate.is_finite() || sampling_rate <= 0.0 {
            return Err(MatWaveError::invalid_field(
                "Fs",
                format!("sampling rate must be positive, got {}", sampling_rate),
            ));
        }

        let start = record
            .require("start")?
            .as_f64()
            .ok_or_else(|| MatWaveError::invalid_field("start", "expected a numeric scalar"))?;

        let samples = record
            .require("data")?
            .samples()
            .ok_or_else(|| MatWaveError::invalid_field("data", "expected a numeric array"))?;

        let units = record.require("units")?;
        let units = if units.is_empty() {
            String::new()
        } else {
            units.to_text()
        };

        let mut extra_fields = match (record.get("misc_fields"), record.get("misc_values")) {
            (Some(names), Some(values)) => pair_fields(names, values),
            _ => BTreeMap::new(),
        };
        if options.normalize_flags {
            normalize_flags(&mut extra_fields);
        }

        Ok(Self {
            network: identity(&scnl, "network")?,
            station: identity(&scnl, "station")?,
            location: identity(&scnl, "location")?,
            channel: identity(&scnl, "channel")?,
            sampling_rate,
            start_time: ordinal_to_datetime(start, options.epoch)?,
            samples,
            units,
            extra_fields,
            version: 0,
            history: Vec::new(),
        })
    }

    /// Maps a 1x1 waveform object.
    pub fn from_value(value: &MatValue, options: &ConvertOptions) -> Result<Self> {
        let record = value.as_record().ok_or_else(|| {
            MatWaveError::invalid_field("waveform", "expected a 1x1 struct or object")
        })?;
        Self::from_record(record, options)
    }

    /// SEED-style `NET.STA.LOC.CHA` identifier.
    pub fn id(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

impl fmt::Display for WaveformRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "net: [{}], sta:[{}], loc:[{}], cha:[{}]",
            self.network, self.station, self.location, self.channel
        )?;
        writeln!(
            f,
            "starting: [{}]",
            self.start_time.format("%Y-%m-%d %H:%M:%S%.6f")
        )?;

        if self.samples.is_empty() {
            writeln!(f, "data: 0 samples")?;
        } else {
            let min = self.samples.iter().copied().fold(f64::INFINITY, f64::min);
            let max = self.samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            writeln!(
                f,
                "data: {} samples   ranging from [{:.6} to {:.6}]",
                self.samples.len(),
                min,
                max
            )?;
        }
        write!(f, "units: {}", self.units)?;

        if !self.extra_fields.is_empty() {
            write!(f, "\nwith miscellaneous fields:")?;
            for (name, value) in &self.extra_fields {
                write!(f, "\n  {}: {}", name, value)?;
            }
        }
        Ok(())
    }
}
