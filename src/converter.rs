//! Conversion of loaded MAT variables into trace streams.
//!
//! This module implements the pipeline:
//! 1. Load: decode the requested top-level variables
//! 2. Classify: keep variables tagged with the waveform class name
//! 3. Map: turn every object element into a `WaveformRecord`
//! 4. Assemble: convert records to traces and group them per variable

use crate::config::ConvertOptions;
use crate::error::{MatWaveError, Result};
use crate::loader::{MatLoader, MatVariable};
use crate::trace::Stream;
use crate::value::MatValue;
use crate::waveform::WaveformRecord;
use std::collections::BTreeMap;

/// Streams keyed by the MATLAB variable they were loaded from.
pub type Streams = BTreeMap<String, Stream>;

/// Returns true if `value` carries the class-name tag `marker`.
///
/// Values without a class name are not waveforms.
pub fn is_waveform(value: &MatValue, marker: &str) -> bool {
    value.class_name() == Some(marker)
}

/// Converts MAT v5 data into streams of traces.
pub struct WaveformConverter;

impl WaveformConverter {
    /// Converts MAT data from a byte slice.
    pub fn from_bytes(data: &[u8], options: &ConvertOptions) -> Result<Streams> {
        let variables = MatLoader::load(data, options.variable_names.as_deref())?;
        Self::assemble(variables, options)
    }

    /// Keeps only the waveform-tagged variables.
    pub fn classify(variables: Vec<MatVariable>, marker: &str) -> Vec<MatVariable> {
        variables
            .into_iter()
            .filter(|var| {
                let keep = is_waveform(&var.value, marker);
                if !keep {
                    log::debug!(
                        "Variable '{}' is {}, not {}; skipped",
                        var.name,
                        var.value.type_name(),
                        marker
                    );
                }
                keep
            })
            .collect()
    }

    /// Maps every record of every waveform variable and groups the traces.
    pub fn assemble(variables: Vec<MatVariable>, options: &ConvertOptions) -> Result<Streams> {
        let mut streams = Streams::new();

        for var in Self::classify(variables, &options.class_marker) {
            let stream = Self::convert_variable(&var.value, options)?;
            log::debug!("Variable '{}': {} trace(s)", var.name, stream.len());
            streams.insert(var.name, stream);
        }

        Ok(streams)
    }

    /// Converts the records of one object array, in storage order.
    pub fn convert_variable(value: &MatValue, options: &ConvertOptions) -> Result<Stream> {
        let array = value.as_struct().ok_or_else(|| {
            MatWaveError::invalid_field("waveform", "expected a struct or object array")
        })?;

        array
            .records()
            .map(|record| WaveformRecord::from_record(record, options)?.into_trace())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{CellArray, StructArray};

    fn waveform_element(station: &str, n: usize) -> Vec<MatValue> {
        let scnl = MatValue::Struct(StructArray {
            class_name: Some("scnlobject".to_string()),
            dims: vec![1, 1],
            field_names: ["network", "station", "location", "channel"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            elements: vec![vec![
                MatValue::text("AV"),
                MatValue::text(station),
                MatValue::text("--"),
                MatValue::text("EHZ"),
            ]],
        });
        let data = MatValue::Numeric(crate::value::NumericArray {
            class: crate::value::MatClass::Double,
            dims: vec![n, 1],
            real: std::sync::Arc::from(vec![0.0; n]),
            imag: None,
        });
        vec![
            scnl,
            MatValue::scalar(100.0),
            MatValue::scalar(732000.25),
            data,
            MatValue::text("counts"),
            MatValue::Cell(CellArray {
                dims: vec![1, 1],
                elements: vec![MatValue::text("CALIB")],
            }),
            MatValue::Cell(CellArray {
                dims: vec![1, 1],
                elements: vec![MatValue::scalar(2.0)],
            }),
        ]
    }

    fn waveform_array(stations: &[&str]) -> MatValue {
        MatValue::Struct(StructArray {
            class_name: Some("waveform".to_string()),
            dims: vec![1, stations.len()],
            field_names: [
                "scnl",
                "Fs",
                "start",
                "data",
                "units",
                "misc_fields",
                "misc_values",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            elements: stations
                .iter()
                .enumerate()
                .map(|(i, s)| waveform_element(s, 10 + i))
                .collect(),
        })
    }

    #[test]
    fn test_is_waveform() {
        assert!(is_waveform(&waveform_array(&["A"]), "waveform"));
        assert!(!is_waveform(&waveform_array(&["A"]), "spectralobject"));
        assert!(!is_waveform(&MatValue::scalar(1.0), "waveform"));
    }

    #[test]
    fn test_assemble_filters_and_orders() {
        let variables = vec![
            MatVariable {
                name: "w".to_string(),
                value: waveform_array(&["OKCF", "OKID", "OKRE"]),
            },
            MatVariable {
                name: "junk".to_string(),
                value: MatValue::text("not a waveform"),
            },
        ];

        let streams = WaveformConverter::assemble(variables, &ConvertOptions::default()).unwrap();
        assert_eq!(streams.len(), 1);

        let stream = &streams["w"];
        let stations: Vec<&str> = stream.iter().map(|t| t.stats.station.as_str()).collect();
        assert_eq!(stations, vec!["OKCF", "OKID", "OKRE"]);
        assert_eq!(stream[2].stats.npts, 12);
        assert_eq!(stream[0].stats.calib, 2.0);
        assert!(stream[0].stats.extra.is_empty());
    }

    #[test]
    fn test_custom_marker() {
        let variables = vec![MatVariable {
            name: "w".to_string(),
            value: waveform_array(&["OKCF"]),
        }];
        let options = ConvertOptions::default().with_class_marker("other");
        assert!(WaveformConverter::assemble(variables, &options)
            .unwrap()
            .is_empty());
    }
}
