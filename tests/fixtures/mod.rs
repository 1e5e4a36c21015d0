//! Test fixtures for integration tests
//!
//! This module provides a small MAT v5 writer so tests can build files
//! in memory, plus builders for waveform-suite objects.

#![allow(dead_code)]

use flate2::write::ZlibEncoder;
use std::io::Write;

const MI_INT8: u32 = 1;
const MI_UINT8: u32 = 2;
const MI_INT16: u32 = 3;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_DOUBLE: u32 = 9;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;

const FLAG_LOGICAL: u32 = 0x0200;

/// A MATLAB value to encode.
#[derive(Debug, Clone)]
pub enum Value {
    Double { dims: Vec<usize>, data: Vec<f64> },
    Int16 { dims: Vec<usize>, data: Vec<i16> },
    Logical(bool),
    Char(String),
    Cell(Vec<Value>),
    Struct {
        class_name: Option<String>,
        fields: Vec<String>,
        elements: Vec<Vec<Value>>,
    },
    /// Array of an arbitrary class code with an opaque body.
    Raw { class: u32, body: Vec<u8> },
}

impl Value {
    pub fn scalar(v: f64) -> Self {
        Value::Double {
            dims: vec![1, 1],
            data: vec![v],
        }
    }

    pub fn column(data: Vec<f64>) -> Self {
        Value::Double {
            dims: vec![data.len(), 1],
            data,
        }
    }

    pub fn text(s: &str) -> Self {
        Value::Char(s.to_string())
    }

    pub fn cell(values: Vec<Value>) -> Self {
        Value::Cell(values)
    }

    pub fn object(class_name: &str, fields: &[&str], elements: Vec<Vec<Value>>) -> Self {
        Value::Struct {
            class_name: Some(class_name.to_string()),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            elements,
        }
    }

    pub fn plain_struct(fields: &[&str], values: Vec<Value>) -> Self {
        Value::Struct {
            class_name: None,
            fields: fields.iter().map(|f| f.to_string()).collect(),
            elements: vec![values],
        }
    }
}

/// In-memory MAT v5 file writer.
pub struct MatWriter {
    big_endian: bool,
    compress: bool,
    body: Vec<u8>,
}

impl MatWriter {
    pub fn new() -> Self {
        Self {
            big_endian: false,
            compress: false,
            body: Vec::new(),
        }
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn compressed(mut self) -> Self {
        self.compress = true;
        self
    }

    /// Appends a top-level variable.
    pub fn add(mut self, name: &str, value: &Value) -> Self {
        let matrix = self.matrix(name, value);
        let mut element = Vec::new();
        self.element(&mut element, MI_MATRIX, &matrix);

        if self.compress {
            let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&element).unwrap();
            let compressed = encoder.finish().unwrap();
            let tag = self.u32(MI_COMPRESSED);
            let size = self.u32(compressed.len() as u32);
            self.body.extend_from_slice(&tag);
            self.body.extend_from_slice(&size);
            self.body.extend_from_slice(&compressed);
        } else {
            self.body.extend_from_slice(&element);
        }
        self
    }

    /// Returns the complete file: header followed by all variables.
    pub fn build(&self) -> Vec<u8> {
        let mut data = vec![b' '; 116];
        let text = b"MATLAB 5.0 MAT-file, written by matwave tests";
        data[..text.len()].copy_from_slice(text);
        data.extend_from_slice(&[0; 8]);
        if self.big_endian {
            data.extend_from_slice(&0x0100u16.to_be_bytes());
            data.extend_from_slice(b"MI");
        } else {
            data.extend_from_slice(&0x0100u16.to_le_bytes());
            data.extend_from_slice(b"IM");
        }
        data.extend_from_slice(&self.body);
        data
    }

    fn u32(&self, v: u32) -> [u8; 4] {
        if self.big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    }

    fn i32(&self, v: i32) -> [u8; 4] {
        if self.big_endian {
            v.to_be_bytes()
        } else {
            v.to_le_bytes()
        }
    }

    fn element(&self, out: &mut Vec<u8>, data_type: u32, payload: &[u8]) {
        out.extend_from_slice(&self.u32(data_type));
        out.extend_from_slice(&self.u32(payload.len() as u32));
        out.extend_from_slice(payload);
        out.resize(out.len() + (8 - payload.len() % 8) % 8, 0);
    }

    fn header(&self, out: &mut Vec<u8>, class: u32, flags: u32, dims: &[usize], name: &str) {
        let mut flag_words = Vec::new();
        flag_words.extend_from_slice(&self.u32(class | flags));
        flag_words.extend_from_slice(&self.u32(0));
        self.element(out, MI_UINT32, &flag_words);

        let dims: Vec<u8> = dims.iter().flat_map(|&d| self.i32(d as i32)).collect();
        self.element(out, MI_INT32, &dims);
        self.element(out, MI_INT8, name.as_bytes());
    }

    fn matrix(&self, name: &str, value: &Value) -> Vec<u8> {
        let mut out = Vec::new();
        match value {
            Value::Double { dims, data } => {
                self.header(&mut out, 6, 0, dims, name);
                let bytes: Vec<u8> = data
                    .iter()
                    .flat_map(|v| {
                        if self.big_endian {
                            v.to_be_bytes()
                        } else {
                            v.to_le_bytes()
                        }
                    })
                    .collect();
                self.element(&mut out, MI_DOUBLE, &bytes);
            }
            Value::Int16 { dims, data } => {
                self.header(&mut out, 10, 0, dims, name);
                let bytes: Vec<u8> = data
                    .iter()
                    .flat_map(|v| {
                        if self.big_endian {
                            v.to_be_bytes()
                        } else {
                            v.to_le_bytes()
                        }
                    })
                    .collect();
                self.element(&mut out, MI_INT16, &bytes);
            }
            Value::Logical(flag) => {
                self.header(&mut out, 9, FLAG_LOGICAL, &[1, 1], name);
                self.element(&mut out, MI_UINT8, &[*flag as u8]);
            }
            Value::Char(text) => {
                let units: Vec<u16> = text.encode_utf16().collect();
                let dims = if units.is_empty() {
                    vec![0, 0]
                } else {
                    vec![1, units.len()]
                };
                self.header(&mut out, 4, 0, &dims, name);
                let bytes: Vec<u8> = units
                    .iter()
                    .flat_map(|u| {
                        if self.big_endian {
                            u.to_be_bytes()
                        } else {
                            u.to_le_bytes()
                        }
                    })
                    .collect();
                self.element(&mut out, MI_UINT16, &bytes);
            }
            Value::Cell(values) => {
                self.header(&mut out, 1, 0, &[1, values.len()], name);
                for v in values {
                    let inner = self.matrix("", v);
                    self.element(&mut out, MI_MATRIX, &inner);
                }
            }
            Value::Struct {
                class_name,
                fields,
                elements,
            } => {
                let class = if class_name.is_some() { 3 } else { 2 };
                self.header(&mut out, class, 0, &[1, elements.len()], name);
                if let Some(class_name) = class_name {
                    self.element(&mut out, MI_INT8, class_name.as_bytes());
                }

                let name_len = fields.iter().map(|f| f.len()).max().unwrap_or(0) + 1;
                self.element(&mut out, MI_INT32, &self.i32(name_len as i32));
                let mut names = Vec::new();
                for field in fields {
                    let mut padded = field.as_bytes().to_vec();
                    padded.resize(name_len, 0);
                    names.extend_from_slice(&padded);
                }
                self.element(&mut out, MI_INT8, &names);

                for element in elements {
                    for v in element {
                        let inner = self.matrix("", v);
                        self.element(&mut out, MI_MATRIX, &inner);
                    }
                }
            }
            Value::Raw { class, body } => {
                self.header(&mut out, *class, 0, &[1, 1], name);
                self.element(&mut out, MI_UINT8, body);
            }
        }
        out
    }
}

pub const WAVEFORM_FIELDS: [&str; 9] = [
    "scnl",
    "Fs",
    "start",
    "data",
    "units",
    "version",
    "misc_fields",
    "misc_values",
    "history",
];

/// Builds a `scnlobject` with the given codes.
pub fn scnl(network: Value, station: &str, location: &str, channel: &str) -> Value {
    Value::object(
        "scnlobject",
        &["station", "channel", "network", "location"],
        vec![vec![
            Value::text(station),
            Value::text(channel),
            network,
            Value::text(location),
        ]],
    )
}

/// Description of one waveform object element.
#[derive(Debug, Clone)]
pub struct WaveformSpec {
    pub network: Value,
    pub station: String,
    pub fs: f64,
    pub start: f64,
    pub data: Vec<f64>,
    pub misc: Vec<(String, Value)>,
    /// Extra names without values, to exercise length mismatches.
    pub dangling_names: Vec<String>,
}

impl WaveformSpec {
    pub fn new(station: &str, npts: usize) -> Self {
        Self {
            network: Value::text("--"),
            station: station.to_string(),
            fs: 0.1,
            start: 731744.000000116,
            data: (0..npts).map(|i| i as f64 * 0.5).collect(),
            misc: Vec::new(),
            dangling_names: Vec::new(),
        }
    }

    pub fn misc(mut self, name: &str, value: Value) -> Self {
        self.misc.push((name.to_string(), value));
        self
    }

    pub fn element(&self) -> Vec<Value> {
        let mut names: Vec<Value> = self.misc.iter().map(|(n, _)| Value::text(n)).collect();
        names.extend(self.dangling_names.iter().map(|n| Value::text(n)));
        let values: Vec<Value> = self.misc.iter().map(|(_, v)| v.clone()).collect();

        vec![
            scnl(self.network.clone(), &self.station, "--", "SHZ"),
            Value::scalar(self.fs),
            Value::scalar(self.start),
            Value::column(self.data.clone()),
            Value::text("counts"),
            Value::scalar(1.0),
            Value::cell(names),
            Value::cell(values),
            Value::cell(Vec::new()),
        ]
    }
}

/// Builds a 1xN `waveform` object array.
pub fn waveform_array(specs: &[WaveformSpec]) -> Value {
    Value::object(
        "waveform",
        &WAVEFORM_FIELDS,
        specs.iter().map(WaveformSpec::element).collect(),
    )
}

/// Station codes of the sample envelope file used in the scenarios.
pub const RMS_STATIONS: [&str; 7] = ["OKCF", "OKID", "OKRE", "OKSP", "OKTU", "OKWE", "OKWR"];

/// Seven waveforms like the `rms_waveforms` variable of the sample envelope file.
pub fn rms_waveform_specs() -> Vec<WaveformSpec> {
    RMS_STATIONS
        .iter()
        .enumerate()
        .map(|(i, station)| {
            let npts = if *station == "OKID" { 432 } else { 864 - i };
            let mut spec = WaveformSpec::new(station, npts);
            spec.start += i as f64 * 0.25;
            spec
        })
        .collect()
}

/// A file mixing `rms_waveforms` with variables of other types.
pub fn mixed_file(writer: MatWriter) -> Vec<u8> {
    writer
        .add("rms_waveforms", &waveform_array(&rms_waveform_specs()))
        .add(
            "matrix",
            &Value::Double {
                dims: vec![2, 2],
                data: vec![1.0, 2.0, 3.0, 4.0],
            },
        )
        .add(
            "settings",
            &Value::plain_struct(&["name", "enabled"], vec![Value::text("x"), Value::Logical(true)]),
        )
        .add(
            "spectra",
            &Value::object("spectralobject", &["nfft"], vec![vec![Value::scalar(1024.0)]]),
        )
        .build()
}
