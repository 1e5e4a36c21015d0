//! MAT-file level 5 binary format reader.
//!
//! This module provides low-level parsing of MAT v5 data, including:
//! - File header validation and endianness detection
//! - Data element tag decoding (regular and small-element forms)
//! - Top-level variable iteration, inflating `miCOMPRESSED` elements
//! - Numeric payload decoding for every on-disk storage type

use crate::error::{MatWaveError, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use flate2::read::ZlibDecoder;
use std::borrow::Cow;
use std::io::{Cursor, Read};

/// Size of the fixed MAT v5 file header.
pub const HEADER_LEN: usize = 128;

const TEXT_LEN: usize = 116;
const VERSION_5: u16 = 0x0100;
const VERSION_73: u16 = 0x0200;

/// Byte order of a MAT file, taken from the header's endian indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            Endian::Little => LittleEndian::read_u16(bytes),
            Endian::Big => BigEndian::read_u16(bytes),
        }
    }

    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            Endian::Little => LittleEndian::read_u32(bytes),
            Endian::Big => BigEndian::read_u32(bytes),
        }
    }
}

/// Storage types that can appear in a data element tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Single,
    Double,
    Int64,
    UInt64,
    Matrix,
    Compressed,
    Utf8,
    Utf16,
    Utf32,
}

impl DataType {
    /// Maps an `mi*` type code to a DataType.
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            1 => Ok(DataType::Int8),
            2 => Ok(DataType::UInt8),
            3 => Ok(DataType::Int16),
            4 => Ok(DataType::UInt16),
            5 => Ok(DataType::Int32),
            6 => Ok(DataType::UInt32),
            7 => Ok(DataType::Single),
            9 => Ok(DataType::Double),
            12 => Ok(DataType::Int64),
            13 => Ok(DataType::UInt64),
            14 => Ok(DataType::Matrix),
            15 => Ok(DataType::Compressed),
            16 => Ok(DataType::Utf8),
            17 => Ok(DataType::Utf16),
            18 => Ok(DataType::Utf32),
            other => Err(MatWaveError::ParseError(format!(
                "Unknown data element type {}",
                other
            ))),
        }
    }

    /// Size in bytes of one value of this type. Container types report 1.
    pub fn element_size(self) -> usize {
        match self {
            DataType::Int8 | DataType::UInt8 | DataType::Utf8 => 1,
            DataType::Int16 | DataType::UInt16 | DataType::Utf16 => 2,
            DataType::Int32 | DataType::UInt32 | DataType::Single | DataType::Utf32 => 4,
            DataType::Double | DataType::Int64 | DataType::UInt64 => 8,
            DataType::Matrix | DataType::Compressed => 1,
        }
    }
}

/// A single data element: its storage type and payload bytes.
#[derive(Debug, Clone)]
pub struct DataElement<'a> {
    pub data_type: DataType,
    pub data: &'a [u8],
}

impl<'a> DataElement<'a> {
    /// Decodes a numeric payload into `f64` values, whatever the storage type.
    pub fn to_f64_vec(&self, endian: Endian) -> Result<Vec<f64>> {
        match endian {
            Endian::Little => decode_f64::<LittleEndian>(self.data_type, self.data),
            Endian::Big => decode_f64::<BigEndian>(self.data_type, self.data),
        }
    }

    /// Decodes an integer payload (dimensions, indices, field name length).
    pub fn to_i64_vec(&self, endian: Endian) -> Result<Vec<i64>> {
        let values = self.to_f64_vec(endian)?;
        Ok(values.into_iter().map(|v| v as i64).collect())
    }

    /// Decodes a `u32` payload; used for array flags.
    pub fn to_u32_vec(&self, endian: Endian) -> Result<Vec<u32>> {
        if self.data_type != DataType::UInt32 {
            return Err(MatWaveError::ParseError(format!(
                "Expected miUINT32 element, got {:?}",
                self.data_type
            )));
        }
        Ok(self
            .data
            .chunks_exact(4)
            .map(|chunk| endian.read_u32(chunk))
            .collect())
    }

    /// Decodes a text payload into characters, in storage order.
    pub fn to_chars(&self, endian: Endian) -> Result<Vec<char>> {
        match self.data_type {
            DataType::Utf8 => Ok(String::from_utf8_lossy(self.data).chars().collect()),
            // 8-bit char data is Latin-1
            DataType::Int8 | DataType::UInt8 => Ok(self.data.iter().map(|&b| b as char).collect()),
            DataType::UInt16 | DataType::Utf16 | DataType::Int16 => {
                let units: Vec<u16> = self
                    .data
                    .chunks_exact(2)
                    .map(|chunk| endian.read_u16(chunk))
                    .collect();
                Ok(char::decode_utf16(units)
                    .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                    .collect())
            }
            DataType::Utf32 | DataType::UInt32 | DataType::Int32 => Ok(self
                .data
                .chunks_exact(4)
                .map(|chunk| {
                    char::from_u32(endian.read_u32(chunk)).unwrap_or(char::REPLACEMENT_CHARACTER)
                })
                .collect()),
            other => Err(MatWaveError::ParseError(format!(
                "Element of type {:?} cannot hold character data",
                other
            ))),
        }
    }

    /// Decodes a NUL-padded 8-bit name (array names, class names).
    pub fn to_name(&self) -> String {
        let end = self
            .data
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.data.len());
        String::from_utf8_lossy(&self.data[..end]).to_string()
    }
}

fn decode_f64<B: ByteOrder>(data_type: DataType, bytes: &[u8]) -> Result<Vec<f64>> {
    let size = data_type.element_size();
    if matches!(data_type, DataType::Matrix | DataType::Compressed) {
        return Err(MatWaveError::ParseError(format!(
            "Element of type {:?} is not numeric",
            data_type
        )));
    }
    if bytes.len() % size != 0 {
        return Err(MatWaveError::ParseError(format!(
            "Invalid {:?} payload size: {} is not a multiple of {}",
            data_type,
            bytes.len(),
            size
        )));
    }

    let count = bytes.len() / size;
    let mut result = Vec::with_capacity(count);
    let mut cursor = Cursor::new(bytes);

    for _ in 0..count {
        let value = match data_type {
            DataType::Int8 => cursor.read_i8()? as f64,
            DataType::UInt8 | DataType::Utf8 => cursor.read_u8()? as f64,
            DataType::Int16 => cursor.read_i16::<B>()? as f64,
            DataType::UInt16 | DataType::Utf16 => cursor.read_u16::<B>()? as f64,
            DataType::Int32 => cursor.read_i32::<B>()? as f64,
            DataType::UInt32 | DataType::Utf32 => cursor.read_u32::<B>()? as f64,
            DataType::Single => cursor.read_f32::<B>()? as f64,
            DataType::Double => cursor.read_f64::<B>()?,
            DataType::Int64 => cursor.read_i64::<B>()? as f64,
            DataType::UInt64 => cursor.read_u64::<B>()? as f64,
            DataType::Matrix | DataType::Compressed => unreachable!(),
        };
        result.push(value);
    }

    Ok(result)
}

/// Sequential reader over the data elements packed in a byte slice.
pub struct ElementReader<'a> {
    data: &'a [u8],
    pos: usize,
    endian: Endian,
}

impl<'a> ElementReader<'a> {
    pub fn new(data: &'a [u8], endian: Endian) -> Self {
        Self {
            data,
            pos: 0,
            endian,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Returns true when no further element tag fits in the remaining bytes.
    pub fn is_exhausted(&self) -> bool {
        self.data.len() < self.pos + 8
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Reads the next data element, or `None` at the end of the buffer.
    pub fn next_element(&mut self) -> Result<Option<DataElement<'a>>> {
        if self.is_exhausted() {
            return Ok(None);
        }

        let first = self.endian.read_u32(&self.data[self.pos..self.pos + 4]);

        // Small data element: byte count in the upper 16 bits, payload in the tag
        if first >> 16 != 0 {
            let data_type = DataType::from_code(first & 0xffff)?;
            let size = (first >> 16) as usize;
            if size > 4 {
                return Err(MatWaveError::ParseError(format!(
                    "Small data element claims {} bytes",
                    size
                )));
            }
            let data = &self.data[self.pos + 4..self.pos + 4 + size];
            self.pos += 8;
            return Ok(Some(DataElement { data_type, data }));
        }

        let data_type = DataType::from_code(first)?;
        let size = self.endian.read_u32(&self.data[self.pos + 4..self.pos + 8]) as usize;
        let start = self.pos + 8;
        let end = start + size;

        if end > self.data.len() {
            return Err(MatWaveError::ParseError(format!(
                "Truncated {:?} element: needs {} bytes, {} available",
                data_type,
                size,
                self.data.len() - start
            )));
        }

        // Compressed elements are not padded to the 8-byte boundary
        self.pos = if data_type == DataType::Compressed {
            end
        } else {
            end + padding(size)
        };

        Ok(Some(DataElement {
            data_type,
            data: &self.data[start..end],
        }))
    }

    /// Reads the next element, failing if the buffer is exhausted.
    pub fn expect_element(&mut self, what: &str) -> Result<DataElement<'a>> {
        self.next_element()?
            .ok_or_else(|| MatWaveError::ParseError(format!("Missing {} element", what)))
    }
}

fn padding(size: usize) -> usize {
    (8 - size % 8) % 8
}

/// Inflates a `miCOMPRESSED` payload and returns the enclosed `miMATRIX` body.
pub fn inflate_matrix(compressed: &[u8], endian: Endian) -> Result<Vec<u8>> {
    let mut inflated = Vec::with_capacity(compressed.len() * 4);
    ZlibDecoder::new(compressed)
        .read_to_end(&mut inflated)
        .map_err(|e| MatWaveError::Decompress(e.to_string()))?;

    let mut reader = ElementReader::new(&inflated, endian);
    let element = reader.expect_element("compressed matrix")?;
    if element.data_type != DataType::Matrix {
        return Err(MatWaveError::ParseError(format!(
            "Compressed element holds {:?}, expected miMATRIX",
            element.data_type
        )));
    }
    let body_len = element.data.len();

    inflated.truncate(8 + body_len);
    inflated.drain(..8);
    Ok(inflated)
}

/// MAT v5 file reader.
pub struct MatFileReader<'a> {
    pub(crate) data: &'a [u8],
}

impl<'a> MatFileReader<'a> {
    /// Creates a new MatFileReader from a byte slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Gets the byte order announced by the endian indicator.
    pub fn endian(&self) -> Option<Endian> {
        if self.data.len() < HEADER_LEN {
            return None;
        }
        match &self.data[126..128] {
            b"IM" => Some(Endian::Little),
            b"MI" => Some(Endian::Big),
            _ => None,
        }
    }

    /// Gets the MAT-file version word.
    pub fn version(&self) -> u16 {
        match self.endian() {
            Some(endian) => endian.read_u16(&self.data[124..126]),
            None => 0,
        }
    }

    /// Gets the descriptive header text, trimmed of padding.
    pub fn header_text(&self) -> String {
        if self.data.len() < HEADER_LEN {
            return String::new();
        }
        String::from_utf8_lossy(&self.data[..TEXT_LEN])
            .trim_end_matches(|c: char| c == ' ' || c == '\0')
            .to_string()
    }

    /// Returns true if the header announces an HDF5-based MAT 7.3 file.
    pub fn is_v73(&self) -> bool {
        self.version() == VERSION_73 || self.header_text().starts_with("MATLAB 7.3")
    }

    /// Returns true if the data appears to be a MAT v5 file.
    pub fn is_valid(&self) -> bool {
        self.endian().is_some() && self.version() == VERSION_5
    }

    /// Checks the header, distinguishing unsupported files from garbage.
    pub fn validate(&self) -> Result<Endian> {
        if self.data.len() < HEADER_LEN {
            return Err(MatWaveError::InvalidFormat(format!(
                "File is {} bytes, shorter than the {}-byte header",
                self.data.len(),
                HEADER_LEN
            )));
        }
        if self.is_v73() {
            return Err(MatWaveError::Unsupported(
                "MAT 7.3 (HDF5) files are not supported".to_string(),
            ));
        }
        match self.endian() {
            Some(endian) if self.is_valid() => Ok(endian),
            Some(_) => Err(MatWaveError::InvalidFormat(format!(
                "Unsupported MAT-file version 0x{:04x}",
                self.version()
            ))),
            None => Err(MatWaveError::InvalidFormat(
                "Missing MAT v5 endian indicator".to_string(),
            )),
        }
    }

    /// Returns an iterator over the `miMATRIX` bodies of all top-level variables.
    pub fn variables(&self) -> Result<VariableIterator<'a>> {
        let endian = self.validate()?;
        Ok(VariableIterator {
            elements: ElementReader {
                data: self.data,
                pos: HEADER_LEN,
                endian,
            },
        })
    }
}

/// Iterator over top-level variable bodies, inflated when compressed.
pub struct VariableIterator<'a> {
    elements: ElementReader<'a>,
}

impl<'a> VariableIterator<'a> {
    pub fn endian(&self) -> Endian {
        self.elements.endian()
    }
}

impl<'a> Iterator for VariableIterator<'a> {
    type Item = Result<Cow<'a, [u8]>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let element = match self.elements.next_element() {
                Ok(Some(element)) => element,
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            };

            match element.data_type {
                DataType::Matrix => return Some(Ok(Cow::Borrowed(element.data))),
                DataType::Compressed => {
                    return Some(
                        inflate_matrix(element.data, self.elements.endian()).map(Cow::Owned),
                    )
                }
                other => {
                    log::debug!("Skipping top-level {:?} element", other);
                }
            }
        }
    }
}
