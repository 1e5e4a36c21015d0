//! In-memory representation of MATLAB arrays.
//!
//! This module provides:
//! - `MatClass`: the MATLAB array class carried in the array flags
//! - `MatValue`: a decoded array of any supported class
//! - `Record`: a borrowed view of one struct/object element
//!
//! Arrays keep their MATLAB dimensions. Singleton dimensions are squeezed
//! by the accessors: a one-element array reads as a scalar, a single-row
//! char array reads as a string, a 1x1 struct reads as a record.

use crate::error::{MatWaveError, Result};
use std::fmt;
use std::sync::Arc;

/// MATLAB array classes (`mx*_CLASS`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatClass {
    Cell,
    Struct,
    Object,
    Char,
    Sparse,
    Double,
    Single,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Function,
    Opaque,
}

impl MatClass {
    /// Maps an array class code from the array flags to a MatClass.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            1 => Ok(MatClass::Cell),
            2 => Ok(MatClass::Struct),
            3 => Ok(MatClass::Object),
            4 => Ok(MatClass::Char),
            5 => Ok(MatClass::Sparse),
            6 => Ok(MatClass::Double),
            7 => Ok(MatClass::Single),
            8 => Ok(MatClass::Int8),
            9 => Ok(MatClass::UInt8),
            10 => Ok(MatClass::Int16),
            11 => Ok(MatClass::UInt16),
            12 => Ok(MatClass::Int32),
            13 => Ok(MatClass::UInt32),
            14 => Ok(MatClass::Int64),
            15 => Ok(MatClass::UInt64),
            16 => Ok(MatClass::Function),
            17 => Ok(MatClass::Opaque),
            other => Err(MatWaveError::ParseError(format!(
                "Unknown array class {}",
                other
            ))),
        }
    }

    /// MATLAB's name for the class, as `class(x)` would print it.
    pub fn name(self) -> &'static str {
        match self {
            MatClass::Cell => "cell",
            MatClass::Struct => "struct",
            MatClass::Object => "object",
            MatClass::Char => "char",
            MatClass::Sparse => "sparse",
            MatClass::Double => "double",
            MatClass::Single => "single",
            MatClass::Int8 => "int8",
            MatClass::UInt8 => "uint8",
            MatClass::Int16 => "int16",
            MatClass::UInt16 => "uint16",
            MatClass::Int32 => "int32",
            MatClass::UInt32 => "uint32",
            MatClass::Int64 => "int64",
            MatClass::UInt64 => "uint64",
            MatClass::Function => "function_handle",
            MatClass::Opaque => "opaque",
        }
    }

    /// Returns true for the integer and floating-point classes.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            MatClass::Double
                | MatClass::Single
                | MatClass::Int8
                | MatClass::UInt8
                | MatClass::Int16
                | MatClass::UInt16
                | MatClass::Int32
                | MatClass::UInt32
                | MatClass::Int64
                | MatClass::UInt64
        )
    }
}

/// Numeric array, materialized as doubles regardless of storage type.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericArray {
    pub class: MatClass,
    pub dims: Vec<usize>,
    pub real: Arc<[f64]>,
    pub imag: Option<Arc<[f64]>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalArray {
    pub dims: Vec<usize>,
    pub data: Vec<bool>,
}

/// Char array stored as one string per row.
#[derive(Debug, Clone, PartialEq)]
pub struct CharArray {
    pub dims: Vec<usize>,
    pub rows: Vec<String>,
}

impl CharArray {
    /// Builds a char array from characters in column-major storage order.
    pub fn from_column_major(dims: Vec<usize>, chars: Vec<char>) -> Self {
        let count = element_count(&dims);
        let nrows = dims.first().copied().unwrap_or(0);

        if nrows == 0 || count == 0 {
            let rows = vec![String::new(); nrows.min(1)];
            return Self { dims, rows };
        }
        if chars.len() != count {
            // Multi-unit encodings can disagree with the element count; keep the text whole
            return Self {
                dims,
                rows: vec![chars.into_iter().collect()],
            };
        }

        let ncols = count / nrows;
        let rows = (0..nrows)
            .map(|r| (0..ncols).map(|c| chars[c * nrows + r]).collect())
            .collect();
        Self { dims, rows }
    }

    /// Builds a 1xN char array from a string.
    pub fn from_text(text: &str) -> Self {
        Self {
            dims: vec![1, text.chars().count()],
            rows: vec![text.to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellArray {
    pub dims: Vec<usize>,
    pub elements: Vec<MatValue>,
}

/// Struct array; carries a class name when it is an old-style MATLAB object.
#[derive(Debug, Clone, PartialEq)]
pub struct StructArray {
    pub class_name: Option<String>,
    pub dims: Vec<usize>,
    pub field_names: Vec<String>,
    /// One entry per element, each aligned with `field_names`.
    pub elements: Vec<Vec<MatValue>>,
}

impl StructArray {
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Gets a view of the element at `index` (column-major order).
    pub fn record(&self, index: usize) -> Option<Record<'_>> {
        self.elements.get(index).map(|values| Record {
            field_names: &self.field_names,
            values,
        })
    }

    /// Iterates over all elements in storage order.
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.elements.iter().map(move |values| Record {
            field_names: &self.field_names,
            values,
        })
    }
}

/// Compressed-column sparse matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseArray {
    pub dims: Vec<usize>,
    pub row_indices: Vec<usize>,
    pub col_ptrs: Vec<usize>,
    pub real: Vec<f64>,
    pub imag: Option<Vec<f64>>,
    pub logical: bool,
}

/// A decoded MATLAB array.
#[derive(Debug, Clone, PartialEq)]
pub enum MatValue {
    Numeric(NumericArray),
    Logical(LogicalArray),
    Char(CharArray),
    Cell(CellArray),
    Struct(StructArray),
    Sparse(SparseArray),
}

impl MatValue {
    /// An empty 0x0 double, MATLAB's `[]`.
    pub fn empty() -> Self {
        MatValue::Numeric(NumericArray {
            class: MatClass::Double,
            dims: vec![0, 0],
            real: Arc::from(Vec::new()),
            imag: None,
        })
    }

    /// A 1x1 double.
    pub fn scalar(value: f64) -> Self {
        MatValue::Numeric(NumericArray {
            class: MatClass::Double,
            dims: vec![1, 1],
            real: Arc::from(vec![value]),
            imag: None,
        })
    }

    /// A 1xN char array.
    pub fn text(text: &str) -> Self {
        MatValue::Char(CharArray::from_text(text))
    }

    pub fn dims(&self) -> &[usize] {
        match self {
            MatValue::Numeric(a) => &a.dims,
            MatValue::Logical(a) => &a.dims,
            MatValue::Char(a) => &a.dims,
            MatValue::Cell(a) => &a.dims,
            MatValue::Struct(a) => &a.dims,
            MatValue::Sparse(a) => &a.dims,
        }
    }

    /// Dimensions with singleton axes removed.
    pub fn squeezed_dims(&self) -> Vec<usize> {
        self.dims().iter().copied().filter(|&d| d != 1).collect()
    }

    /// Number of elements (product of the dimensions).
    pub fn len(&self) -> usize {
        element_count(self.dims())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn class(&self) -> MatClass {
        match self {
            MatValue::Numeric(a) => a.class,
            MatValue::Logical(_) => MatClass::UInt8,
            MatValue::Char(_) => MatClass::Char,
            MatValue::Cell(_) => MatClass::Cell,
            MatValue::Struct(a) if a.class_name.is_some() => MatClass::Object,
            MatValue::Struct(_) => MatClass::Struct,
            MatValue::Sparse(_) => MatClass::Sparse,
        }
    }

    /// Type name as MATLAB's `class()` reports it, object class names included.
    pub fn type_name(&self) -> &str {
        match self {
            MatValue::Logical(_) => "logical",
            MatValue::Struct(StructArray {
                class_name: Some(name),
                ..
            }) => name,
            other => other.class().name(),
        }
    }

    /// Class name of an old-style MATLAB object; the type tag used to classify variables.
    pub fn class_name(&self) -> Option<&str> {
        match self {
            MatValue::Struct(a) => a.class_name.as_deref(),
            _ => None,
        }
    }

    /// Reads a one-element numeric or logical array as a scalar.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MatValue::Numeric(a) if a.real.len() == 1 => Some(a.real[0]),
            MatValue::Logical(a) if a.data.len() == 1 => Some(if a.data[0] { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Reads a one-element logical array as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MatValue::Logical(a) if a.data.len() == 1 => Some(a.data[0]),
            _ => None,
        }
    }

    /// Reads a single-row (or empty) char array as a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MatValue::Char(a) if a.rows.is_empty() => Some(""),
            MatValue::Char(a) if a.rows.len() == 1 => Some(&a.rows[0]),
            _ => None,
        }
    }

    /// Gets the real part of a numeric array without copying it.
    pub fn samples(&self) -> Option<Arc<[f64]>> {
        match self {
            MatValue::Numeric(a) => Some(Arc::clone(&a.real)),
            _ => None,
        }
    }

    /// Reads a 1x1 struct or object as a record.
    pub fn as_record(&self) -> Option<Record<'_>> {
        match self {
            MatValue::Struct(a) if a.len() == 1 => a.record(0),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructArray> {
        match self {
            MatValue::Struct(a) => Some(a),
            _ => None,
        }
    }

    /// Treats the value as a sequence: a cell yields its elements, an empty
    /// array yields nothing, anything else is a one-element sequence.
    pub fn sequence(&self) -> Vec<&MatValue> {
        match self {
            MatValue::Cell(a) => a.elements.iter().collect(),
            other if other.is_empty() => Vec::new(),
            other => vec![other],
        }
    }

    /// String coercion used for identity fields.
    pub fn to_text(&self) -> String {
        match self {
            MatValue::Char(a) => a.rows.join("\n"),
            other => other.to_string(),
        }
    }
}

/// Product of the dimensions, saturating at `usize::MAX`.
fn element_count(dims: &[usize]) -> usize {
    dims.iter().fold(1usize, |acc, &d| acc.saturating_mul(d))
}

fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

impl fmt::Display for MatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(text) = self.as_str() {
            return write!(f, "{}", text);
        }
        if let Some(flag) = self.as_bool() {
            return write!(f, "{}", flag);
        }
        if let MatValue::Numeric(a) = self {
            if a.real.len() == 1 && a.imag.is_none() {
                return write!(f, "{}", format_number(a.real[0]));
            }
        }
        let dims: Vec<String> = self.dims().iter().map(|d| d.to_string()).collect();
        write!(f, "[{} {}]", dims.join("x"), self.type_name())
    }
}

/// A borrowed view of one struct or object element.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    field_names: &'a [String],
    values: &'a [MatValue],
}

impl<'a> Record<'a> {
    /// Gets a field by name.
    pub fn get(&self, name: &str) -> Option<&'a MatValue> {
        self.field_names
            .iter()
            .position(|f| f == name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Gets a field by name, failing with `MissingField` when absent.
    pub fn require(&self, name: &str) -> Result<&'a MatValue> {
        self.get(name)
            .ok_or_else(|| MatWaveError::MissingField(name.to_string()))
    }

    pub fn field_names(&self) -> &'a [String] {
        self.field_names
    }

    /// Iterates over (name, value) pairs in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&'a str, &'a MatValue)> {
        self.field_names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_mapping() {
        assert_eq!(MatClass::from_code(3).unwrap(), MatClass::Object);
        assert_eq!(MatClass::from_code(6).unwrap(), MatClass::Double);
        assert!(MatClass::from_code(42).is_err());
        assert!(MatClass::Int16.is_numeric());
        assert!(!MatClass::Cell.is_numeric());
    }

    #[test]
    fn test_char_rows_from_column_major() {
        // ['ab'; 'cd'] is stored as a, c, b, d
        let chars = CharArray::from_column_major(vec![2, 2], vec!['a', 'c', 'b', 'd']);
        assert_eq!(chars.rows, vec!["ab".to_string(), "cd".to_string()]);

        let empty = CharArray::from_column_major(vec![0, 0], Vec::new());
        assert_eq!(MatValue::Char(empty).as_str(), Some(""));
    }

    #[test]
    fn test_squeeze_accessors() {
        let value = MatValue::scalar(20.0);
        assert_eq!(value.as_f64(), Some(20.0));
        assert!(value.squeezed_dims().is_empty());
        assert_eq!(MatValue::text("OKCF").as_str(), Some("OKCF"));
        assert_eq!(MatValue::empty().as_f64(), None);
    }

    #[test]
    fn test_record_lookup() {
        let array = StructArray {
            class_name: Some("scnlobject".to_string()),
            dims: vec![1, 1],
            field_names: vec!["station".to_string(), "channel".to_string()],
            elements: vec![vec![MatValue::text("OKCF"), MatValue::text("SHZ")]],
        };
        let value = MatValue::Struct(array);
        let record = value.as_record().unwrap();

        assert_eq!(record.get("channel").and_then(|v| v.as_str()), Some("SHZ"));
        assert!(record.get("network").is_none());
        assert!(matches!(
            record.require("network"),
            Err(MatWaveError::MissingField(_))
        ));
        assert_eq!(value.class_name(), Some("scnlobject"));
        assert_eq!(value.type_name(), "scnlobject");
    }

    #[test]
    fn test_sequence_and_display() {
        let cell = MatValue::Cell(CellArray {
            dims: vec![1, 2],
            elements: vec![MatValue::text("A"), MatValue::scalar(3.0)],
        });
        assert_eq!(cell.sequence().len(), 2);
        assert!(MatValue::empty().sequence().is_empty());
        assert_eq!(MatValue::text("x").sequence().len(), 1);

        assert_eq!(MatValue::scalar(3.0).to_string(), "3");
        assert_eq!(MatValue::scalar(0.5).to_string(), "0.5");
        assert_eq!(cell.to_string(), "[1x2 cell]");
    }
}
