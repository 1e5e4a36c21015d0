//! Decoding of `miMATRIX` elements into `MatValue`s.
//!
//! This module walks the top-level variables of a MAT v5 file and turns
//! each array body into a `MatValue`:
//! 1. Array header: flags, dimensions, name
//! 2. Name filter: unrequested variables are skipped before their body is decoded
//! 3. Class-specific body: numeric parts, characters, cells, struct fields, sparse indices

use crate::error::{MatWaveError, Result};
use crate::matfile::{DataType, ElementReader, Endian, MatFileReader};
use crate::value::{
    CellArray, CharArray, LogicalArray, MatClass, MatValue, NumericArray, SparseArray,
    StructArray,
};
use std::sync::Arc;

const FLAG_COMPLEX: u32 = 0x0800;
const FLAG_LOGICAL: u32 = 0x0200;

const MAX_FIELDLESS_ELEMENTS: usize = 1 << 20;

/// A named top-level variable.
#[derive(Debug, Clone)]
pub struct MatVariable {
    pub name: String,
    pub value: MatValue,
}

/// Summary of a top-level variable, as MATLAB's `whos` would list it.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableInfo {
    pub name: String,
    pub class: MatClass,
    pub logical: bool,
    pub dims: Vec<usize>,
    /// Class name for old-style objects.
    pub class_name: Option<String>,
}

impl VariableInfo {
    /// Type name as MATLAB's `class()` reports it.
    pub fn type_name(&self) -> &str {
        match (&self.class_name, self.logical) {
            (Some(name), _) => name,
            (None, true) => "logical",
            (None, false) => self.class.name(),
        }
    }

    /// Dimensions formatted as `RxC`.
    pub fn size_string(&self) -> String {
        let dims: Vec<String> = self.dims.iter().map(|d| d.to_string()).collect();
        dims.join("x")
    }
}

/// Array flags, dimensions and name: the leading sub-elements of every `miMATRIX`.
#[derive(Debug, Clone)]
struct ArrayHeader {
    class: MatClass,
    complex: bool,
    logical: bool,
    nzmax: usize,
    dims: Vec<usize>,
    /// Number of elements, the product of `dims`.
    count: usize,
    name: String,
}

/// Loads top-level variables from MAT v5 data.
pub struct MatLoader;

impl MatLoader {
    /// Decodes all top-level variables, or only those named in `names`.
    ///
    /// Variables are returned in file order. Function handles and opaque
    /// (`classdef`) objects are skipped with a warning.
    pub fn load(data: &[u8], names: Option<&[String]>) -> Result<Vec<MatVariable>> {
        let reader = MatFileReader::new(data);
        let mut variables = reader.variables()?;
        let endian = variables.endian();
        let mut result = Vec::new();

        for body in variables.by_ref() {
            let body = body?;
            let mut elements = ElementReader::new(&body, endian);
            let header = read_array_header(&mut elements)?;

            if header.name.is_empty() {
                log::debug!("Skipping unnamed {} array (subsystem data)", header.class.name());
                continue;
            }
            if let Some(wanted) = names {
                if !wanted.iter().any(|n| n == &header.name) {
                    log::debug!("Skipping variable '{}' (not requested)", header.name);
                    continue;
                }
            }

            match read_array_body(&header, &mut elements) {
                Ok(value) => result.push(MatVariable {
                    name: header.name,
                    value,
                }),
                Err(MatWaveError::Unsupported(reason)) => {
                    log::warn!("Skipping variable '{}': {}", header.name, reason);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(result)
    }

    /// Lists top-level variables without decoding their contents.
    pub fn list(data: &[u8]) -> Result<Vec<VariableInfo>> {
        let reader = MatFileReader::new(data);
        let mut variables = reader.variables()?;
        let endian = variables.endian();
        let mut result = Vec::new();

        for body in variables.by_ref() {
            let body = body?;
            let mut elements = ElementReader::new(&body, endian);
            let header = read_array_header(&mut elements)?;
            if header.name.is_empty() {
                continue;
            }

            let class_name = if header.class == MatClass::Object {
                Some(elements.expect_element("class name")?.to_name())
            } else {
                None
            };

            result.push(VariableInfo {
                name: header.name,
                class: header.class,
                logical: header.logical,
                dims: header.dims,
                class_name,
            });
        }

        Ok(result)
    }
}

fn read_array_header(elements: &mut ElementReader) -> Result<ArrayHeader> {
    let endian = elements.endian();

    let flags = elements.expect_element("array flags")?.to_u32_vec(endian)?;
    if flags.len() < 2 {
        return Err(MatWaveError::ParseError(format!(
            "Array flags hold {} words, expected 2",
            flags.len()
        )));
    }
    let class = MatClass::from_code((flags[0] & 0xff) as u8)?;

    let dims = elements
        .expect_element("dimensions")?
        .to_i64_vec(endian)?
        .into_iter()
        .map(|d| {
            usize::try_from(d)
                .map_err(|_| MatWaveError::ParseError(format!("Negative dimension {}", d)))
        })
        .collect::<Result<Vec<usize>>>()?;
    let count = dims
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| {
            MatWaveError::ParseError(format!("Dimensions {:?} overflow the element count", dims))
        })?;

    let name = elements.expect_element("array name")?.to_name();

    Ok(ArrayHeader {
        class,
        complex: flags[0] & FLAG_COMPLEX != 0,
        logical: flags[0] & FLAG_LOGICAL != 0,
        nzmax: flags[1] as usize,
        dims,
        count,
        name,
    })
}

/// Decodes a nested `miMATRIX` payload (cell contents, struct fields).
fn read_nested(data: &[u8], endian: Endian) -> Result<MatValue> {
    // A zero-length matrix element stands for an empty double
    if data.is_empty() {
        return Ok(MatValue::empty());
    }
    let mut elements = ElementReader::new(data, endian);
    let header = read_array_header(&mut elements)?;
    read_array_body(&header, &mut elements)
}

fn read_array_body(header: &ArrayHeader, elements: &mut ElementReader) -> Result<MatValue> {
    match header.class {
        MatClass::Cell => read_cell(header, elements),
        MatClass::Struct => read_struct(header, None, elements),
        MatClass::Object => {
            let class_name = elements.expect_element("class name")?.to_name();
            read_struct(header, Some(class_name), elements)
        }
        MatClass::Char => read_char(header, elements),
        MatClass::Sparse => read_sparse(header, elements),
        MatClass::Function | MatClass::Opaque => Err(MatWaveError::Unsupported(format!(
            "{} arrays cannot be decoded",
            header.class.name()
        ))),
        _ => read_numeric(header, elements),
    }
}

fn read_numeric(header: &ArrayHeader, elements: &mut ElementReader) -> Result<MatValue> {
    let endian = elements.endian();
    let count = header.count;

    let real = elements.expect_element("real part")?.to_f64_vec(endian)?;
    if real.len() != count {
        return Err(MatWaveError::ParseError(format!(
            "Array '{}' has {} values for dimensions {:?}",
            header.name,
            real.len(),
            header.dims
        )));
    }

    if header.logical {
        return Ok(MatValue::Logical(LogicalArray {
            dims: header.dims.clone(),
            data: real.into_iter().map(|v| v != 0.0).collect(),
        }));
    }

    let imag = if header.complex {
        let imag = elements.expect_element("imaginary part")?.to_f64_vec(endian)?;
        if imag.len() != count {
            return Err(MatWaveError::ParseError(format!(
                "Array '{}' has {} imaginary values for {} real values",
                header.name,
                imag.len(),
                count
            )));
        }
        Some(Arc::from(imag))
    } else {
        None
    };

    Ok(MatValue::Numeric(NumericArray {
        class: header.class,
        dims: header.dims.clone(),
        real: Arc::from(real),
        imag,
    }))
}

fn read_char(header: &ArrayHeader, elements: &mut ElementReader) -> Result<MatValue> {
    let endian = elements.endian();
    let chars = match elements.next_element()? {
        Some(element) => element.to_chars(endian)?,
        None => Vec::new(),
    };
    Ok(MatValue::Char(CharArray::from_column_major(
        header.dims.clone(),
        chars,
    )))
}

fn read_cell(header: &ArrayHeader, elements: &mut ElementReader) -> Result<MatValue> {
    let endian = elements.endian();
    let count = header.count;
    ensure_room(header, count, elements)?;
    let mut cells = Vec::with_capacity(count);

    for _ in 0..count {
        let element = elements.expect_element("cell")?;
        if element.data_type != DataType::Matrix {
            return Err(MatWaveError::ParseError(format!(
                "Cell contents must be miMATRIX, got {:?}",
                element.data_type
            )));
        }
        cells.push(read_nested(element.data, endian)?);
    }

    Ok(MatValue::Cell(CellArray {
        dims: header.dims.clone(),
        elements: cells,
    }))
}

fn read_struct(
    header: &ArrayHeader,
    class_name: Option<String>,
    elements: &mut ElementReader,
) -> Result<MatValue> {
    let endian = elements.endian();

    let name_len = elements
        .expect_element("field name length")?
        .to_i64_vec(endian)?
        .first()
        .copied()
        .unwrap_or(0);
    let names_element = elements.expect_element("field names")?;

    let field_names: Vec<String> = if name_len > 0 {
        names_element
            .data
            .chunks(name_len as usize)
            .map(|chunk| {
                let end = chunk.iter().position(|&b| b == 0).unwrap_or(chunk.len());
                String::from_utf8_lossy(&chunk[..end]).to_string()
            })
            .collect()
    } else {
        Vec::new()
    };

    let count = header.count;
    if field_names.is_empty() {
        // Fieldless elements store no bytes, so only a fixed cap bounds them
        if count > MAX_FIELDLESS_ELEMENTS {
            return Err(MatWaveError::ParseError(format!(
                "Struct '{}' claims {} elements without fields",
                header.name, count
            )));
        }
    } else {
        ensure_room(header, count.saturating_mul(field_names.len()), elements)?;
    }
    let mut records = Vec::with_capacity(count);

    for _ in 0..count {
        let mut values = Vec::with_capacity(field_names.len());
        for field in &field_names {
            let element = elements.expect_element("struct field")?;
            if element.data_type != DataType::Matrix {
                return Err(MatWaveError::ParseError(format!(
                    "Field '{}' must be miMATRIX, got {:?}",
                    field, element.data_type
                )));
            }
            values.push(read_nested(element.data, endian)?);
        }
        records.push(values);
    }

    Ok(MatValue::Struct(StructArray {
        class_name,
        dims: header.dims.clone(),
        field_names,
        elements: records,
    }))
}

/// Fails unless `nested` matrix elements, at least 8 bytes each, fit in the unread data.
fn ensure_room(header: &ArrayHeader, nested: usize, elements: &ElementReader) -> Result<()> {
    let needed = nested.checked_mul(8);
    match needed {
        Some(bytes) if bytes <= elements.remaining() => Ok(()),
        _ => Err(MatWaveError::ParseError(format!(
            "Array '{}' claims {} nested elements but only {} bytes remain",
            header.name,
            nested,
            elements.remaining()
        ))),
    }
}

fn read_sparse(header: &ArrayHeader, elements: &mut ElementReader) -> Result<MatValue> {
    let endian = elements.endian();

    let to_indices = |values: Vec<i64>| -> Vec<usize> {
        values.into_iter().map(|v| v.max(0) as usize).collect()
    };
    let row_indices = to_indices(elements.expect_element("row indices")?.to_i64_vec(endian)?);
    let col_ptrs = to_indices(elements.expect_element("column pointers")?.to_i64_vec(endian)?);

    let nnz = col_ptrs.last().copied().unwrap_or(0);
    if nnz > header.nzmax.max(row_indices.len()) {
        return Err(MatWaveError::ParseError(format!(
            "Sparse array '{}' claims {} non-zeros with nzmax {}",
            header.name, nnz, header.nzmax
        )));
    }

    let mut real = elements.expect_element("sparse values")?.to_f64_vec(endian)?;
    real.truncate(nnz);
    let imag = if header.complex {
        let mut imag = elements
            .expect_element("sparse imaginary values")?
            .to_f64_vec(endian)?;
        imag.truncate(nnz);
        Some(imag)
    } else {
        None
    };

    let mut row_indices = row_indices;
    row_indices.truncate(nnz);

    Ok(MatValue::Sparse(SparseArray {
        dims: header.dims.clone(),
        row_indices,
        col_ptrs,
        real,
        imag,
        logical: header.logical,
    }))
}
