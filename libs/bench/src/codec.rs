//! fvecs / ivecs vector file codec.
//!
//! Both formats are a bare sequence of records, read until end of stream:
//!
//! - 4 bytes: element count (i32, little-endian)
//! - count * 4 bytes: elements (f32 for fvecs, i32 for ivecs, little-endian)
//!
//! There is no file header and no outer length prefix. Records of differing
//! length decode fine here; uniform dimension is enforced by
//! [`VectorSet::from_rows`].

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{BenchError, Result};
use crate::vectors::VectorSet;

/// Largest element count accepted in a record header.
pub const MAX_RECORD_LEN: usize = 1 << 24;

fn read_records<R: Read, T>(
    reader: &mut R,
    limit: usize,
    mut read_elem: impl FnMut(&mut R) -> io::Result<T>,
) -> Result<Vec<Vec<T>>> {
    let mut records = Vec::new();
    while records.len() < limit {
        let Some(count) = read_count(reader, records.len())? else {
            break;
        };
        let mut record = Vec::with_capacity(count);
        for j in 0..count {
            let elem = read_elem(&mut *reader).map_err(|e| truncated(e, records.len(), j, count))?;
            record.push(elem);
        }
        records.push(record);
    }
    Ok(records)
}

/// Read a record header. `None` at a clean end of stream.
fn read_count<R: Read>(reader: &mut R, record: usize) -> Result<Option<usize>> {
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    match filled {
        0 => Ok(None),
        4 => {
            let count = i32::from_le_bytes(buf);
            if count < 0 {
                return Err(BenchError::format(format!(
                    "record {record}: negative element count {count}"
                )));
            }
            let count = count as usize;
            if count > MAX_RECORD_LEN {
                return Err(BenchError::format(format!(
                    "record {record}: element count {count} exceeds {MAX_RECORD_LEN}"
                )));
            }
            Ok(Some(count))
        }
        n => Err(BenchError::format(format!(
            "record {record}: stream ends inside header ({n} of 4 bytes)"
        ))),
    }
}

fn truncated(err: io::Error, record: usize, elem: usize, count: usize) -> BenchError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        BenchError::format(format!(
            "record {record}: truncated after {elem} of {count} elements"
        ))
    } else {
        BenchError::Io(err)
    }
}

/// Decode every f32 record in the stream.
pub fn read_vectors<R: Read>(mut reader: R) -> Result<Vec<Vec<f32>>> {
    read_vectors_limited(&mut reader, usize::MAX)
}

/// Decode at most `limit` f32 records.
pub fn read_vectors_limited<R: Read>(mut reader: R, limit: usize) -> Result<Vec<Vec<f32>>> {
    read_records(&mut reader, limit, |r| r.read_f32::<LittleEndian>())
}

/// Decode every i32 record in the stream.
pub fn read_neighbors<R: Read>(mut reader: R) -> Result<Vec<Vec<i32>>> {
    read_neighbors_limited(&mut reader, usize::MAX)
}

/// Decode at most `limit` i32 records.
pub fn read_neighbors_limited<R: Read>(mut reader: R, limit: usize) -> Result<Vec<Vec<i32>>> {
    read_records(&mut reader, limit, |r| r.read_i32::<LittleEndian>())
}

fn write_count<W: Write>(writer: &mut W, len: usize) -> Result<()> {
    if len > MAX_RECORD_LEN {
        return Err(BenchError::format(format!(
            "record of {len} elements exceeds {MAX_RECORD_LEN}"
        )));
    }
    writer.write_i32::<LittleEndian>(len as i32)?;
    Ok(())
}

/// Encode every row of `vectors`, each prefixed by its dimension.
pub fn write_vectors<W: Write>(mut writer: W, vectors: &VectorSet) -> Result<()> {
    for row in vectors.iter() {
        write_count(&mut writer, row.len())?;
        for &x in row {
            writer.write_f32::<LittleEndian>(x)?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Encode neighbor lists, each prefixed by its length.
pub fn write_neighbors<W: Write>(mut writer: W, neighbors: &[Vec<u32>]) -> Result<()> {
    for row in neighbors {
        write_count(&mut writer, row.len())?;
        for &idx in row {
            let idx = i32::try_from(idx).map_err(|_| {
                BenchError::format(format!("neighbor index {idx} does not fit in i32"))
            })?;
            writer.write_i32::<LittleEndian>(idx)?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).map_err(|e| {
        io::Error::new(e.kind(), format!("failed to open {}: {e}", path.display()))
    })?;
    Ok(BufReader::new(file))
}

/// Read all vectors from an fvecs file.
pub fn read_fvecs(path: &Path) -> Result<Vec<Vec<f32>>> {
    read_vectors(open(path)?)
}

/// Read up to `limit` vectors from an fvecs file.
pub fn read_fvecs_limited(path: &Path, limit: usize) -> Result<Vec<Vec<f32>>> {
    read_vectors_limited(open(path)?, limit)
}

/// Read all records from an ivecs file.
pub fn read_ivecs(path: &Path) -> Result<Vec<Vec<i32>>> {
    read_neighbors(open(path)?)
}

/// Read up to `limit` records from an ivecs file.
pub fn read_ivecs_limited(path: &Path, limit: usize) -> Result<Vec<Vec<i32>>> {
    read_neighbors_limited(open(path)?, limit)
}

pub fn write_fvecs(path: &Path, vectors: &VectorSet) -> Result<()> {
    write_vectors(BufWriter::new(File::create(path)?), vectors)
}

pub fn write_ivecs(path: &Path, neighbors: &[Vec<u32>]) -> Result<()> {
    write_neighbors(BufWriter::new(File::create(path)?), neighbors)
}

/// Convert decoded ivecs rows into neighbor indices bounded by `n_base`.
pub fn to_neighbor_list(rows: Vec<Vec<i32>>, n_base: usize) -> Result<Vec<Vec<u32>>> {
    rows.into_iter()
        .enumerate()
        .map(|(q, row)| {
            row.into_iter()
                .map(|idx| {
                    if idx < 0 || idx as usize >= n_base {
                        Err(BenchError::format(format!(
                            "query {q}: neighbor index {idx} outside base of {n_base}"
                        )))
                    } else {
                        Ok(idx as u32)
                    }
                })
                .collect()
        })
        .collect()
}
