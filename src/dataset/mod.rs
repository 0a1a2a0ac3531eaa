// Training dataset serialization
// Tab-separated rows of tap-hold examples, optionally gzip compressed

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

use crate::extract::TrainingExample;

/// Header of the dataset, in column order
pub const COLUMNS: [&str; 9] = [
    "prev_down_time",
    "prev_up_time",
    "th_down_time",
    "next_down_time",
    "next_up_time",
    "th_up_time",
    "last_down_time",
    "prev_is_mod",
    "is_mod",
];

const SEPARATOR: char = '\t';

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Missing header row")]
    MissingHeader,

    #[error("Unexpected header: {0}")]
    BadHeader(String),

    #[error("Line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// One persisted row: the seven timestamps and the two modifier flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRow {
    pub times_ms: [i64; 7],
    pub prev_is_mod: bool,
    pub is_mod: bool,
}

impl From<&TrainingExample> for DatasetRow {
    fn from(example: &TrainingExample) -> Self {
        DatasetRow {
            times_ms: example.timestamps(),
            prev_is_mod: example.prev_is_mod,
            is_mod: example.is_mod,
        }
    }
}

impl DatasetRow {
    fn to_line(&self) -> String {
        let mut fields: Vec<String> = self.times_ms.iter().map(i64::to_string).collect();
        fields.push(flag(self.prev_is_mod).to_string());
        fields.push(flag(self.is_mod).to_string());
        fields.join("\t")
    }

    fn parse(line: &str, line_no: usize) -> Result<Self, DatasetError> {
        let malformed = |reason: String| DatasetError::Malformed {
            line: line_no,
            reason,
        };

        let fields: Vec<&str> = line.split(SEPARATOR).collect();
        if fields.len() != COLUMNS.len() {
            return Err(malformed(format!(
                "expected {} fields, found {}",
                COLUMNS.len(),
                fields.len()
            )));
        }

        let mut times_ms = [0i64; 7];
        for (slot, field) in times_ms.iter_mut().zip(&fields[..7]) {
            *slot = field
                .trim()
                .parse()
                .map_err(|_| malformed(format!("bad timestamp '{}'", field)))?;
        }

        let parse_flag = |field: &str| match field.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(malformed(format!("bad flag '{}'", other))),
        };

        Ok(DatasetRow {
            times_ms,
            prev_is_mod: parse_flag(fields[7])?,
            is_mod: parse_flag(fields[8])?,
        })
    }
}

fn flag(value: bool) -> u8 {
    u8::from(value)
}

fn is_gzip_path(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "gz")
}

/// Write the header and one row per example
pub fn write_rows<W: Write>(mut writer: W, examples: &[TrainingExample]) -> Result<(), DatasetError> {
    writeln!(writer, "{}", COLUMNS.join("\t"))?;
    for example in examples {
        writeln!(writer, "{}", DatasetRow::from(example).to_line())?;
    }
    writer.flush()?;
    Ok(())
}

/// Read rows written by `write_rows`, checking the header
pub fn read_rows<R: BufRead>(reader: R) -> Result<Vec<DatasetRow>, DatasetError> {
    let mut lines = reader.lines();

    let header = lines.next().ok_or(DatasetError::MissingHeader)??;
    let expected = COLUMNS.join("\t");
    if header.trim_end() != expected {
        return Err(DatasetError::BadHeader(header));
    }

    let mut rows = Vec::new();
    for (i, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        rows.push(DatasetRow::parse(&line, i + 2)?);
    }
    Ok(rows)
}

/// Save examples to a file, gzip compressed when the path ends in `.gz`
pub fn save(path: &Path, examples: &[TrainingExample]) -> Result<(), DatasetError> {
    let file = File::create(path)?;

    if is_gzip_path(path) {
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        write_rows(&mut encoder, examples)?;
        encoder.finish()?.flush()?;
    } else {
        write_rows(BufWriter::new(file), examples)?;
    }

    log::info!("Wrote {} training rows to {}", examples.len(), path.display());
    Ok(())
}

pub fn load(path: &Path) -> Result<Vec<DatasetRow>, DatasetError> {
    let file = File::open(path)?;

    if is_gzip_path(path) {
        read_rows(BufReader::new(GzDecoder::new(file)))
    } else {
        read_rows(BufReader::new(file))
    }
}
