// Event log ingestion
// Reads cleaned keystroke logs (tab-separated, optionally gzip) into an event stream

use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;
use thiserror::Error;

use super::types::{Direction, EventStream, KeyEvent, RemovedMarkers};
use crate::keys::KeyTable;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("line {line}: timestamp {timestamp} is earlier than previous {previous}")]
    OutOfOrder {
        line: usize,
        timestamp: i64,
        previous: i64,
    },
}

/// A loaded log together with the SHA-256 of its raw bytes
#[derive(Debug, Clone)]
pub struct LoadedLog {
    pub stream: EventStream,
    pub sha256: String,
}

/// Calculate SHA256 hash of raw log bytes
pub fn fingerprint(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Read and parse a log file
pub fn read_log_file(path: &Path, keys: &mut KeyTable) -> Result<LoadedLog, IngestError> {
    let data = std::fs::read(path)?;
    let stream = ingest_log(&data, keys)?;

    log::info!(
        "Loaded {} events ({} cleaning markers) from {}",
        stream.len(),
        stream.removed.len(),
        path.display()
    );

    Ok(LoadedLog {
        stream,
        sha256: fingerprint(&data),
    })
}

/// Parse a log from raw bytes, decompressing gzip input transparently
///
/// Each line is `timestamp \t is_down \t key`. A line with an empty key is a
/// pause marker left by the cleaner: it is dropped and the previously kept
/// event is recorded in the stream's removed markers.
pub fn ingest_log(data: &[u8], keys: &mut KeyTable) -> Result<EventStream, IngestError> {
    let bytes = if data.starts_with(&GZIP_MAGIC) {
        let mut decoder = GzDecoder::new(data);
        let mut bytes = Vec::new();
        decoder.read_to_end(&mut bytes)?;
        bytes
    } else {
        data.to_vec()
    };

    let text = decode_utf8(bytes)?;
    parse_lines(&text, keys)
}

/// Invalid UTF-8 is reported with the line it occurs on
fn decode_utf8(bytes: Vec<u8>) -> Result<String, IngestError> {
    String::from_utf8(bytes).map_err(|err| {
        let valid = err.utf8_error().valid_up_to();
        let line = err.as_bytes()[..valid].iter().filter(|b| **b == b'\n').count() + 1;
        IngestError::Malformed {
            line,
            reason: format!("invalid UTF-8 at byte {}", valid),
        }
    })
}

fn parse_lines(text: &str, keys: &mut KeyTable) -> Result<EventStream, IngestError> {
    let mut events: Vec<KeyEvent> = Vec::new();
    let mut removed = RemovedMarkers::new();

    for (i, raw) in text.lines().enumerate() {
        let line = i + 1;
        if raw.trim().is_empty() {
            continue;
        }

        let mut fields = raw.split('\t');
        let timestamp_field = fields.next().unwrap_or("");
        let direction_field = fields.next();
        let key_field = fields.next().unwrap_or("");

        if key_field.trim().is_empty() {
            if let Some(last) = events.len().checked_sub(1) {
                removed.mark(last);
            }
            continue;
        }

        let timestamp_ms: i64 = timestamp_field.trim().parse().map_err(|_| IngestError::Malformed {
            line,
            reason: format!("invalid timestamp '{}'", timestamp_field),
        })?;

        let direction = direction_field
            .and_then(Direction::from_flag)
            .ok_or_else(|| IngestError::Malformed {
                line,
                reason: format!("invalid is_down flag '{}'", direction_field.unwrap_or("")),
            })?;

        if let Some(prev) = events.last() {
            if timestamp_ms < prev.timestamp_ms {
                return Err(IngestError::OutOfOrder {
                    line,
                    timestamp: timestamp_ms,
                    previous: prev.timestamp_ms,
                });
            }
        }

        let key = keys.intern(key_field);
        events.push(KeyEvent {
            timestamp_ms,
            direction,
            key,
        });
    }

    Ok(EventStream::with_removed(events, removed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    const LOG: &str = "100\t1\tShift\n105\t1\tA\n110\t0\tA\n112\t0\tShift\n";

    #[test]
    fn test_parse_plain_log() {
        let mut keys = KeyTable::new();
        let stream = ingest_log(LOG.as_bytes(), &mut keys).unwrap();

        assert_eq!(stream.len(), 4);
        assert!(stream.removed.is_empty());
        assert_eq!(keys.name(stream.events[0].key), "shift");
        assert_eq!(keys.name(stream.events[1].key), "a");
        assert_eq!(stream.events[2].direction, Direction::Release);
        assert_eq!(stream.events[3].timestamp_ms, 112);
    }

    #[test]
    fn test_pause_marker_marks_previous_event() {
        let mut keys = KeyTable::new();
        let log = "100\t1\ta\n110\t0\ta\n30110\t\t\n30200\t1\tb\n30300\t0\tb\n";
        let stream = ingest_log(log.as_bytes(), &mut keys).unwrap();

        assert_eq!(stream.len(), 4);
        assert!(stream.removed.contains(1));
        assert_eq!(stream.removed.len(), 1);
    }

    #[test]
    fn test_gzip_log() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(LOG.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut keys = KeyTable::new();
        let stream = ingest_log(&compressed, &mut keys).unwrap();
        assert_eq!(stream.len(), 4);
    }

    #[test]
    fn test_malformed_rows() {
        let mut keys = KeyTable::new();
        let err = ingest_log(b"abc\t1\ta\n", &mut keys).unwrap_err();
        assert!(matches!(err, IngestError::Malformed { line: 1, .. }));

        let err = ingest_log(b"1\t1\ta\n2\tmaybe\ta\n", &mut keys).unwrap_err();
        assert!(matches!(err, IngestError::Malformed { line: 2, .. }));
    }

    #[test]
    fn test_out_of_order_rejected() {
        let mut keys = KeyTable::new();
        let err = ingest_log(b"10\t1\ta\n5\t0\ta\n", &mut keys).unwrap_err();
        assert!(matches!(
            err,
            IngestError::OutOfOrder {
                line: 2,
                timestamp: 5,
                previous: 10
            }
        ));
    }

    #[test]
    fn test_read_log_file_fingerprint() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("events.tsv");
        std::fs::write(&path, LOG).unwrap();

        let mut keys = KeyTable::new();
        let loaded = read_log_file(&path, &mut keys).unwrap();
        assert_eq!(loaded.stream.len(), 4);
        assert_eq!(loaded.sha256, fingerprint(LOG.as_bytes()));
        assert_eq!(loaded.sha256.len(), 64);
    }

    #[test]
    fn test_fingerprint_known_value() {
        assert_eq!(
            fingerprint(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_invalid_utf8_rejected_plain_and_gzip() {
        let data = b"0\t1\ta\n5\t1\t\xff\xfe\n".to_vec();

        let mut keys = KeyTable::new();
        match ingest_log(&data, &mut keys) {
            Err(IngestError::Malformed { line, reason }) => {
                assert_eq!(line, 2);
                assert!(reason.contains("UTF-8"));
            }
            other => panic!("expected malformed input, got {:?}", other),
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&data).unwrap();
        let packed = encoder.finish().unwrap();
        assert!(matches!(
            ingest_log(&packed, &mut keys),
            Err(IngestError::Malformed { line: 2, .. })
        ));
    }
}
