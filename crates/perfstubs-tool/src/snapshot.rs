//! Serialized form of everything the reference tool measured.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use perfstubs_api::{CounterData, Metadata, TimerData};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ToolError};

/// Everything measured up to the moment it was taken.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSnapshot {
    pub timers: TimerData,
    pub counters: CounterData,
    pub metadata: Metadata,
    /// Last value of each parameter, sorted by name.
    pub parameters: Vec<(String, i64)>,
}

impl ToolSnapshot {
    /// Encode to `path`, replacing any existing file.
    pub fn write(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|source| ToolError::Io {
            path: path.to_owned(),
            source,
        })?;
        bincode::serialize_into(BufWriter::new(file), self)?;
        Ok(())
    }
}

/// Read a snapshot written by `dump_data`.
pub fn read_snapshot(path: impl AsRef<Path>) -> Result<ToolSnapshot> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| ToolError::Io {
        path: path.to_owned(),
        source,
    })?;
    Ok(bincode::deserialize_from(BufReader::new(file))?)
}

#[cfg(test)]
mod tests {
    use perfstubs_api::{MetadataEntry, TimerRecord};

    use super::*;

    #[test]
    fn write_then_read() {
        let path = std::env::temp_dir().join(format!("perfstubs-snapshot-{}.bin", std::process::id()));
        let snapshot = ToolSnapshot {
            timers: TimerData {
                num_threads: 1,
                metric_names: vec!["Calls".into()],
                timers: vec![TimerRecord {
                    name: "Main Timer".into(),
                    values: vec![1.0],
                }],
            },
            metadata: Metadata {
                entries: vec![MetadataEntry {
                    name: "meta".into(),
                    value: "data".into(),
                }],
            },
            parameters: vec![("depth".into(), 3)],
            ..ToolSnapshot::default()
        };

        snapshot.write(&path).unwrap();
        let read = read_snapshot(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(read, snapshot);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = read_snapshot("/nonexistent/perfstubs.bin").unwrap_err();
        assert!(matches!(err, ToolError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/perfstubs.bin"));
    }
}
