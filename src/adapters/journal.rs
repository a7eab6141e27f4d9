//! Daily JSON-line log files.
//!
//! One file per stream per day, `<dir>/<YYYYMMDD>_<stream>.txt`, opened in
//! append mode and kept open between writes. The date comes from the
//! record's own timestamp, so the first record after midnight rolls the
//! stream over to a new file.
//!
//! ```text
//!  append(stream, record) ─▶ BufWriter ─▶ 20261018_security_data.txt
//!  sync_all()             ─▶ flush + fsync every open stream
//! ```

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use log::{debug, error, info, warn};

use crate::app::ports::{JournalPort, Stream};
use crate::app::reading::Reading;
use crate::error::{Error, Result};

struct OpenStream {
    day: NaiveDate,
    writer: BufWriter<File>,
}

pub struct DailyJournal {
    dir: PathBuf,
    open: Mutex<HashMap<Stream, OpenStream>>,
}

impl DailyJournal {
    /// Create `dir` if needed. Files are opened lazily on first append.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        info!("Journal: writing to {}", dir.display());
        Ok(Self {
            dir,
            open: Mutex::new(HashMap::new()),
        })
    }

    /// Path of `stream`'s file for `day`.
    pub fn path_for(&self, stream: Stream, day: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}_{}.txt", day.format("%Y%m%d"), stream.as_str()))
    }

    fn streams(&self) -> MutexGuard<'_, HashMap<Stream, OpenStream>> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_file(&self, stream: Stream, day: NaiveDate) -> Result<OpenStream> {
        let path = self.path_for(stream, day);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!("Journal: opened {}", path.display());
        Ok(OpenStream {
            day,
            writer: BufWriter::new(file),
        })
    }

    /// Close every open stream, flushing and syncing first.
    pub fn close(&self) {
        let failures = self.sync_all();
        self.streams().clear();
        if failures == 0 {
            info!("Journal: closed");
        }
    }
}

impl JournalPort for DailyJournal {
    fn append(&self, stream: Stream, record: &Reading) -> Result<()> {
        let line = record
            .to_json_line()
            .map_err(|_| Error::Storage(std::io::ErrorKind::InvalidData))?;
        let day = record.timestamp.date_naive();

        let mut streams = self.streams();
        match streams.get(&stream).map(|open| open.day) {
            Some(current) if current == day => {}
            Some(_) => {
                // Finish the old day before switching files.
                if let Some(mut old) = streams.remove(&stream) {
                    if let Err(e) = flush_and_sync(&mut old.writer) {
                        warn!("Journal: closing {} for {} failed: {}", stream.as_str(), old.day, e);
                    }
                }
                info!("Journal: {} rolled over to {}", stream.as_str(), day);
                streams.insert(stream, self.open_file(stream, day)?);
            }
            None => {
                streams.insert(stream, self.open_file(stream, day)?);
            }
        }

        let Some(open) = streams.get_mut(&stream) else {
            return Err(Error::Storage(std::io::ErrorKind::NotFound));
        };
        writeln!(open.writer, "{line}")?;
        Ok(())
    }

    fn sync_all(&self) -> usize {
        let mut failures = 0;
        for (stream, open) in self.streams().iter_mut() {
            if let Err(e) = flush_and_sync(&mut open.writer) {
                error!("Journal: sync of {} failed: {}", stream.as_str(), e);
                failures += 1;
            }
        }
        failures
    }
}

impl Drop for DailyJournal {
    fn drop(&mut self) {
        self.sync_all();
    }
}

fn flush_and_sync(writer: &mut BufWriter<File>) -> std::io::Result<()> {
    writer.flush()?;
    writer.get_ref().sync_all()
}

/// Read a log file back. Blank lines are skipped; a malformed line is an
/// error.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<Reading>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = Reading::from_json_line(&line)
            .map_err(|_| Error::Storage(std::io::ErrorKind::InvalidData))?;
        records.push(record);
    }
    Ok(records)
}
