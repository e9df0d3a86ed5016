//! Sample log writer.
//!
//! A log is a small self-describing text file: three header lines naming
//! the producer version, a unique log id and the payload encoding, then a
//! CSV column line followed by one row per reporting interval. Rows are
//! flushed as written so a killed session loses at most the current row.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use log::info;
use uuid::Uuid;

use crate::VERSION;

pub struct SampleLog {
    writer: BufWriter<File>,
    id: String,
    columns: usize,
}

impl SampleLog {
    /// Create the log at `path` and write the header plus column line.
    pub fn create(path: &Path, columns: &[&str]) -> io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let id = Uuid::new_v4().to_string();
        writeln!(writer, "framestat:{VERSION}")?;
        writeln!(writer, "id:{id}")?;
        writeln!(writer, "encrypt:none")?;
        writeln!(writer, "{}", columns.join(","))?;
        writer.flush()?;
        info!("sample log {id} at {}", path.display());
        Ok(Self {
            writer,
            id,
            columns: columns.len(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Append one CSV row. Short rows pad with blanks so columns stay
    /// aligned; long rows are an error.
    pub fn append_row(&mut self, values: &[String]) -> io::Result<()> {
        if values.len() > self.columns {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} values for {} columns", values.len(), self.columns),
            ));
        }
        let mut row = values.join(",");
        for _ in values.len()..self.columns {
            row.push(',');
        }
        writeln!(self.writer, "{row}")?;
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn header_then_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log");
        let mut log = SampleLog::create(&path, &["time", "fps", "jank"]).unwrap();
        log.append_row(&["10:00:00".into(), "60".into(), "1".into()])
            .unwrap();
        log.append_row(&["10:00:01".into(), "59".into(), "0".into()])
            .unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], format!("framestat:{VERSION}"));
        assert_eq!(lines[1], format!("id:{}", log.id()));
        assert_eq!(lines[2], "encrypt:none");
        assert_eq!(lines[3], "time,fps,jank");
        assert_eq!(lines[4], "10:00:00,60,1");
        assert_eq!(lines[5], "10:00:01,59,0");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn short_rows_pad_with_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log");
        let mut log = SampleLog::create(&path, &["time", "fps", "jank"]).unwrap();
        log.append_row(&["10:00:00".into()]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().last().unwrap(), "10:00:00,,");
    }

    #[test]
    fn long_rows_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log");
        let mut log = SampleLog::create(&path, &["time"]).unwrap();
        let err = log
            .append_row(&["a".into(), "b".into()])
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn each_log_gets_a_fresh_id() {
        let dir = tempfile::tempdir().unwrap();
        let a = SampleLog::create(&dir.path().join("a.log"), &["time"]).unwrap();
        let b = SampleLog::create(&dir.path().join("b.log"), &["time"]).unwrap();
        assert_ne!(a.id(), b.id());
    }
}
