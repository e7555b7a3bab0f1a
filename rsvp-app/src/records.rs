use anyhow::Result;
use rsvp_core::ResultRecord;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct Line<'a> {
    subject_id: &'a str,
    #[serde(flatten)]
    record: &'a ResultRecord,
}

/// Writes each record as one JSON line tagged with the subject id, and
/// keeps them for the session summary.
pub struct RecordSink<W> {
    out: W,
    subject_id: String,
    records: Vec<ResultRecord>,
}

impl RecordSink<std::io::Stdout> {
    pub fn stdout(subject_id: &str) -> Self {
        Self::new(std::io::stdout(), subject_id)
    }
}

impl<W: Write> RecordSink<W> {
    pub fn new(out: W, subject_id: &str) -> Self {
        Self {
            out,
            subject_id: subject_id.to_owned(),
            records: Vec::new(),
        }
    }

    pub fn emit(&mut self, record: ResultRecord) -> Result<()> {
        let line = Line {
            subject_id: &self.subject_id,
            record: &record,
        };
        serde_json::to_writer(&mut self.out, &line)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        self.records.push(record);
        Ok(())
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}
