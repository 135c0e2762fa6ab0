use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use serde::{Deserialize, Serialize};

use crate::columns::parse_finite;
use crate::{Columns, Error, LineTokenizer, Result, VehicleName};

/// One timestamped vehicle position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub vehicle_id: VehicleName,
    pub x: f64,
    pub y: f64,
    pub t: f64,
}

impl Row {
    pub fn new<S: Into<String>>(vehicle_id: S, x: f64, y: f64, t: f64) -> Self {
        Self {
            vehicle_id: VehicleName::new(vehicle_id),
            x,
            y,
            t,
        }
    }
}

/// Iterates over the rows of an FCD stream. The header must have a time column. Malformed rows
/// are skipped; a failed read is yielded once as an error, and then iteration ends.
pub struct RowReader<R> {
    reader: Option<R>,
    tokenizer: LineTokenizer,
    columns: Columns,
    buf: Vec<u8>,
    pending: VecDeque<String>,
    skipped: usize,
}

const CHUNK_SIZE: usize = 64 * 1024;

impl<R: Read> RowReader<R> {
    /// Reads up to the header and resolves it, failing if required columns are missing.
    pub fn new(mut reader: R) -> Result<Self> {
        let mut tokenizer = LineTokenizer::new();
        let mut buf = vec![0; CHUNK_SIZE];
        let mut pending = VecDeque::new();
        let mut eof = false;

        while pending.is_empty() && !eof {
            let n = match reader.read(&mut buf) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(Error::Io(err)),
            };
            if n == 0 {
                eof = true;
                pending.extend(tokenizer.finish());
            } else {
                pending.extend(tokenizer.feed(&buf[..n]));
            }
        }

        let header = match pending.pop_front() {
            Some(header) => header,
            None => {
                return Err(Error::Schema {
                    columns: Vec::new(),
                    missing: vec![
                        crate::ID_COLUMN,
                        crate::X_COLUMN,
                        crate::Y_COLUMN,
                        crate::TIME_COLUMN,
                    ],
                })
            }
        };
        let columns = Columns::resolve_timed(&header)?;

        Ok(Self {
            reader: if eof { None } else { Some(reader) },
            tokenizer,
            columns,
            buf,
            pending,
            skipped: 0,
        })
    }

    /// How many malformed rows were passed over so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn parse(&mut self, line: &str) -> Option<Row> {
        let row = self.columns.extract(line).and_then(|fields| {
            let id = fields.id.trim();
            if id.is_empty() {
                return None;
            }
            Some(Row::new(
                id,
                parse_finite(fields.x)?,
                parse_finite(fields.y)?,
                parse_finite(fields.time?)?,
            ))
        });
        if row.is_none() {
            self.skipped += 1;
        }
        row
    }
}

impl<R: Read> Iterator for RowReader<R> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Result<Row>> {
        loop {
            while let Some(line) = self.pending.pop_front() {
                if let Some(row) = self.parse(&line) {
                    return Some(Ok(row));
                }
            }

            let reader = self.reader.as_mut()?;
            match reader.read(&mut self.buf) {
                Ok(0) => {
                    self.reader = None;
                    self.pending.extend(self.tokenizer.finish());
                }
                Ok(n) => {
                    self.pending.extend(self.tokenizer.feed(&self.buf[..n]));
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => {
                    self.reader = None;
                    return Some(Err(Error::Io(err)));
                }
            }
        }
    }
}
