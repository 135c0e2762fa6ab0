use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use abstutil::prettyprint_usize;
use geom::GPSBounds;
use serde::Serialize;

use crate::{Columns, Error, IngestLimits, IngestSession, LineTokenizer, Outcome, Result, Trajectory};

pub struct IngestOptions {
    /// How many bytes to request from the reader at a time
    pub chunk_size: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024,
        }
    }
}

/// Lets another thread abandon an ingestion. Checked between chunks.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum IngestStatus {
    /// The whole input was read.
    Exhausted,
    /// A vehicle or point cap was hit, and reading stopped early.
    Capped,
    Cancelled,
    /// Reading failed partway. Whatever was gathered before the failure is kept.
    Failed(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Data lines seen, not counting the header
    pub lines: usize,
    pub points: usize,
    pub vehicles: usize,
    pub skipped: usize,
}

pub struct Ingested {
    pub trajectories: Vec<Trajectory>,
    pub status: IngestStatus,
    pub stats: IngestStats,
    /// Covers every admitted point, including ones from vehicles later dropped for being too short
    pub bounds: GPSBounds,
}

impl Ingested {
    /// True only if the entire input was consumed.
    pub fn is_complete(&self) -> bool {
        self.status == IngestStatus::Exhausted
    }

    pub fn is_truncated(&self) -> bool {
        !self.is_complete()
    }

    pub fn describe(&self) -> String {
        let summary = format!(
            "{} trajectories from {} points ({} rows skipped)",
            prettyprint_usize(self.trajectories.len()),
            prettyprint_usize(self.stats.points),
            prettyprint_usize(self.stats.skipped)
        );
        match self.status {
            IngestStatus::Exhausted => format!("Loaded {}", summary),
            IngestStatus::Capped => format!("Loaded {}, stopped early at the configured caps", summary),
            IngestStatus::Cancelled => format!("Cancelled after {}", summary),
            IngestStatus::Failed(ref err) => {
                format!("Reading failed ({}); partial result has {}", err, summary)
            }
        }
    }
}

/// Streams rows from `reader` into per-vehicle trajectories, reading only as much as the caps
/// need. The reader is dropped as soon as reading stops, for any reason.
///
/// A missing required column fails before any data row is looked at. A failed read doesn't fail
/// the call; the status records it and the partial trajectories are returned.
pub fn ingest_reader<R: Read>(
    mut reader: R,
    limits: IngestLimits,
    options: &IngestOptions,
    cancel: &CancelToken,
) -> Result<Ingested> {
    if options.chunk_size == 0 {
        return Err(Error::Config("chunk_size must be positive".to_string()));
    }

    let mut tokenizer = LineTokenizer::new();
    let mut buf = vec![0; options.chunk_size];
    let mut session: Option<IngestSession> = None;
    let mut lines = 0;

    let status = loop {
        if cancel.is_cancelled() {
            break IngestStatus::Cancelled;
        }

        let n = match reader.read(&mut buf) {
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                if session.is_none() {
                    // Nothing to salvage without a header
                    return Err(Error::Io(err));
                }
                warn!("Reading FCD input failed: {}", err);
                break IngestStatus::Failed(err.to_string());
            }
        };

        let mut outcome = Outcome::Continue;
        if n == 0 {
            for line in tokenizer.finish() {
                outcome = handle_line(&mut session, &line, limits, &mut lines)?;
                if outcome == Outcome::Stop {
                    break;
                }
            }
            if outcome == Outcome::Stop {
                break IngestStatus::Capped;
            }
            break IngestStatus::Exhausted;
        }

        for line in tokenizer.feed(&buf[..n]) {
            outcome = handle_line(&mut session, &line, limits, &mut lines)?;
            if outcome == Outcome::Stop {
                break;
            }
        }
        if outcome == Outcome::Stop {
            break IngestStatus::Capped;
        }
    };
    // Release the input before doing anything else
    drop(reader);

    let session = match session {
        Some(session) => session,
        None => {
            if status == IngestStatus::Cancelled {
                return Ok(Ingested {
                    trajectories: Vec::new(),
                    status,
                    stats: IngestStats::default(),
                    bounds: GPSBounds::new(),
                });
            }
            // An empty stream has no header
            return Err(Error::Schema {
                columns: Vec::new(),
                missing: vec![crate::ID_COLUMN, crate::X_COLUMN, crate::Y_COLUMN],
            });
        }
    };

    let stats = IngestStats {
        lines,
        points: session.total_points(),
        vehicles: session.num_vehicles(),
        skipped: session.skipped_rows(),
    };
    let bounds = session.bounds().clone();
    let ingested = Ingested {
        trajectories: session.finish(),
        status,
        stats,
        bounds,
    };
    info!("{}", ingested.describe());
    Ok(ingested)
}

// The first line is always the header
fn handle_line(
    session: &mut Option<IngestSession>,
    line: &str,
    limits: IngestLimits,
    lines: &mut usize,
) -> Result<Outcome> {
    match session {
        Some(session) => {
            *lines += 1;
            Ok(session.ingest(line))
        }
        None => {
            let columns = Columns::resolve(line)?;
            *session = Some(IngestSession::new(columns, limits));
            Ok(Outcome::Continue)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};

    use super::*;

    const INPUT: &str = "vehicle_id;vehicle_x;vehicle_y\nveh0;1;1\nveh0;2;2\nveh1;5;5\nveh1;6;6\n";

    fn run(input: &[u8], max_vehicles: usize, max_points: usize, chunk_size: usize) -> Ingested {
        ingest_reader(
            Cursor::new(input),
            IngestLimits::new(max_vehicles, max_points).unwrap(),
            &IngestOptions { chunk_size },
            &CancelToken::new(),
        )
        .unwrap()
    }

    // Hands out a few bytes, then fails
    struct FlakyReader {
        data: Vec<u8>,
        served: bool,
    }

    impl Read for FlakyReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.served {
                return Err(io::Error::new(ErrorKind::ConnectionReset, "link dropped"));
            }
            self.served = true;
            let n = self.data.len().min(buf.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            Ok(n)
        }
    }

    #[test]
    fn reads_everything() {
        let result = run(INPUT.as_bytes(), 10, 100, 3);
        assert_eq!(result.status, IngestStatus::Exhausted);
        assert!(result.is_complete());
        assert_eq!(result.trajectories.len(), 2);
        assert_eq!(
            result.stats,
            IngestStats {
                lines: 4,
                points: 4,
                vehicles: 2,
                skipped: 0
            }
        );
        assert_eq!(result.bounds.min_lon, 1.0);
        assert_eq!(result.bounds.max_lat, 6.0);
    }

    #[test]
    fn stops_reading_at_the_cap() {
        let mut cursor = Cursor::new(INPUT.as_bytes());
        let result = ingest_reader(
            &mut cursor,
            IngestLimits::new(1, 100).unwrap(),
            &IngestOptions { chunk_size: 1 },
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(result.status, IngestStatus::Capped);
        assert!(result.is_truncated());
        assert_eq!(result.trajectories.len(), 1);
        // With 1-byte chunks, nothing past the first veh1 row was read
        let first_veh1 = INPUT.find("veh1").unwrap() + "veh1;5;5\n".len();
        assert_eq!(cursor.position() as usize, first_veh1);
    }

    #[test]
    fn transport_failure_keeps_partial_results() {
        let reader = FlakyReader {
            data: INPUT.as_bytes()[..INPUT.find("veh1").unwrap()].to_vec(),
            served: false,
        };
        let result = ingest_reader(
            reader,
            IngestLimits::new(10, 100).unwrap(),
            &IngestOptions::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(result.status, IngestStatus::Failed("link dropped".to_string()));
        assert_eq!(result.trajectories.len(), 1);
        assert!(result.describe().contains("link dropped"));
    }

    #[test]
    fn failure_before_header_is_an_error() {
        let reader = FlakyReader {
            data: Vec::new(),
            served: true,
        };
        let result = ingest_reader(
            reader,
            IngestLimits::new(10, 100).unwrap(),
            &IngestOptions::default(),
            &CancelToken::new(),
        );
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn cancelled_before_reading() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = ingest_reader(
            Cursor::new(INPUT.as_bytes()),
            IngestLimits::new(10, 100).unwrap(),
            &IngestOptions::default(),
            &cancel,
        )
        .unwrap();
        assert_eq!(result.status, IngestStatus::Cancelled);
        assert!(result.trajectories.is_empty());
    }

    #[test]
    fn empty_input_has_no_header() {
        let result = ingest_reader(
            Cursor::new(&b""[..]),
            IngestLimits::new(10, 100).unwrap(),
            &IngestOptions::default(),
            &CancelToken::new(),
        );
        assert!(matches!(result, Err(Error::Schema { .. })));
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let result = ingest_reader(
            Cursor::new(INPUT.as_bytes()),
            IngestLimits::new(10, 100).unwrap(),
            &IngestOptions { chunk_size: 0 },
            &CancelToken::new(),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
