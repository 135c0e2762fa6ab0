//! Streaming ingestion of SUMO floating car data (FCD) exported as semicolon-delimited CSV.
//!
//! A file has one row per vehicle per timestep. The engine here turns that unbounded stream into
//! a bounded set of per-vehicle trajectories, or answers filtered point queries against it,
//! without ever holding the whole file in memory.

#[macro_use]
extern crate log;

mod aggregate;
mod columns;
mod dataset;
mod error;
mod ids;
mod ingest;
mod query;
mod rows;
mod tokenizer;
mod trajectory;

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};

pub use self::aggregate::{IngestLimits, IngestSession, Outcome};
pub use self::columns::{Columns, Fields, DELIMITER, ID_COLUMN, TIME_COLUMN, X_COLUMN, Y_COLUMN};
pub use self::dataset::{Dataset, FileSource, MemorySource, Meta, Source, VehicleTrajectory};
pub use self::error::{Error, Result};
pub use self::ids::{CheapID, IDMapping, VehicleID};
pub use self::ingest::{ingest_reader, CancelToken, IngestOptions, IngestStats, IngestStatus, Ingested};
pub use self::query::{query, query_reader, BoundingBox, Query, QueryResult, QuerySpec, QueryStats};
pub use self::rows::{Row, RowReader};
pub use self::tokenizer::LineTokenizer;
pub use self::trajectory::{trajectories_to_geojson, Trajectory, TrajectoryPoint};

/// The original string ID of a vehicle, as it appears in the input.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VehicleName(String);

impl VehicleName {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Lets maps keyed by VehicleName be searched with a borrowed field from the current line
impl Borrow<str> for VehicleName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VehicleName {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
