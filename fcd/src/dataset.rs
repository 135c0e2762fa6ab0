use std::collections::BTreeSet;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use abstutil::prettyprint_usize;
use geojson::Feature;
use geom::{GPSBounds, LonLat};
use serde::Serialize;

use crate::{
    query_reader, BoundingBox, QueryResult, QuerySpec, Result, Row, RowReader, Trajectory,
    TrajectoryPoint, VehicleName,
};

/// Somewhere FCD bytes can be read from, any number of times. Every `open` returns an
/// independent reader, so concurrent queries never share a cursor.
pub trait Source: Send + Sync {
    fn open(&self) -> Result<Box<dyn Read + Send + '_>>;

    /// For logging and metadata
    fn describe(&self) -> String;
}

pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl Source for FileSource {
    fn open(&self) -> Result<Box<dyn Read + Send + '_>> {
        let file = fs_err::File::open(&self.path)?;
        Ok(Box::new(std::io::BufReader::new(file)))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// FCD bytes already in memory
pub struct MemorySource {
    bytes: Arc<[u8]>,
}

impl MemorySource {
    pub fn new<B: Into<Arc<[u8]>>>(bytes: B) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

impl Source for MemorySource {
    fn open(&self) -> Result<Box<dyn Read + Send + '_>> {
        Ok(Box::new(&self.bytes[..]))
    }

    fn describe(&self) -> String {
        format!("{} bytes in memory", prettyprint_usize(self.bytes.len()))
    }
}

/// Summary of a whole FCD source.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub source: String,
    /// None when there are no usable rows
    pub min_time: Option<f64>,
    pub max_time: Option<f64>,
    pub row_count: usize,
    pub vehicle_count: usize,
    #[serde(skip)]
    pub bounds: GPSBounds,
}

/// One vehicle's points, sorted by time.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleTrajectory {
    pub vehicle_id: VehicleName,
    pub truncated: bool,
    pub point_count: usize,
    pub points: Vec<TrajectoryPoint>,
}

impl VehicleTrajectory {
    /// None if there are fewer than 2 points to draw a line with.
    pub fn to_geojson(&self) -> Option<Feature> {
        Trajectory::new(self.vehicle_id.clone(), self.points.clone())
            .ok()
            .map(|t| t.to_geojson())
    }
}

/// Read-only operations over an FCD source. Nothing is cached between calls; each one streams the
/// source again through its own reader.
pub struct Dataset<S> {
    source: S,
}

impl<S: Source> Dataset<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn rows(&self) -> Result<RowReader<Box<dyn Read + Send + '_>>> {
        RowReader::new(self.source.open()?)
    }

    pub fn meta(&self) -> Result<Meta> {
        let mut min_time: Option<f64> = None;
        let mut max_time: Option<f64> = None;
        let mut row_count = 0;
        let mut vehicles: BTreeSet<VehicleName> = BTreeSet::new();
        let mut bounds = GPSBounds::new();

        for row in self.rows()? {
            let row = row?;
            min_time = Some(min_time.map_or(row.t, |t| t.min(row.t)));
            max_time = Some(max_time.map_or(row.t, |t| t.max(row.t)));
            row_count += 1;
            bounds.update(LonLat::new(row.x, row.y));
            vehicles.insert(row.vehicle_id);
        }

        info!(
            "{} has {} rows from {} vehicles",
            self.source.describe(),
            prettyprint_usize(row_count),
            prettyprint_usize(vehicles.len())
        );
        Ok(Meta {
            source: self.source.describe(),
            min_time,
            max_time,
            row_count,
            vehicle_count: vehicles.len(),
            bounds,
        })
    }

    /// Sorted IDs of vehicles with any point in the window (and box), at most `limit` of them.
    pub fn vehicles(
        &self,
        time_start: f64,
        time_end: f64,
        bbox: Option<BoundingBox>,
        limit: usize,
    ) -> Result<Vec<VehicleName>> {
        let mut spec = QuerySpec::window(time_start, time_end);
        spec.bbox = bbox;
        if spec.is_empty_window() {
            return Ok(Vec::new());
        }

        let mut hits: BTreeSet<VehicleName> = BTreeSet::new();
        for row in self.rows()? {
            let row = row?;
            if spec.matches(&row) {
                hits.insert(row.vehicle_id);
            }
        }
        Ok(hits.into_iter().take(limit).collect())
    }

    /// All points of one vehicle sorted by time, optionally within a window. `max_points` of 0
    /// means no limit; otherwise the earliest points are kept.
    pub fn trajectory(
        &self,
        vehicle: &VehicleName,
        window: Option<(f64, f64)>,
        max_points: usize,
    ) -> Result<VehicleTrajectory> {
        let mut rows: Vec<Row> = Vec::new();
        for row in self.rows()? {
            let row = row?;
            if &row.vehicle_id != vehicle {
                continue;
            }
            if let Some((start, end)) = window {
                if row.t < start || row.t > end {
                    continue;
                }
            }
            rows.push(row);
        }
        // Stable, so equal times keep file order
        rows.sort_by(|a, b| a.t.total_cmp(&b.t));

        let truncated = max_points > 0 && rows.len() > max_points;
        if truncated {
            rows.truncate(max_points);
        }
        let points: Vec<TrajectoryPoint> = rows
            .into_iter()
            .map(|row| TrajectoryPoint {
                x: row.x,
                y: row.y,
                t: Some(row.t),
            })
            .collect();

        Ok(VehicleTrajectory {
            vehicle_id: vehicle.clone(),
            truncated,
            point_count: points.len(),
            points,
        })
    }

    pub fn query(&self, spec: &QuerySpec) -> Result<QueryResult> {
        if spec.is_empty_window() {
            return Ok(QueryResult {
                rows: Vec::new(),
                truncated: false,
            });
        }
        query_reader(spec, self.source.open()?)
    }
}
