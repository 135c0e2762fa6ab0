use abstutil::prettyprint_usize;
use geom::{GPSBounds, LonLat};

use crate::columns::parse_finite;
use crate::{
    Columns, Error, IDMapping, Result, Trajectory, TrajectoryPoint, VehicleID, VehicleName,
};

/// Hard caps for one ingestion run. There are no defaults; the caller decides.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IngestLimits {
    max_vehicles: usize,
    max_points: usize,
}

impl IngestLimits {
    pub fn new(max_vehicles: usize, max_points: usize) -> Result<Self> {
        if max_vehicles == 0 {
            return Err(Error::Config("max_vehicles must be positive".to_string()));
        }
        if max_points == 0 {
            return Err(Error::Config("max_points must be positive".to_string()));
        }
        Ok(Self {
            max_vehicles,
            max_points,
        })
    }

    pub fn max_vehicles(&self) -> usize {
        self.max_vehicles
    }

    pub fn max_points(&self) -> usize {
        self.max_points
    }
}

/// Returned for every line. `Stop` means the caps are satisfied and no more input should be read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Stop,
}

/// Per-vehicle point buffers for one ingestion run. Buffers are append-only.
pub struct IngestSession {
    columns: Columns,
    limits: IngestLimits,
    ids: IDMapping<VehicleName, VehicleID>,
    // Indexed by VehicleID, so first-seen order
    buffers: Vec<(VehicleName, Vec<TrajectoryPoint>)>,
    total_points: usize,
    skipped_rows: usize,
    bounds: GPSBounds,
}

impl IngestSession {
    pub fn new(columns: Columns, limits: IngestLimits) -> Self {
        Self {
            columns,
            limits,
            ids: IDMapping::new(),
            buffers: Vec::new(),
            total_points: 0,
            skipped_rows: 0,
            bounds: GPSBounds::new(),
        }
    }

    /// Admits one data row (never the header).
    pub fn ingest(&mut self, line: &str) -> Outcome {
        if self.total_points >= self.limits.max_points {
            return Outcome::Stop;
        }

        let fields = match self.columns.extract(line) {
            Some(fields) => fields,
            None => {
                self.skipped_rows += 1;
                return Outcome::Continue;
            }
        };
        let name = fields.id.trim();
        if name.is_empty() {
            self.skipped_rows += 1;
            return Outcome::Continue;
        }

        let vehicle = match self.ids.get(name) {
            Some(id) => id,
            None => {
                // The vehicle cap is checked before admitting a new vehicle, so trajectories
                // already in progress are never cut short by it
                if self.ids.len() == self.limits.max_vehicles {
                    info!(
                        "Reached the cap of {} vehicles; stopping before {}",
                        prettyprint_usize(self.limits.max_vehicles),
                        name
                    );
                    return Outcome::Stop;
                }
                let name = VehicleName::new(name);
                self.buffers.push((name.clone(), Vec::new()));
                self.ids.insert_new(name)
            }
        };

        let (x, y) = match (parse_finite(fields.x), parse_finite(fields.y)) {
            (Some(x), Some(y)) => (x, y),
            _ => {
                self.skipped_rows += 1;
                return Outcome::Continue;
            }
        };
        let t = fields.time.and_then(parse_finite);

        self.buffers[vehicle.0].1.push(TrajectoryPoint { x, y, t });
        self.bounds.update(LonLat::new(x, y));
        self.total_points += 1;

        if self.total_points == self.limits.max_points {
            info!(
                "Reached the cap of {} points",
                prettyprint_usize(self.limits.max_points)
            );
            return Outcome::Stop;
        }
        Outcome::Continue
    }

    pub fn total_points(&self) -> usize {
        self.total_points
    }

    /// Vehicles admitted so far, including ones whose rows all failed to parse.
    pub fn num_vehicles(&self) -> usize {
        self.ids.len()
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    pub fn bounds(&self) -> &GPSBounds {
        &self.bounds
    }

    /// Consumes the session. Vehicles with fewer than 2 points are dropped.
    pub fn finish(self) -> Vec<Trajectory> {
        let mut results = Vec::new();
        let mut dropped = 0;
        for (name, points) in self.buffers {
            match Trajectory::new(name, points) {
                Ok(trajectory) => results.push(trajectory),
                Err(_) => {
                    dropped += 1;
                }
            }
        }
        if dropped > 0 {
            debug!(
                "Dropped {} vehicles with fewer than 2 points",
                prettyprint_usize(dropped)
            );
        }
        results
    }
}
