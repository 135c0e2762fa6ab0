use std::collections::{BTreeSet, HashMap, HashSet};
use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::{Outcome, Result, Row, RowReader, VehicleName};

/// An axis-aligned rectangle, inclusive on all four sides. An inverted box contains nothing.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(raw: [f64; 4]) -> Self {
        Self::new(raw[0], raw[1], raw[2], raw[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(bbox: BoundingBox) -> Self {
        [bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y]
    }
}

/// What to pull out of the FCD rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    /// None or an empty list means every vehicle
    #[serde(default)]
    pub vehicle_ids: Option<BTreeSet<VehicleName>>,
    pub time_start: f64,
    pub time_end: f64,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    /// 0 or less means no limit
    #[serde(default)]
    pub max_points: i64,
    /// At most one row per vehicle per this many seconds. 0 or less means no sampling.
    #[serde(default)]
    pub sample_every: f64,
}

impl QuerySpec {
    /// Everything in a time window, no sampling or limit.
    pub fn window(time_start: f64, time_end: f64) -> Self {
        Self {
            vehicle_ids: None,
            time_start,
            time_end,
            bbox: None,
            max_points: 0,
            sample_every: 0.0,
        }
    }

    /// True if no row could ever match.
    pub fn is_empty_window(&self) -> bool {
        // Also catches NaN bounds
        !(self.time_start <= self.time_end)
    }

    pub(crate) fn matches(&self, row: &Row) -> bool {
        if let Some(ref ids) = self.vehicle_ids {
            if !ids.is_empty() && !ids.contains(&row.vehicle_id) {
                return false;
            }
        }
        // Written so that a NaN time never matches
        if !(self.time_start <= row.t && row.t <= self.time_end) {
            return false;
        }
        if let Some(ref bbox) = self.bbox {
            if !bbox.contains(row.x, row.y) {
                return false;
            }
        }
        true
    }

    fn sample_interval(&self) -> Option<f64> {
        if self.sample_every > 0.0 && self.sample_every.is_finite() {
            Some(self.sample_every)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    /// Set when more matching rows existed beyond `max_points`
    pub truncated: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStats {
    pub rows: usize,
    pub vehicles: usize,
    pub truncated: bool,
    pub sample_every: f64,
    pub max_points: i64,
}

impl QueryResult {
    /// Sorted distinct vehicles present in the result.
    pub fn vehicle_ids(&self) -> Vec<VehicleName> {
        let ids: BTreeSet<&VehicleName> = self.rows.iter().map(|row| &row.vehicle_id).collect();
        ids.into_iter().cloned().collect()
    }

    pub fn stats(&self, spec: &QuerySpec) -> QueryStats {
        QueryStats {
            rows: self.rows.len(),
            vehicles: self.vehicle_ids().len(),
            truncated: self.truncated,
            sample_every: spec.sample_every,
            max_points: spec.max_points,
        }
    }

    pub fn export_to_csv(&self) -> Result<String> {
        let mut out = Vec::new();
        {
            let mut writer = csv::WriterBuilder::new()
                .delimiter(b';')
                .from_writer(&mut out);
            for row in &self.rows {
                writer.serialize(ExportRow {
                    vehicle_id: &row.vehicle_id,
                    vehicle_x: row.x,
                    vehicle_y: row.y,
                    timestep_time: row.t,
                })?;
            }
            writer.flush()?;
        }
        // The writer only ever receives valid UTF-8
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

// Same column names as the input, so exports can be read back in
#[derive(Serialize)]
struct ExportRow<'a> {
    vehicle_id: &'a VehicleName,
    vehicle_x: f64,
    vehicle_y: f64,
    timestep_time: f64,
}

/// Incremental form of the query engine, for sources that are pushed rather than pulled.
pub struct Query<'a> {
    spec: &'a QuerySpec,
    rows: Vec<Row>,
    truncated: bool,
    // Per vehicle, the time buckets that already kept a row, as bits of the floored quotient
    sampled: HashMap<VehicleName, HashSet<u64>>,
}

impl<'a> Query<'a> {
    pub fn new(spec: &'a QuerySpec) -> Self {
        Self {
            spec,
            rows: Vec::new(),
            truncated: false,
            sampled: HashMap::new(),
        }
    }

    pub fn offer(&mut self, row: Row) -> Outcome {
        if self.truncated {
            return Outcome::Stop;
        }
        if !self.spec.matches(&row) {
            return Outcome::Continue;
        }
        if let Some(interval) = self.spec.sample_interval() {
            // Adding 0.0 folds -0.0 into 0.0
            let bucket = ((row.t / interval).floor() + 0.0).to_bits();
            let seen = self.sampled.get(&row.vehicle_id);
            if seen.map_or(false, |buckets| buckets.contains(&bucket)) {
                return Outcome::Continue;
            }
            if self.at_limit() {
                self.truncated = true;
                return Outcome::Stop;
            }
            match self.sampled.get_mut(&row.vehicle_id) {
                Some(buckets) => {
                    buckets.insert(bucket);
                }
                None => {
                    self.sampled
                        .insert(row.vehicle_id.clone(), HashSet::from([bucket]));
                }
            }
        } else if self.at_limit() {
            self.truncated = true;
            return Outcome::Stop;
        }
        self.rows.push(row);
        Outcome::Continue
    }

    fn at_limit(&self) -> bool {
        self.spec.max_points > 0 && self.rows.len() as i64 >= self.spec.max_points
    }

    pub fn finish(self) -> QueryResult {
        QueryResult {
            rows: self.rows,
            truncated: self.truncated,
        }
    }
}

/// Filters, samples, and caps rows from any source. Stops pulling from `source` once the result
/// is known to be truncated. Deterministic for the same input.
pub fn query<I: IntoIterator<Item = Row>>(spec: &QuerySpec, source: I) -> QueryResult {
    let mut query = Query::new(spec);
    if spec.is_empty_window() {
        return query.finish();
    }
    for row in source {
        if query.offer(row) == Outcome::Stop {
            break;
        }
    }
    query.finish()
}

/// Runs a query directly against an FCD byte stream, releasing the reader once the result is
/// complete or truncated.
pub fn query_reader<R: Read>(spec: &QuerySpec, reader: R) -> Result<QueryResult> {
    let mut query = Query::new(spec);
    if spec.is_empty_window() {
        return Ok(query.finish());
    }
    for row in RowReader::new(reader)? {
        if query.offer(row?) == Outcome::Stop {
            break;
        }
    }
    let result = query.finish();
    debug!(
        "Query matched {} rows (truncated: {})",
        result.rows.len(),
        result.truncated
    );
    Ok(result)
}
