use crate::{Error, Result};

pub const DELIMITER: char = ';';
pub const ID_COLUMN: &str = "vehicle_id";
pub const X_COLUMN: &str = "vehicle_x";
pub const Y_COLUMN: &str = "vehicle_y";
pub const TIME_COLUMN: &str = "timestep_time";

/// Field offsets resolved once from the header, so that per-row parsing never compares column
/// names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Columns {
    pub id: usize,
    pub x: usize,
    pub y: usize,
    pub time: Option<usize>,
    // A row needs at least this many fields
    width: usize,
}

/// The raw fields of interest from one row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fields<'a> {
    pub id: &'a str,
    pub x: &'a str,
    pub y: &'a str,
    /// None if the time column wasn't in the header, or the row ends before it.
    pub time: Option<&'a str>,
}

impl Columns {
    /// Requires the ID and position columns. The time column is picked up if present.
    pub fn resolve(header: &str) -> Result<Self> {
        Self::resolve_inner(header, false)
    }

    /// Like `resolve`, but the time column is mandatory too.
    pub fn resolve_timed(header: &str) -> Result<Self> {
        Self::resolve_inner(header, true)
    }

    fn resolve_inner(header: &str, need_time: bool) -> Result<Self> {
        let columns: Vec<String> = header
            .split(DELIMITER)
            .map(|name| name.trim().to_string())
            .collect();
        let find = |name: &str| columns.iter().position(|col| col == name);

        let id = find(ID_COLUMN);
        let x = find(X_COLUMN);
        let y = find(Y_COLUMN);
        let time = find(TIME_COLUMN);

        let mut missing = Vec::new();
        for (name, idx) in [(ID_COLUMN, id), (X_COLUMN, x), (Y_COLUMN, y)] {
            if idx.is_none() {
                missing.push(name);
            }
        }
        if need_time && time.is_none() {
            missing.push(TIME_COLUMN);
        }

        match (id, x, y) {
            (Some(id), Some(x), Some(y)) if missing.is_empty() => {
                // An optional time column doesn't make shorter rows malformed
                let mut width = 1 + id.max(x).max(y);
                if need_time {
                    width = width.max(1 + time.unwrap_or(0));
                }
                debug!(
                    "Resolved columns: id={}, x={}, y={}, time={:?}",
                    id, x, y, time
                );
                Ok(Self {
                    id,
                    x,
                    y,
                    time,
                    width,
                })
            }
            _ => Err(Error::Schema { columns, missing }),
        }
    }

    /// Walks the fields of one row once. None if the row is too short to hold every resolved
    /// column.
    pub fn extract<'a>(&self, line: &'a str) -> Option<Fields<'a>> {
        let mut id = None;
        let mut x = None;
        let mut y = None;
        let mut time = None;
        let mut count = 0;
        let last = self.width.max(self.time.map_or(0, |t| t + 1));
        for (idx, field) in line.split(DELIMITER).take(last).enumerate() {
            if idx == self.id {
                id = Some(field);
            }
            if idx == self.x {
                x = Some(field);
            }
            if idx == self.y {
                y = Some(field);
            }
            if Some(idx) == self.time {
                time = Some(field);
            }
            if idx < self.width {
                count += 1;
            }
        }
        if count < self.width {
            return None;
        }
        Some(Fields {
            id: id?,
            x: x?,
            y: y?,
            time,
        })
    }
}

/// Parses a coordinate or time field. Empty, unparseable, and non-finite values are all None.
pub(crate) fn parse_finite(field: &str) -> Option<f64> {
    let value: f64 = field.trim().parse().ok()?;
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_independent() {
        let cols = Columns::resolve("timestep_time;vehicle_y;speed;vehicle_id;vehicle_x").unwrap();
        assert_eq!((cols.id, cols.x, cols.y, cols.time), (3, 4, 1, Some(0)));

        let fields = cols.extract("1.5;31.2;9.0;veh7;121.4").unwrap();
        assert_eq!(fields.id, "veh7");
        assert_eq!(fields.x, "121.4");
        assert_eq!(fields.y, "31.2");
        assert_eq!(fields.time, Some("1.5"));
    }

    #[test]
    fn resolving_twice_is_stable() {
        let header = "vehicle_id;vehicle_x;vehicle_y";
        assert_eq!(
            Columns::resolve(header).unwrap(),
            Columns::resolve(header).unwrap()
        );
    }

    #[test]
    fn missing_column_reports_header() {
        match Columns::resolve("vehicle_id;vehicle_x;speed") {
            Err(Error::Schema { columns, missing }) => {
                assert_eq!(columns, vec!["vehicle_id", "vehicle_x", "speed"]);
                assert_eq!(missing, vec![Y_COLUMN]);
            }
            other => panic!("expected a schema error, got {:?}", other),
        }
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert!(Columns::resolve("Vehicle_ID;vehicle_x;vehicle_y").is_err());
    }

    #[test]
    fn time_only_required_when_asked() {
        let header = "vehicle_id;vehicle_x;vehicle_y";
        assert_eq!(Columns::resolve(header).unwrap().time, None);
        match Columns::resolve_timed(header) {
            Err(Error::Schema { missing, .. }) => assert_eq!(missing, vec![TIME_COLUMN]),
            other => panic!("expected a schema error, got {:?}", other),
        }
    }

    #[test]
    fn short_rows_are_rejected() {
        let cols = Columns::resolve("vehicle_id;a;vehicle_x;vehicle_y").unwrap();
        assert!(cols.extract("veh0;z;1.0").is_none());
        assert!(cols.extract("veh0;z;1.0;2.0").is_some());
    }

    #[test]
    fn optional_time_field_may_be_absent() {
        let cols = Columns::resolve("vehicle_id;vehicle_x;vehicle_y;timestep_time").unwrap();
        let fields = cols.extract("veh0;1;1").unwrap();
        assert_eq!((fields.id, fields.x, fields.y), ("veh0", "1", "1"));
        assert_eq!(fields.time, None);
        assert_eq!(cols.extract("veh0;1;1;2.5").unwrap().time, Some("2.5"));

        // Unless the time column is required
        let timed = Columns::resolve_timed("vehicle_id;vehicle_x;vehicle_y;timestep_time").unwrap();
        assert!(timed.extract("veh0;1;1").is_none());
    }

    #[test]
    fn finite_only() {
        assert_eq!(parse_finite(" 1.25 "), Some(1.25));
        assert_eq!(parse_finite("NaN"), None);
        assert_eq!(parse_finite("inf"), None);
        assert_eq!(parse_finite(""), None);
        assert_eq!(parse_finite("abc"), None);
    }
}
