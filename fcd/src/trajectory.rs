use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use geom::{Distance, LonLat};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, VehicleName};

/// One recorded position. `x` is longitude and `y` is latitude, in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub x: f64,
    pub y: f64,
    /// Absent when the input has no usable time column; arrival order stands in for time then.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<f64>,
}

/// The path of one vehicle. Point order is the path order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTrajectory")]
pub struct Trajectory {
    vehicle: VehicleName,
    points: Vec<TrajectoryPoint>,
}

// Deserialized input goes through Trajectory::new like everything else
#[derive(Deserialize)]
struct RawTrajectory {
    vehicle: VehicleName,
    points: Vec<TrajectoryPoint>,
}

impl TryFrom<RawTrajectory> for Trajectory {
    type Error = Error;

    fn try_from(raw: RawTrajectory) -> Result<Self> {
        Self::new(raw.vehicle, raw.points)
    }
}

impl Trajectory {
    /// A single point carries no line geometry, so at least 2 are required.
    pub fn new(vehicle: VehicleName, points: Vec<TrajectoryPoint>) -> Result<Self> {
        if points.len() < 2 {
            return Err(Error::TooFewPoints {
                vehicle: vehicle.to_string(),
                points: points.len(),
            });
        }
        Ok(Self { vehicle, points })
    }

    pub fn vehicle(&self) -> &VehicleName {
        &self.vehicle
    }

    pub fn points(&self) -> &[TrajectoryPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false, since construction requires 2 points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn start_time(&self) -> Option<f64> {
        self.points.first().and_then(|pt| pt.t)
    }

    pub fn end_time(&self) -> Option<f64> {
        self.points.last().and_then(|pt| pt.t)
    }

    /// Great-circle length along the path.
    pub fn length(&self) -> Distance {
        let mut total = Distance::ZERO;
        for pair in self.points.windows(2) {
            let pt1 = LonLat::new(pair[0].x, pair[0].y);
            let pt2 = LonLat::new(pair[1].x, pair[1].y);
            total += pt1.gps_dist(pt2);
        }
        total
    }

    pub fn to_geojson(&self) -> Feature {
        let coords = self.points.iter().map(|pt| vec![pt.x, pt.y]).collect();

        let mut properties = JsonObject::new();
        properties.insert("vehicle_id".to_string(), self.vehicle.as_str().into());
        properties.insert("point_count".to_string(), self.points.len().into());

        Feature {
            bbox: None,
            geometry: Some(Geometry::new(Value::LineString(coords))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

pub fn trajectories_to_geojson(trajectories: &[Trajectory]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: trajectories.iter().map(|t| t.to_geojson()).collect(),
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(x: f64, y: f64) -> TrajectoryPoint {
        TrajectoryPoint { x, y, t: None }
    }

    #[test]
    fn single_point_rejected() {
        let err = Trajectory::new(VehicleName::new("veh1"), vec![pt(1.0, 2.0)]).unwrap_err();
        assert!(matches!(err, Error::TooFewPoints { points: 1, .. }));
    }

    #[test]
    fn deserializing_checks_point_count() {
        let err = serde_json::from_str::<Trajectory>(r#"{"vehicle": "veh1", "points": []}"#)
            .unwrap_err();
        assert!(err.to_string().contains("at least 2"));

        let trajectory: Trajectory = serde_json::from_str(
            r#"{"vehicle": "veh1", "points": [{"x": 1, "y": 2, "t": 0.5}, {"x": 2, "y": 3}]}"#,
        )
        .unwrap();
        assert_eq!(trajectory.len(), 2);
        assert_eq!(trajectory.start_time(), Some(0.5));
        assert_eq!(trajectory.end_time(), None);
    }

    #[test]
    fn geojson_line_string() {
        let trajectory = Trajectory::new(
            VehicleName::new("veh0"),
            vec![pt(121.25, 31.29), pt(121.26, 31.30)],
        )
        .unwrap();
        let feature = trajectory.to_geojson();
        match feature.geometry.unwrap().value {
            Value::LineString(coords) => {
                assert_eq!(coords, vec![vec![121.25, 31.29], vec![121.26, 31.30]]);
            }
            other => panic!("expected a LineString, got {:?}", other),
        }
        let props = feature.properties.unwrap();
        assert_eq!(props["vehicle_id"], "veh0");
        assert_eq!(props["point_count"], 2);
    }

    #[test]
    fn length_grows_with_distance() {
        let short = Trajectory::new(
            VehicleName::new("a"),
            vec![pt(121.0, 31.0), pt(121.001, 31.0)],
        )
        .unwrap();
        let long = Trajectory::new(
            VehicleName::new("b"),
            vec![pt(121.0, 31.0), pt(121.01, 31.0)],
        )
        .unwrap();
        assert!(short.length() > Distance::ZERO);
        assert!(long.length() > short.length());
    }
}
