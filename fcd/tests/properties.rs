//! Property tests over generated FCD streams.

use std::io::Cursor;

use fcd::{
    ingest_reader, query, BoundingBox, CancelToken, IngestLimits, IngestOptions, LineTokenizer,
    QuerySpec, Row, VehicleName,
};
use proptest::prelude::*;

/// Mostly valid coordinates, with some that must be skipped.
fn coord_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        8 => (-180.0f64..180.0).prop_map(|v| v.to_string()),
        1 => Just("NaN".to_string()),
        1 => Just("".to_string()),
    ]
}

/// Rows of (vehicle index, x, y, t).
fn rows_strategy() -> impl Strategy<Value = Vec<(u8, String, String, f64)>> {
    prop::collection::vec(
        (0u8..8, coord_strategy(), coord_strategy(), 0.0f64..100.0),
        0..200,
    )
}

fn render(rows: &[(u8, String, String, f64)]) -> String {
    let mut out = String::from("vehicle_id;vehicle_x;vehicle_y;timestep_time\n");
    for (veh, x, y, t) in rows {
        out.push_str(&format!("veh{};{};{};{}\n", veh, x, y, t));
    }
    out
}

fn parsed_rows(rows: &[(u8, String, String, f64)]) -> Vec<Row> {
    rows.iter()
        .filter_map(|(veh, x, y, t)| {
            let x: f64 = x.parse().ok().filter(|v: &f64| v.is_finite())?;
            let y: f64 = y.parse().ok().filter(|v: &f64| v.is_finite())?;
            Some(Row::new(format!("veh{}", veh), x, y, *t))
        })
        .collect()
}

proptest! {
    #[test]
    fn caps_are_never_exceeded(
        rows in rows_strategy(),
        max_vehicles in 1usize..10,
        max_points in 1usize..150,
        chunk_size in 1usize..64,
    ) {
        let input = render(&rows);
        let result = ingest_reader(
            Cursor::new(input.as_bytes()),
            IngestLimits::new(max_vehicles, max_points).unwrap(),
            &IngestOptions { chunk_size },
            &CancelToken::new(),
        ).unwrap();

        prop_assert!(result.stats.vehicles <= max_vehicles);
        prop_assert!(result.stats.points <= max_points);
        prop_assert!(result.trajectories.len() <= max_vehicles);
        let total: usize = result.trajectories.iter().map(|t| t.len()).sum();
        prop_assert!(total <= max_points);
        for trajectory in &result.trajectories {
            prop_assert!(trajectory.len() >= 2);
        }
    }

    #[test]
    fn chunking_does_not_change_the_result(
        rows in rows_strategy(),
        chunk_size in 1usize..32,
    ) {
        let input = render(&rows);
        let run = |chunk_size: usize| {
            ingest_reader(
                Cursor::new(input.as_bytes()),
                IngestLimits::new(100, 10_000).unwrap(),
                &IngestOptions { chunk_size },
                &CancelToken::new(),
            ).unwrap().trajectories
        };
        prop_assert_eq!(run(chunk_size), run(input.len() + 1));
    }

    #[test]
    fn tokenizer_splits_anywhere(
        text in "[a-z;é\u{4e2d}\r\n]{0,80}",
        cuts in prop::collection::vec(0usize..80, 0..6),
    ) {
        let bytes = text.as_bytes();
        let mut whole = LineTokenizer::new();
        let mut expected: Vec<String> = whole.feed(bytes).collect();
        expected.extend(whole.finish());

        let mut cuts: Vec<usize> = cuts.into_iter().map(|c| c.min(bytes.len())).collect();
        cuts.sort_unstable();
        let mut pieces = LineTokenizer::new();
        let mut actual = Vec::new();
        let mut start = 0;
        for cut in cuts {
            actual.extend(pieces.feed(&bytes[start..cut]));
            start = cut;
        }
        actual.extend(pieces.feed(&bytes[start..]));
        actual.extend(pieces.finish());

        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn queries_are_deterministic(
        rows in rows_strategy(),
        time_start in 0.0f64..100.0,
        span in -10.0f64..100.0,
        sample_every in 0.0f64..10.0,
        max_points in -5i64..50,
        use_bbox in any::<bool>(),
    ) {
        let rows = parsed_rows(&rows);
        let spec = QuerySpec {
            vehicle_ids: Some(vec![VehicleName::new("veh1"), VehicleName::new("veh2")].into_iter().collect()),
            time_start,
            time_end: time_start + span,
            bbox: if use_bbox { Some(BoundingBox::new(-90.0, -90.0, 90.0, 90.0)) } else { None },
            max_points,
            sample_every,
        };
        let first = query(&spec, rows.clone());
        let second = query(&spec, rows);
        prop_assert_eq!(&first, &second);

        if max_points > 0 {
            prop_assert!(first.rows.len() as i64 <= max_points);
        }
        for row in &first.rows {
            prop_assert!(row.t >= spec.time_start && row.t <= spec.time_end);
            prop_assert!(row.vehicle_id.as_str() == "veh1" || row.vehicle_id.as_str() == "veh2");
        }
    }
}
