#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod network;

use abstutil::Timer;
use anyhow::Result;
use geojson::{FeatureCollection, GeoJson};
use structopt::StructOpt;

use fcd::{
    ingest_reader, trajectories_to_geojson, BoundingBox, CancelToken, Dataset, FileSource,
    IngestLimits, IngestOptions, QuerySpec, Source, VehicleName,
};

#[derive(StructOpt)]
#[structopt(about = "Turns SUMO floating car data into renderable vehicle trajectories")]
enum Command {
    /// Stream an FCD file into per-vehicle trajectories, stopping at the caps
    Ingest {
        /// The path to a semicolon-delimited FCD CSV file
        #[structopt(long)]
        fcd: String,
        /// Stop before admitting more than this many distinct vehicles
        #[structopt(long)]
        max_vehicles: usize,
        /// Stop after this many points in total
        #[structopt(long)]
        max_points: usize,
        /// Bytes to read at a time
        #[structopt(long, default_value = "65536")]
        chunk_size: usize,
        /// A GeoJSON road network to include, untouched, ahead of the trajectories
        #[structopt(long)]
        network: Option<String>,
        /// Write the GeoJSON here instead of stdout
        #[structopt(long)]
        output: Option<String>,
    },
    /// Filter, sample, and cap individual points
    Query {
        #[structopt(long)]
        fcd: String,
        /// A JSON request like {"timeStart": 0, "timeEnd": 60}. Overrides the other flags.
        #[structopt(long)]
        request: Option<String>,
        #[structopt(long, default_value = "0")]
        time_start: f64,
        #[structopt(long, default_value = "inf")]
        time_end: f64,
        /// west,south,east,north in degrees
        #[structopt(long)]
        bbox: Option<String>,
        /// Repeat to select several vehicles. By default, all vehicles are included.
        #[structopt(long = "vehicle")]
        vehicles: Vec<String>,
        /// 0 or less means no limit
        #[structopt(long, default_value = "0", allow_hyphen_values = true)]
        max_points: i64,
        /// Keep at most one point per vehicle per this many seconds. 0 disables sampling.
        #[structopt(long, default_value = "0")]
        sample_every: f64,
        /// Print semicolon-delimited CSV instead of JSON
        #[structopt(long)]
        csv: bool,
    },
    /// Summarize an FCD file
    Meta {
        #[structopt(long)]
        fcd: String,
    },
    /// List vehicles active in a time window
    Vehicles {
        #[structopt(long)]
        fcd: String,
        #[structopt(long)]
        time_start: f64,
        #[structopt(long)]
        time_end: f64,
        /// west,south,east,north in degrees
        #[structopt(long)]
        bbox: Option<String>,
        #[structopt(long, default_value = "5000")]
        limit: usize,
    },
    /// The full time-sorted path of one vehicle
    Trajectory {
        #[structopt(long)]
        fcd: String,
        #[structopt(long)]
        vehicle: String,
        #[structopt(long)]
        time_start: Option<f64>,
        #[structopt(long)]
        time_end: Option<f64>,
        /// 0 means no limit
        #[structopt(long, default_value = "0")]
        max_points: usize,
    },
}

fn main() {
    abstutil::logger::setup();

    let cmd = Command::from_iter(abstutil::cli_args());
    if let Err(err) = run(cmd) {
        error!("{:#}", err);
        std::process::exit(1);
    }
}

fn run(cmd: Command) -> Result<()> {
    match cmd {
        Command::Ingest {
            fcd,
            max_vehicles,
            max_points,
            chunk_size,
            network,
            output,
        } => {
            let mut timer = Timer::new("ingest FCD");
            let limits = IngestLimits::new(max_vehicles, max_points)?;
            let source = FileSource::new(&fcd);

            timer.start(format!("stream {}", fcd));
            let ingested = ingest_reader(
                source.open()?,
                limits,
                &IngestOptions { chunk_size },
                &CancelToken::new(),
            )?;
            timer.stop(format!("stream {}", fcd));
            // Partial results are still written, but the status says so
            println!("{}", ingested.describe());

            let mut collection = match network {
                Some(path) => {
                    timer.start("load road network");
                    let roads = network::load(&path)?;
                    timer.stop("load road network");
                    roads
                }
                None => FeatureCollection {
                    bbox: None,
                    features: Vec::new(),
                    foreign_members: None,
                },
            };
            collection
                .features
                .extend(trajectories_to_geojson(&ingested.trajectories).features);
            write_output(output, GeoJson::FeatureCollection(collection).to_string())?;
        }
        Command::Query {
            fcd,
            request,
            time_start,
            time_end,
            bbox,
            vehicles,
            max_points,
            sample_every,
            csv,
        } => {
            let spec = match request {
                Some(path) => serde_json::from_slice(&fs_err::read(path)?)?,
                None => QuerySpec {
                    vehicle_ids: if vehicles.is_empty() {
                        None
                    } else {
                        Some(vehicles.into_iter().map(VehicleName::new).collect())
                    },
                    time_start,
                    time_end,
                    bbox: bbox.map(|b| parse_bbox(&b)).transpose()?,
                    max_points,
                    sample_every,
                },
            };
            let result = Dataset::new(FileSource::new(fcd)).query(&spec)?;
            if result.truncated {
                warn!(
                    "Result truncated at {} points",
                    abstutil::prettyprint_usize(result.rows.len())
                );
            }
            if csv {
                print!("{}", result.export_to_csv()?);
            } else {
                let response = serde_json::json!({
                    "rows": result.rows,
                    "truncated": result.truncated,
                    "vehicleIds": result.vehicle_ids(),
                    "stats": result.stats(&spec),
                });
                println!("{}", serde_json::to_string(&response)?);
            }
        }
        Command::Meta { fcd } => {
            let meta = Dataset::new(FileSource::new(fcd)).meta()?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
        }
        Command::Vehicles {
            fcd,
            time_start,
            time_end,
            bbox,
            limit,
        } => {
            let bbox = bbox.map(|b| parse_bbox(&b)).transpose()?;
            let ids = Dataset::new(FileSource::new(fcd)).vehicles(time_start, time_end, bbox, limit)?;
            println!(
                "{}",
                serde_json::to_string(&serde_json::json!({ "vehicleIds": ids }))?
            );
        }
        Command::Trajectory {
            fcd,
            vehicle,
            time_start,
            time_end,
            max_points,
        } => {
            let window = match (time_start, time_end) {
                (Some(start), Some(end)) => Some((start, end)),
                (None, None) => None,
                _ => bail!("--time-start and --time-end must be given together"),
            };
            let trajectory = Dataset::new(FileSource::new(fcd)).trajectory(
                &VehicleName::new(vehicle),
                window,
                max_points,
            )?;
            let response = serde_json::json!({
                "vehicleId": trajectory.vehicle_id,
                "truncated": trajectory.truncated,
                "pointCount": trajectory.point_count,
                "geojson": trajectory.to_geojson(),
                "points": trajectory.points,
            });
            println!("{}", serde_json::to_string(&response)?);
        }
    }
    Ok(())
}

fn parse_bbox(raw: &str) -> Result<BoundingBox> {
    let parts = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| anyhow!("bad bbox {}: {}", raw, err))?;
    if parts.len() != 4 {
        bail!("bbox must be west,south,east,north, not {}", raw);
    }
    Ok(BoundingBox::new(parts[0], parts[1], parts[2], parts[3]))
}

fn write_output(path: Option<String>, contents: String) -> Result<()> {
    match path {
        Some(path) => {
            fs_err::write(&path, contents)?;
            info!("Wrote {}", path);
        }
        None => println!("{}", contents),
    }
    Ok(())
}
