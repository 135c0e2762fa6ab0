use anyhow::Result;
use geojson::{FeatureCollection, GeoJson};

/// Reads road geometry exported as GeoJSON. Features are passed along as-is; only their number is
/// checked.
pub fn load(path: &str) -> Result<FeatureCollection> {
    let raw = fs_err::read_to_string(path)?;
    let collection = match raw.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => collection,
        GeoJson::Feature(feature) => FeatureCollection {
            bbox: None,
            features: vec![feature],
            foreign_members: None,
        },
        GeoJson::Geometry(_) => bail!("{} is a bare geometry, not a feature collection", path),
    };
    if collection.features.is_empty() {
        warn!("Road network {} has no features", path);
    } else {
        info!(
            "Road network {} has {} features",
            path,
            abstutil::prettyprint_usize(collection.features.len())
        );
    }
    Ok(collection)
}
