//! KML 2.2 rendering of classified tracks.
//!
//! Stops become pushpin placemarks; the altitude track becomes a path split
//! into coloured `LineString` segments wherever the terrain colour changes.

use std::fmt::Write;

use crate::track::{ElevationPoint, KinematicPoint, StopCategory, TerrainCategory};

const ERRAND_ICON: &str = "http://maps.google.com/mapfiles/kml/pushpin/ylw-pushpin.png";
const ROLLING_ICON: &str = "http://maps.google.com/mapfiles/kml/pushpin/pink-pushpin.png";

/// Pin description and icon for a stop category; `None` for unclassified points.
pub fn stop_pin(category: StopCategory) -> Option<(&'static str, &'static str)> {
    match category {
        StopCategory::Unclassified => None,
        StopCategory::ErrandStop => Some(("Stop For Errand", ERRAND_ICON)),
        StopCategory::RollingStop => Some(("Stop/rolling stop for sign or light", ROLLING_ICON)),
    }
}

/// KML `aabbggrr` line colour for a terrain category.
pub fn terrain_color(category: TerrainCategory) -> Option<&'static str> {
    match category {
        TerrainCategory::Unclassified => None,
        TerrainCategory::Ascending => Some("501400FF"),
        TerrainCategory::Descending => Some("5014B400"),
        TerrainCategory::Flat => Some("50F0FF14"),
    }
}

/// Render the complete document in memory.
pub fn render_kml(speed: &[KinematicPoint], altitude: &[ElevationPoint]) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<kml xmlns=\"http://www.opengis.net/kml/2.2\">\n<Document>\n");

    for point in speed {
        if let Some((description, icon)) = stop_pin(point.category) {
            render_pin(&mut out, description, icon, point.longitude, point.latitude);
        }
    }

    for (color, coords) in path_segments(altitude) {
        render_segment(&mut out, color, &coords);
    }

    out.push_str("</Document>\n</kml>\n");
    out
}

/// Split the altitude track into runs of one colour.
///
/// Unclassified points keep the colour of the segment they follow; points
/// before the first classified one form an unstyled segment.
pub fn path_segments(altitude: &[ElevationPoint]) -> Vec<(Option<&'static str>, Vec<(f64, f64)>)> {
    let mut segments: Vec<(Option<&'static str>, Vec<(f64, f64)>)> = Vec::new();
    let mut current: Option<&'static str> = None;
    for point in altitude {
        if let Some(color) = terrain_color(point.category) {
            current = Some(color);
        }
        match segments.last_mut() {
            Some((color, coords)) if *color == current => {
                coords.push((point.longitude, point.latitude))
            }
            _ => segments.push((current, vec![(point.longitude, point.latitude)])),
        }
    }
    segments
}

fn render_pin(out: &mut String, description: &str, icon: &str, lon: f64, lat: f64) {
    let _ = write!(
        out,
        "<Placemark>\n\
         <description>{description}</description>\n\
         <Style><IconStyle><scale>1.5</scale><Icon><href>{icon}</href></Icon></IconStyle></Style>\n\
         <Point><coordinates>{lon},{lat},0</coordinates></Point>\n\
         </Placemark>\n"
    );
}

fn render_segment(out: &mut String, color: Option<&str>, coords: &[(f64, f64)]) {
    out.push_str("<Placemark>\n");
    if let Some(color) = color {
        let _ = write!(
            out,
            "<Style><LineStyle><colorMode>normal</colorMode><color>{color}</color><width>5</width></LineStyle></Style>\n"
        );
    }
    out.push_str("<LineString>\n<coordinates>\n");
    for (lon, lat) in coords {
        let _ = writeln!(out, "{lon},{lat},0");
    }
    out.push_str("</coordinates>\n</LineString>\n</Placemark>\n");
}
