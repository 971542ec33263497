//! Thermocline detection by the gradient method.
//!
//! The thermocline is located at the steepest temperature change between
//! neighbouring depths (`|dT/dz|`), then widened in both directions while the
//! gradient stays above [`GRADIENT_THRESHOLD`].

use std::collections::BTreeMap;

use serde::Serialize;

use super::model::Dataset;
use super::stats::round_to;

/// Minimum gradient (°C/m) considered part of a thermocline.
pub const GRADIENT_THRESHOLD: f64 = 0.02;

/// One (depth, temperature) sample of a profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfilePoint {
    pub depth: f64,
    pub temperature: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Layer {
    pub name: &'static str,
    pub depth_range: (f64, f64),
    pub temp_range: (f64, f64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thermocline {
    pub top_depth: f64,
    pub bottom_depth: f64,
    pub center_depth: f64,
    pub max_gradient: f64,
    pub layers: [Layer; 3],
}

struct Gradient {
    depth: f64,
    gradient: f64,
}

fn layer(name: &'static str, points: &[ProfilePoint]) -> Layer {
    if points.is_empty() {
        return Layer {
            name,
            depth_range: (0.0, 0.0),
            temp_range: (0.0, 0.0),
        };
    }
    let min_max = |f: fn(&ProfilePoint) -> f64| {
        points.iter().map(f).fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        })
    };
    let (d_lo, d_hi) = min_max(|p| p.depth);
    let (t_lo, t_hi) = min_max(|p| p.temperature);
    Layer {
        name,
        depth_range: (d_lo, d_hi),
        temp_range: (round_to(t_lo, 1), round_to(t_hi, 1)),
    }
}

/// Detect the thermocline of one profile.  `None` with fewer than three
/// points or when no gradient reaches the threshold.
pub fn detect(points: &[ProfilePoint]) -> Option<Thermocline> {
    if points.len() < 3 {
        return None;
    }
    let mut sorted: Vec<ProfilePoint> = points
        .iter()
        .copied()
        .filter(|p| p.depth.is_finite() && p.temperature.is_finite())
        .collect();
    sorted.sort_by(|a, b| a.depth.total_cmp(&b.depth));

    let gradients: Vec<Gradient> = sorted
        .windows(2)
        .filter_map(|w| {
            let dz = w[1].depth - w[0].depth;
            if dz <= 0.0 {
                return None;
            }
            Some(Gradient {
                depth: (w[0].depth + w[1].depth) / 2.0,
                gradient: (w[0].temperature - w[1].temperature).abs() / dz,
            })
        })
        .collect();

    // First maximum wins on ties.
    let max_idx = gradients
        .iter()
        .enumerate()
        .fold(None::<usize>, |best, (i, g)| match best {
            Some(b) if gradients[b].gradient >= g.gradient => Some(b),
            _ => Some(i),
        })?;
    let max_gradient = gradients[max_idx].gradient;
    if max_gradient < GRADIENT_THRESHOLD {
        return None;
    }

    let mut top = max_idx;
    while top > 0 && gradients[top - 1].gradient > GRADIENT_THRESHOLD {
        top -= 1;
    }
    let mut bottom = max_idx;
    while bottom + 1 < gradients.len() && gradients[bottom + 1].gradient > GRADIENT_THRESHOLD {
        bottom += 1;
    }

    let top_depth = gradients[top].depth;
    let bottom_depth = gradients[bottom].depth;
    let center_depth = gradients[max_idx].depth;

    let surface: Vec<ProfilePoint> = sorted.iter().copied().filter(|p| p.depth < top_depth).collect();
    let thermo: Vec<ProfilePoint> = sorted
        .iter()
        .copied()
        .filter(|p| p.depth >= top_depth && p.depth <= bottom_depth)
        .collect();
    let deep: Vec<ProfilePoint> = sorted.iter().copied().filter(|p| p.depth > bottom_depth).collect();

    Some(Thermocline {
        top_depth: round_to(top_depth, 1),
        bottom_depth: round_to(bottom_depth, 1),
        center_depth: round_to(center_depth, 1),
        max_gradient: round_to(max_gradient, 3),
        layers: [
            layer("Surface Layer", &surface),
            layer("Thermocline", &thermo),
            layer("Deep Layer", &deep),
        ],
    })
}

/// Depth/temperature profiles grouped by station.
pub fn station_profiles(dataset: &Dataset) -> BTreeMap<String, Vec<ProfilePoint>> {
    let mut profiles: BTreeMap<String, Vec<ProfilePoint>> = BTreeMap::new();
    for r in &dataset.records {
        if let (Some(station), Some(depth), Some(temperature)) =
            (r.station_id.as_ref(), r.depth, r.temperature)
        {
            profiles
                .entry(station.clone())
                .or_default()
                .push(ProfilePoint { depth, temperature });
        }
    }
    profiles
}

/// Thermocline per station (`None` where none was found).
pub fn detect_by_station(dataset: &Dataset) -> BTreeMap<String, Option<Thermocline>> {
    station_profiles(dataset)
        .into_iter()
        .map(|(station, points)| {
            let found = detect(&points);
            (station, found)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(pairs: &[(f64, f64)]) -> Vec<ProfilePoint> {
        pairs
            .iter()
            .map(|&(depth, temperature)| ProfilePoint { depth, temperature })
            .collect()
    }

    #[test]
    fn finds_the_steepest_layer() {
        // Mixed layer to 20 m, sharp drop to 60 m, slow decline below.
        let points = profile(&[
            (80.0, 7.9),
            (0.0, 18.0),
            (10.0, 18.0),
            (20.0, 17.9),
            (30.0, 15.0),
            (40.0, 12.0),
            (50.0, 10.0),
            (60.0, 8.5),
            (70.0, 8.2),
        ]);
        let t = detect(&points).unwrap();
        assert_eq!(t.center_depth, 35.0);
        assert_eq!(t.max_gradient, 0.3);
        assert_eq!(t.top_depth, 25.0);
        assert_eq!(t.bottom_depth, 75.0);
        assert_eq!(t.layers[0].depth_range, (0.0, 20.0));
        assert_eq!(t.layers[1].depth_range, (30.0, 70.0));
        assert_eq!(t.layers[2].depth_range, (80.0, 80.0));
        assert_eq!(t.layers[2].temp_range, (7.9, 7.9));
    }

    #[test]
    fn isothermal_profile_has_no_thermocline() {
        let points = profile(&[(0.0, 10.0), (50.0, 10.1), (100.0, 10.2)]);
        assert_eq!(detect(&points), None);
    }

    #[test]
    fn too_few_points() {
        assert_eq!(detect(&profile(&[(0.0, 20.0), (10.0, 5.0)])), None);
    }

    #[test]
    fn duplicate_depths_are_skipped() {
        let points = profile(&[(0.0, 20.0), (0.0, 19.0), (10.0, 10.0)]);
        let t = detect(&points).unwrap();
        assert_eq!(t.center_depth, 5.0);
    }
}
