//! Distance metrics and the distance → similarity transform.

use serde::{Deserialize, Serialize};

/// Distance metric an index is built with. Fixed for the lifetime of an index
/// and persisted alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Squared Euclidean distance.
    #[default]
    L2,
    /// `1 - cos(a, b)`, in `[0, 2]`.
    Cosine,
}

impl Metric {
    /// Tag written to the index manifest.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L2 => "l2",
            Self::Cosine => "cosine",
        }
    }

    /// Distance between two vectors of equal length.
    ///
    /// Accumulates sequentially in `f32` so the result is identical across
    /// platforms; rankings depend on that.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::L2 => squared_l2(a, b),
            Self::Cosine => cosine_distance(a, b),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "l2" | "euclidean" => Ok(Self::L2),
            "cosine" => Ok(Self::Cosine),
            other => Err(format!("unknown metric '{other}'. Expected l2 | cosine")),
        }
    }
}

/// Map a distance to a similarity score: `1 / (1 + distance)`.
///
/// Monotonically decreasing, `1.0` at distance zero and in `(0, 1]` for every
/// non-negative distance. Used for every metric.
pub fn similarity(distance: f32) -> f64 {
    if distance.is_nan() {
        return 0.0;
    }
    1.0 / (1.0 + f64::from(distance).max(0.0))
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        let d = x - y;
        sum += d * d;
    }
    sum
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        // A zero vector has no direction; treat it as orthogonal to everything.
        return 1.0;
    }
    (1.0 - dot / denom).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_is_squared() {
        let d = Metric::L2.distance(&[0.0, 0.0], &[3.0, 4.0]);
        assert_eq!(d, 25.0);
    }

    #[test]
    fn cosine_of_identical_direction_is_zero() {
        let d = Metric::Cosine.distance(&[1.0, 2.0], &[2.0, 4.0]);
        assert!(d.abs() < 1e-6);
        let orthogonal = Metric::Cosine.distance(&[1.0, 0.0], &[0.0, 1.0]);
        assert!((orthogonal - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_with_zero_vector() {
        assert_eq!(Metric::Cosine.distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[test]
    fn similarity_is_monotonic_and_bounded() {
        assert_eq!(similarity(0.0), 1.0);
        assert_eq!(similarity(1.0), 0.5);
        let mut last = 1.0;
        for d in [0.1f32, 0.5, 2.0, 10.0, 1000.0] {
            let s = similarity(d);
            assert!(s < last);
            assert!(s > 0.0 && s <= 1.0);
            last = s;
        }
        assert_eq!(similarity(f32::NAN), 0.0);
    }

    #[test]
    fn metric_parses_tags() {
        assert_eq!("l2".parse::<Metric>().unwrap(), Metric::L2);
        assert_eq!("L2".parse::<Metric>().unwrap(), Metric::L2);
        assert_eq!("cosine".parse::<Metric>().unwrap(), Metric::Cosine);
        assert!("dot".parse::<Metric>().is_err());
    }

    #[test]
    fn metric_serde_tag_matches_display() {
        let json = serde_json::to_string(&Metric::Cosine).unwrap();
        assert_eq!(json, "\"cosine\"");
        assert_eq!(Metric::L2.to_string(), "l2");
    }
}
