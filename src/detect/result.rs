use serde::{Deserialize, Serialize};

/// Integer pixel coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// One row of a model's detection table, in source-image pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    /// Model score in [0, 1].
    pub confidence: f64,
    pub name: String,
}

/// One object found in a frame, ready for rendering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_name: String,
    pub top_left: Point,
    pub bottom_right: Point,
    /// Percentage in [0, 100], two decimals.
    pub confidence: f64,
}

impl Detection {
    pub fn new(
        class_name: impl Into<String>,
        top_left: Point,
        bottom_right: Point,
        confidence: f64,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            top_left,
            bottom_right,
            confidence,
        }
    }
}

impl From<&RawDetection> for Detection {
    /// Coordinates truncate toward zero; confidence becomes a percentage.
    fn from(row: &RawDetection) -> Self {
        Self {
            class_name: row.name.clone(),
            top_left: Point::new(row.xmin as i32, row.ymin as i32),
            bottom_right: Point::new(row.xmax as i32, row.ymax as i32),
            confidence: confidence_percent(row.confidence),
        }
    }
}

/// `round(score * 100, 2)`, rounding the exact binary value with ties to even.
pub fn confidence_percent(score: f64) -> f64 {
    let percent = score * 100.0;
    format!("{:.2}", percent).parse().unwrap_or(percent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(xmin: f64, ymin: f64, xmax: f64, ymax: f64, confidence: f64) -> RawDetection {
        RawDetection {
            xmin,
            ymin,
            xmax,
            ymax,
            confidence,
            name: "can".to_string(),
        }
    }

    #[test]
    fn coordinates_truncate_instead_of_rounding() {
        let det = Detection::from(&row(10.9, 20.5, 99.99, 100.1, 0.5));
        assert_eq!(det.top_left, Point::new(10, 20));
        assert_eq!(det.bottom_right, Point::new(99, 100));
        assert_eq!(det.class_name, "can");
    }

    #[test]
    fn confidence_is_percent_with_two_decimals() {
        assert_eq!(confidence_percent(0.875), 87.5);
        assert_eq!(confidence_percent(0.123456), 12.35);
        assert_eq!(confidence_percent(1.0), 100.0);
        assert_eq!(confidence_percent(0.0), 0.0);
        assert_eq!(Detection::from(&row(0.0, 0.0, 1.0, 1.0, 0.91234)).confidence, 91.23);
    }

    #[test]
    fn confidence_ties_round_to_even() {
        assert_eq!(confidence_percent(0.87125), 87.12);
        assert_eq!(confidence_percent(0.00125), 0.12);
        assert_eq!(
            Detection::from(&row(0.0, 0.0, 1.0, 1.0, 0.87125)).confidence,
            87.12
        );
    }
}
