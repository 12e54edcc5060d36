//! Ordinary least-squares line fitting.

use serde::{Deserialize, Serialize};

use super::round_to;

/// Decimal places kept on regression coefficients.
pub const REGRESSION_PRECISION: u32 = 4;

/// An (x, y) observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Fitted line `y = slope * x + intercept` with its coefficient of determination.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
    /// Always within [0, 1].
    pub r_squared: f64,
}

impl Regression {
    /// Evaluate the fitted line at `x`.
    pub fn predict(&self, x: f64) -> f64 {
        predict(self, x)
    }
}

/// Least-squares fit over the finite points.
///
/// Fewer than two points, or a vertical line (all x equal), yields the zero
/// regression. A horizontal line has R² = 1. Coefficients are rounded to
/// [`REGRESSION_PRECISION`] decimals.
pub fn linear_regression(points: &[Point]) -> Regression {
    let pts: Vec<Point> = points
        .iter()
        .copied()
        .filter(|p| p.x.is_finite() && p.y.is_finite())
        .collect();
    if pts.len() < 2 {
        return Regression::default();
    }

    let n = pts.len() as f64;
    let mean_x = pts.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = pts.iter().map(|p| p.y).sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syy = 0.0;
    for p in &pts {
        let dx = p.x - mean_x;
        let dy = p.y - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }

    if sxx.abs() < 1e-12 {
        return Regression::default();
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let r_squared = if syy.abs() < 1e-12 {
        1.0
    } else {
        let ss_res: f64 = pts
            .iter()
            .map(|p| {
                let residual = p.y - (slope * p.x + intercept);
                residual * residual
            })
            .sum();
        1.0 - ss_res / syy
    };

    Regression {
        slope: round_to(slope, REGRESSION_PRECISION),
        intercept: round_to(intercept, REGRESSION_PRECISION),
        r_squared: round_to(r_squared.clamp(0.0, 1.0), REGRESSION_PRECISION),
    }
}

/// `slope * x + intercept`.
pub fn predict(regression: &Regression, x: f64) -> f64 {
    regression.slope * x + regression.intercept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(m: f64, b: f64, n: usize) -> Vec<Point> {
        (0..n).map(|i| Point::new(i as f64, m * i as f64 + b)).collect()
    }

    #[test]
    fn exact_line_recovers_coefficients() {
        let r = linear_regression(&line(2.5, -1.0, 10));
        assert_eq!(r.slope, 2.5);
        assert_eq!(r.intercept, -1.0);
        assert_eq!(r.r_squared, 1.0);
    }

    #[test]
    fn too_few_points() {
        assert_eq!(linear_regression(&[]), Regression::default());
        assert_eq!(linear_regression(&[Point::new(1.0, 2.0)]), Regression::default());
    }

    #[test]
    fn vertical_line_is_degenerate() {
        let pts = [Point::new(3.0, 1.0), Point::new(3.0, 5.0), Point::new(3.0, 9.0)];
        assert_eq!(linear_regression(&pts), Regression::default());
    }

    #[test]
    fn horizontal_line_has_perfect_fit() {
        let r = linear_regression(&line(0.0, 4.0, 5));
        assert_eq!(r.slope, 0.0);
        assert_eq!(r.intercept, 4.0);
        assert_eq!(r.r_squared, 1.0);
    }

    #[test]
    fn noisy_line_has_partial_fit() {
        let pts = [
            Point::new(0.0, 1.0),
            Point::new(1.0, 3.0),
            Point::new(2.0, 2.0),
            Point::new(3.0, 5.0),
        ];
        let r = linear_regression(&pts);
        assert!(r.slope > 0.0);
        assert!(r.r_squared > 0.0 && r.r_squared < 1.0);
    }

    #[test]
    fn non_finite_points_are_dropped() {
        let mut pts = line(1.0, 0.0, 4);
        pts.push(Point::new(f64::NAN, 1.0));
        pts.push(Point::new(9.0, f64::INFINITY));
        let r = linear_regression(&pts);
        assert_eq!(r.slope, 1.0);
    }

    #[test]
    fn predict_evaluates_line() {
        let r = Regression { slope: 2.0, intercept: 1.0, r_squared: 1.0 };
        assert_eq!(predict(&r, 3.0), 7.0);
        assert_eq!(r.predict(0.0), 1.0);
    }
}
