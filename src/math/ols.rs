//! Ordinary least squares.
//!
//! Every regression in the calibration pipeline is a straight line
//! `y = slope·x + intercept`. We build the two-column design matrix
//! `[x, 1]` and solve it with SVD, which also handles tall systems (many
//! more observations than parameters).
//!
//! Degenerate inputs (fewer than two points, constant x, non-finite values)
//! are rejected up front: SVD would otherwise happily return a minimum-norm
//! solution that looks like a valid fit.

use nalgebra::{DMatrix, DVector};

use crate::error::AppError;

/// Relative variance below which x is considered constant.
const X_VARIANCE_EPS: f64 = 1e-12;

/// Result of a straight-line fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation coefficient of the fitted points.
    pub r: f64,
    pub n: usize,
}

impl LineFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Fit `y = slope·x + intercept` by ordinary least squares.
pub fn fit_line(xs: &[f64], ys: &[f64]) -> Result<LineFit, AppError> {
    if xs.len() != ys.len() {
        return Err(AppError::numeric(format!(
            "Regression input length mismatch: {} x values vs {} y values.",
            xs.len(),
            ys.len()
        )));
    }
    let n = xs.len();
    if n < 2 {
        return Err(AppError::numeric(format!(
            "Regression needs at least 2 points, got {n}."
        )));
    }
    if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
        return Err(AppError::numeric("Regression input contains non-finite values."));
    }

    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;
    let sxx: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
    let syy: f64 = ys.iter().map(|y| (y - mean_y).powi(2)).sum();
    let sxy: f64 = xs
        .iter()
        .zip(ys)
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();

    let scale = xs.iter().map(|x| x * x).sum::<f64>().max(1.0);
    if sxx <= X_VARIANCE_EPS * scale {
        return Err(AppError::numeric(
            "Regression x values are constant; slope is undefined.",
        ));
    }

    // A flat response has slope exactly zero; SVD would leave rounding noise
    // whose sign callers gate on.
    if ys.iter().all(|&y| y == ys[0]) {
        return Ok(LineFit {
            slope: 0.0,
            intercept: ys[0],
            r: 0.0,
            n,
        });
    }

    let mut design = DMatrix::<f64>::zeros(n, 2);
    for (i, &x) in xs.iter().enumerate() {
        design[(i, 0)] = x;
        design[(i, 1)] = 1.0;
    }
    let rhs = DVector::from_row_slice(ys);

    let beta = solve_least_squares(&design, &rhs)
        .ok_or_else(|| AppError::numeric("Least squares solve failed (ill-conditioned system)."))?;

    let r = if syy > 0.0 {
        sxy / (sxx * syy).sqrt()
    } else {
        0.0
    };

    Ok(LineFit {
        slope: beta[0],
        intercept: beta[1],
        r,
        n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn fit_line_matches_closed_form() {
        let xs = [1.0, 1.2, 1.5, 1.9, 2.4];
        let ys = [0.31, 0.36, 0.39, 0.50, 0.58];

        // slope = Sxy / Sxx, intercept = ȳ - slope·x̄
        let n = xs.len() as f64;
        let mx = xs.iter().sum::<f64>() / n;
        let my = ys.iter().sum::<f64>() / n;
        let sxy: f64 = xs.iter().zip(&ys).map(|(x, y)| (x - mx) * (y - my)).sum();
        let sxx: f64 = xs.iter().map(|x| (x - mx) * (x - mx)).sum();
        let slope = sxy / sxx;
        let intercept = my - slope * mx;

        let fit = fit_line(&xs, &ys).unwrap();
        assert!((fit.slope - slope).abs() < 1e-10, "slope {} vs {slope}", fit.slope);
        assert!((fit.intercept - intercept).abs() < 1e-10);
        assert_eq!(fit.n, 5);
        assert!(fit.r > 0.9);
    }

    #[test]
    fn fit_line_exact_line_has_unit_correlation() {
        let xs = [1.0, 2.0, 3.0];
        let ys = [-1.0, -3.0, -5.0];
        let fit = fit_line(&xs, &ys).unwrap();
        assert!((fit.slope + 2.0).abs() < 1e-10);
        assert!((fit.intercept - 1.0).abs() < 1e-10);
        assert!((fit.r + 1.0).abs() < 1e-10);
        assert!((fit.predict(4.0) + 7.0).abs() < 1e-10);
    }

    #[test]
    fn fit_line_flat_response_has_zero_slope() {
        let fit = fit_line(&[1.1, 1.5, 1.9], &[0.37, 0.37, 0.37]).unwrap();
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.intercept, 0.37);
        assert_eq!(fit.r, 0.0);
    }

    #[test]
    fn fit_line_rejects_degenerate_inputs() {
        assert_eq!(fit_line(&[1.0], &[2.0]).unwrap_err().exit_code(), 4);
        assert!(fit_line(&[1.3, 1.3, 1.3], &[0.1, 0.2, 0.3]).is_err());
        assert!(fit_line(&[1.0, 2.0], &[0.1]).is_err());
        assert!(fit_line(&[1.0, f64::NAN], &[0.1, 0.2]).is_err());
    }
}
