//! Small numeric helpers for descriptor scoring: evenly spaced ramps and the
//! Pearson correlation with its two-sided p-value.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Pearson correlation coefficient with its two-sided p-value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    /// Coefficient `r` in `[-1, 1]`.
    pub coefficient: f64,
    /// Probability of an |r| at least this large for uncorrelated normal data.
    pub p_value: f64,
}

/// `n` evenly spaced values from `start` to `stop`, both included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Pearson correlation between two equal-length sequences.
///
/// Returns `None` for fewer than two points, unequal lengths, non-finite
/// input, or when either sequence is constant.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<Correlation> {
    let n = x.len();
    if n < 2 || n != y.len() {
        return None;
    }

    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if !(cov.is_finite() && var_x.is_finite() && var_y.is_finite()) {
        return None;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    let coefficient = (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0);
    Some(Correlation {
        coefficient,
        p_value: pearson_p_value(coefficient, n),
    })
}

/// Two-sided p-value of `r` over `n` samples (Student t with n-2 dof).
///
/// With `t² = r²·df / (1 - r²)` the tail probability reduces to the
/// regularized incomplete beta `I_{1-r²}(df/2, 1/2)`.
pub fn pearson_p_value(r: f64, n: usize) -> f64 {
    if n <= 2 {
        return 1.0;
    }
    let df = (n - 2) as f64;
    let x = 1.0 - r * r;
    regularized_beta(df / 2.0, 0.5, x).clamp(0.0, 1.0)
}

/// Regularized incomplete beta function `I_x(a, b)`.
fn regularized_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();
    // The continued fraction converges fast only below the mean.
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

/// Modified Lentz evaluation of the incomplete beta continued fraction.
fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 300;
    const EPS: f64 = 1e-15;
    const TINY: f64 = 1e-300;

    let guard = |v: f64| if v.abs() < TINY { TINY } else { v };

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 / guard(1.0 - qab * x / qap);
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 / guard(1.0 + aa * d);
        c = guard(1.0 + aa / c);
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 / guard(1.0 + aa * d);
        c = guard(1.0 + aa / c);
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// ln Γ(x) for x > 0 via the Lanczos approximation (g = 7, n = 9).
fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        // Reflection formula: Γ(x) = π / (sin(πx) · Γ(1-x))
        (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x)
    } else {
        const COEFFICIENTS: [f64; 9] = [
            0.999_999_999_999_809_9,
            676.520_368_121_885_1,
            -1_259.139_216_722_402_8,
            771.323_428_777_653_1,
            -176.615_029_162_140_6,
            12.507_343_278_686_905,
            -0.138_571_095_265_720_12,
            9.984_369_578_019_572e-6,
            1.505_632_735_149_311_6e-7,
        ];
        let g = 7.0_f64;
        let z = x - 1.0;
        let mut ag = COEFFICIENTS[0];
        for (i, &c) in COEFFICIENTS.iter().enumerate().skip(1) {
            ag += c / (z + i as f64);
        }
        let t = z + g + 0.5;
        0.5 * (2.0 * PI).ln() + (z + 0.5) * t.ln() - t + ag.ln()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_linspace_endpoints() {
        assert_eq!(linspace(0.0, 1.0, 5), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(1.0, 0.0, 3), vec![1.0, 0.5, 0.0]);
        assert_eq!(linspace(1.0, 0.0, 1), vec![1.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_ln_gamma_factorial() {
        assert_abs_diff_eq!(ln_gamma(5.0), 24.0_f64.ln(), epsilon = 1e-10);
        assert_abs_diff_eq!(ln_gamma(1.0), 0.0, epsilon = 1e-10);
        assert_abs_diff_eq!(ln_gamma(0.5), PI.sqrt().ln(), epsilon = 1e-10);
    }

    #[test]
    fn test_pearson_perfect() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let up = pearson(&x, &[10.0, 20.0, 30.0, 40.0]).unwrap();
        assert_abs_diff_eq!(up.coefficient, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(up.p_value, 0.0, epsilon = 1e-12);

        let down = pearson(&x, &[4.0, 3.0, 2.0, 1.0]).unwrap();
        assert_abs_diff_eq!(down.coefficient, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pearson_rejects_degenerate_input() {
        assert!(pearson(&[1.0], &[2.0]).is_none());
        assert!(pearson(&[1.0, 2.0], &[2.0, 2.0]).is_none());
        assert!(pearson(&[1.0, 2.0, 3.0], &[2.0, 2.0]).is_none());
        assert!(pearson(&[1.0, 2.0, 3.0], &[2.0, f64::NAN, 4.0]).is_none());
        assert!(pearson(&[1.0, 2.0, 3.0], &[2.0, f64::INFINITY, 4.0]).is_none());
    }

    #[test]
    fn test_two_points_have_p_value_one() {
        let c = pearson(&[0.0, 1.0], &[3.0, 5.0]).unwrap();
        assert_abs_diff_eq!(c.coefficient, 1.0, epsilon = 1e-12);
        assert_eq!(c.p_value, 1.0);
    }

    #[test]
    fn test_p_value_closed_forms() {
        // dof = 1: p = (2/π)·asin(sqrt(1 - r²))
        assert_abs_diff_eq!(pearson_p_value(0.5, 3), 2.0 / 3.0, epsilon = 1e-9);
        // dof = 2: p = 1 - |r|
        assert_abs_diff_eq!(pearson_p_value(0.8, 4), 0.2, epsilon = 1e-9);
        assert_abs_diff_eq!(pearson_p_value(-0.3, 4), 0.7, epsilon = 1e-9);
        assert_abs_diff_eq!(pearson_p_value(0.0, 10), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_p_value_shrinks_with_more_samples() {
        let few = pearson_p_value(0.6, 8);
        let many = pearson_p_value(0.6, 80);
        assert!(many < few);
        assert!(many < 1e-6);
    }
}
