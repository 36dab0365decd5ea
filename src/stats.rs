//! Small descriptive-statistics toolkit shared by the analyzers.
//!
//! Conventions follow the usual dataframe defaults: `std_dev` is the sample
//! estimator (n - 1), `population_std_dev` divides by n, and `percentile`
//! interpolates linearly between closest ranks.

// ---

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

/// Sample standard deviation; undefined below two values.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / values.len() as f64).sqrt())
}

pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

/// Percentile `p` in `[0, 100]` with linear interpolation.
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    // ---
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Ordinary least-squares fit of `y` against `x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r: f64,
    pub p_value: f64,
}

/// Fit `y = slope * x + intercept`.
///
/// Needs at least two points and some spread in `x`. A flat `y` yields
/// `r = 0` and `p = 1`. The p-value is two-sided for the null hypothesis
/// of zero slope, using Student's t with n - 2 degrees of freedom.
pub fn linear_regression(x: &[f64], y: &[f64]) -> Option<LinearFit> {
    // ---
    let n = x.len();
    if n < 2 || n != y.len() {
        return None;
    }
    let mx = mean(x)?;
    let my = mean(y)?;

    let sxx: f64 = x.iter().map(|v| (v - mx).powi(2)).sum();
    let syy: f64 = y.iter().map(|v| (v - my).powi(2)).sum();
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum();

    if sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    let intercept = my - slope * mx;
    let r = if syy == 0.0 {
        0.0
    } else {
        (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0)
    };

    let df = n as f64 - 2.0;
    let p_value = if n == 2 {
        // a line through two points always fits exactly
        if r == 0.0 { 1.0 } else { 0.0 }
    } else if (1.0 - r.abs()) < 1e-15 {
        0.0
    } else {
        let t = r * (df / ((1.0 - r) * (1.0 + r))).sqrt();
        student_t_two_sided(t, df)
    };

    Some(LinearFit {
        slope,
        intercept,
        r,
        p_value,
    })
}

/// P(|T| >= |t|) for Student's t with `df` degrees of freedom.
fn student_t_two_sided(t: f64, df: f64) -> f64 {
    let x = df / (df + t * t);
    regularized_incomplete_beta(df / 2.0, 0.5, x).clamp(0.0, 1.0)
}

/// I_x(a, b) via the continued-fraction expansion (Lentz's method).
fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    // ---
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();

    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    // ---
    const MAX_ITER: usize = 300;
    const EPS: f64 = 1e-14;
    const TINY: f64 = 1e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// Lanczos approximation of ln Γ(x) for x > 0.
fn ln_gamma(x: f64) -> f64 {
    // ---
    const G: f64 = 7.0;
    const COEF: [f64; 9] = [
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

    if x < 0.5 {
        // reflection
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut acc = COEF[0];
    for (i, c) in COEF.iter().enumerate().skip(1) {
        acc += c / (x + i as f64);
    }
    let t = x + G + 0.5;
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + acc.ln()
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_basic_moments() {
        // ---
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_abs_diff_eq!(mean(&v).unwrap(), 5.0);
        assert_abs_diff_eq!(population_std_dev(&v).unwrap(), 2.0);
        assert_abs_diff_eq!(std_dev(&v).unwrap(), 2.138_089_935, epsilon = 1e-9);
        assert_abs_diff_eq!(median(&v).unwrap(), 4.5);
        assert_eq!(min(&v), Some(2.0));
        assert_eq!(max(&v), Some(9.0));
    }

    #[test]
    fn test_empty_and_singleton_inputs() {
        // ---
        assert_eq!(mean(&[]), None);
        assert_eq!(std_dev(&[3.0]), None);
        assert_eq!(percentile(&[], 50.0), None);
        assert_eq!(percentile(&[3.0], 95.0), Some(3.0));
    }

    #[test]
    fn test_percentile_interpolates() {
        // ---
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_abs_diff_eq!(percentile(&v, 75.0).unwrap(), 3.25);
        assert_abs_diff_eq!(percentile(&v, 25.0).unwrap(), 1.75);
        assert_abs_diff_eq!(percentile(&v, 100.0).unwrap(), 4.0);
    }

    #[test]
    fn test_regression_perfect_line() {
        // ---
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [1.0, 3.0, 5.0, 7.0, 9.0];
        let fit = linear_regression(&x, &y).unwrap();
        assert_abs_diff_eq!(fit.slope, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(fit.intercept, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(fit.r, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(fit.p_value, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_regression_p_value_matches_reference() {
        // ---
        // y has r = 0.8 against x; t = 2.309, df = 3 gives p ≈ 0.1041
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.0, 3.0, 2.0, 5.0, 4.0];
        let fit = linear_regression(&x, &y).unwrap();
        assert_abs_diff_eq!(fit.r, 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(fit.slope, 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(fit.p_value, 0.1041, epsilon = 1e-3);
    }

    #[test]
    fn test_regression_flat_series() {
        // ---
        let fit = linear_regression(&[0.0, 1.0, 2.0], &[4.0, 4.0, 4.0]).unwrap();
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.r, 0.0);
        assert_abs_diff_eq!(fit.p_value, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_regression_needs_spread_in_x() {
        // ---
        assert!(linear_regression(&[1.0, 1.0], &[2.0, 3.0]).is_none());
        assert!(linear_regression(&[1.0], &[2.0]).is_none());
    }

    #[test]
    fn test_ln_gamma_known_values() {
        // ---
        assert_abs_diff_eq!(ln_gamma(1.0), 0.0, epsilon = 1e-10);
        assert_abs_diff_eq!(ln_gamma(5.0), 24f64.ln(), epsilon = 1e-10);
        assert_abs_diff_eq!(ln_gamma(0.5), std::f64::consts::PI.sqrt().ln(), epsilon = 1e-10);
    }
}
