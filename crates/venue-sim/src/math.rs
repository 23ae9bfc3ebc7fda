//! Minimal Black-Scholes pricing for the simulated venue (r = 0).

use std::f64::consts::SQRT_2;

/// Abramowitz & Stegun 7.1.26 polynomial approximation of erf,
/// accurate to ~1.5e-7 which is plenty for a test venue.
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + 0.327_591_1 * x);
    let y = 1.0
        - (((((1.061_405_429 * t - 1.453_152_027) * t) + 1.421_413_741) * t - 0.284_496_736)
            * t
            + 0.254_829_592)
            * t
            * (-x * x).exp();

    sign * y
}

/// Standard normal CDF.
#[must_use]
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / SQRT_2))
}

fn d1(spot: f64, strike: f64, vol: f64, t_years: f64) -> f64 {
    ((spot / strike).ln() + 0.5 * vol * vol * t_years) / (vol * t_years.sqrt())
}

/// European call delta; intrinsic step function at or past expiry.
#[must_use]
pub fn call_delta(spot: f64, strike: f64, vol: f64, t_years: f64) -> f64 {
    if t_years <= 0.0 || vol <= 0.0 {
        return if spot > strike { 1.0 } else { 0.0 };
    }
    norm_cdf(d1(spot, strike, vol, t_years))
}

/// European call price per contract; intrinsic value at or past expiry.
#[must_use]
pub fn call_price(spot: f64, strike: f64, vol: f64, t_years: f64) -> f64 {
    if t_years <= 0.0 || vol <= 0.0 {
        return (spot - strike).max(0.0);
    }
    let d1 = d1(spot, strike, vol, t_years);
    let d2 = d1 - vol * t_years.sqrt();
    spot * norm_cdf(d1) - strike * norm_cdf(d2)
}
