//! Trade admission gates.
//!
//! Pure checks evaluated before any venue command is issued. All bounds are
//! inclusive: a strike sitting exactly on a limit is accepted.

use chrono::{DateTime, Duration, Utc};

use delta_vault_core::errors::VaultError;
use delta_vault_core::types::{StrategyDetail, StrikeView};

/// Runs every admission gate against a strike snapshot.
pub fn admit(
    detail: &StrategyDetail,
    view: &StrikeView,
    last_trade_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), VaultError> {
    check_delta(detail, view.delta)?;
    check_vol(detail, view.gwav_vol)?;
    check_vol_variance(detail, view.gwav_vol, view.vol)?;
    check_expiry(detail, view.time_to_expiry(now))?;
    check_interval(detail, last_trade_at, now)?;
    Ok(())
}

/// `|delta - target_delta| <= max_delta_gap`.
pub fn check_delta(detail: &StrategyDetail, delta: f64) -> Result<(), VaultError> {
    if (delta - detail.target_delta).abs() > detail.max_delta_gap {
        tracing::debug!(
            delta,
            target = detail.target_delta,
            gap = detail.max_delta_gap,
            "Strike rejected: delta out of range"
        );
        return Err(VaultError::StrikeOutOfDeltaRange {
            delta,
            target: detail.target_delta,
            gap: detail.max_delta_gap,
        });
    }
    Ok(())
}

/// `min_vol <= vol <= max_vol`.
pub fn check_vol(detail: &StrategyDetail, vol: f64) -> Result<(), VaultError> {
    if vol < detail.min_vol || vol > detail.max_vol {
        tracing::debug!(
            vol,
            min = detail.min_vol,
            max = detail.max_vol,
            "Strike rejected: vol out of range"
        );
        return Err(VaultError::VolatilityOutOfRange {
            vol,
            min: detail.min_vol,
            max: detail.max_vol,
        });
    }
    Ok(())
}

/// `|gwav_vol - vol| <= max_vol_variance`. A wide gap means the averaged
/// reading is stale against the live market.
pub fn check_vol_variance(
    detail: &StrategyDetail,
    gwav_vol: f64,
    vol: f64,
) -> Result<(), VaultError> {
    let variance = (gwav_vol - vol).abs();
    if variance > detail.max_vol_variance {
        tracing::debug!(
            gwav_vol,
            vol,
            max = detail.max_vol_variance,
            "Strike rejected: vol variance too high"
        );
        return Err(VaultError::VolVarianceTooHigh {
            variance,
            max: detail.max_vol_variance,
        });
    }
    Ok(())
}

/// `min_time_to_expiry <= tte <= max_time_to_expiry`.
pub fn check_expiry(detail: &StrategyDetail, tte: Duration) -> Result<(), VaultError> {
    if tte < detail.min_time_to_expiry() || tte > detail.max_time_to_expiry() {
        return Err(VaultError::ExpiryOutOfRange {
            tte_secs: tte.num_seconds(),
            min_secs: detail.min_time_to_expiry_secs as i64,
            max_secs: detail.max_time_to_expiry_secs as i64,
        });
    }
    Ok(())
}

/// Rejects a same-strike trade less than `min_trade_interval` after the
/// previous one. Exactly the interval is accepted.
pub fn check_interval(
    detail: &StrategyDetail,
    last_trade_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), VaultError> {
    if let Some(last) = last_trade_at {
        if now - last < detail.min_trade_interval() {
            return Err(VaultError::TradeTooSoon);
        }
    }
    Ok(())
}
