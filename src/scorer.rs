//! Token entry scoring
//!
//! Pure heuristics over a single market snapshot. No network, no clock:
//! pair age is derived from the timestamps embedded in the snapshot.

use crate::dexscreener::PairSnapshot;

/// Score at or above which a token is accepted for entry
pub const ACCEPT_THRESHOLD: f64 = 10.0;

/// 5m crash that rejects a token outright
const CRASH_REJECT_PCT: f64 = -30.0;

/// Scoring verdict for one snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub accepted: bool,
    /// Composite score, clamped to [0, 100]
    pub score: f64,
    pub reasons: Vec<String>,
}

impl ScoreOutcome {
    fn rejected(reason: String) -> Self {
        Self {
            accepted: false,
            score: 0.0,
            reasons: vec![reason],
        }
    }
}

/// Score a token snapshot for entry
pub fn score(snapshot: &PairSnapshot) -> ScoreOutcome {
    // Hard rejects first
    if snapshot.change_m5 <= CRASH_REJECT_PCT {
        return ScoreOutcome::rejected(format!(
            "5m change {:.1}% at or below crash threshold {:.0}%",
            snapshot.change_m5, CRASH_REJECT_PCT
        ));
    }

    if snapshot.buy_sell_ratio_m5() < 0.5 && snapshot.change_m5 < -10.0 {
        return ScoreOutcome::rejected(format!(
            "dump in progress: 5m ratio {:.2} with 5m change {:.1}%",
            snapshot.buy_sell_ratio_m5(),
            snapshot.change_m5
        ));
    }

    let mut reasons = Vec::new();
    let mut total = 0.0;

    let age = age_points(snapshot.age_hours());
    if age > 0.0 {
        reasons.push(format!(
            "age {:.1}h: +{:.1}",
            snapshot.age_hours(),
            age
        ));
    }
    total += age;

    let trend = trend_points(snapshot, &mut reasons);
    total += trend;

    let pressure = buy_pressure_points(snapshot.buy_sell_ratio_h1());
    if pressure > 0.0 {
        reasons.push(format!(
            "1h buy pressure {:.2}: +{:.1}",
            snapshot.buy_sell_ratio_h1(),
            pressure
        ));
    }
    total += pressure;

    let turnover = volume_liquidity_points(snapshot.volume_liquidity_ratio());
    if turnover != 0.0 {
        reasons.push(format!(
            "volume/liquidity {:.2}: {:+.1}",
            snapshot.volume_liquidity_ratio(),
            turnover
        ));
    }
    total += turnover;

    let score = total.clamp(0.0, 100.0);

    ScoreOutcome {
        accepted: score >= ACCEPT_THRESHOLD,
        score,
        reasons,
    }
}

/// Age component, 0-30 points: fresher pairs score higher
fn age_points(age_hours: f64) -> f64 {
    if age_hours <= 24.0 {
        // 30 at listing, 20 at 24h
        30.0 - (age_hours / 24.0) * 10.0
    } else if age_hours <= 72.0 {
        // 20 at 24h down to 5 at 72h
        20.0 - ((age_hours - 24.0) / 48.0) * 15.0
    } else {
        0.0
    }
}

/// Price-trend component, 0-40 points
fn trend_points(snapshot: &PairSnapshot, reasons: &mut Vec<String>) -> f64 {
    let mut points = 0.0;

    if snapshot.change_m5 > 0.0 {
        let p = (snapshot.change_m5 * 2.0).min(20.0);
        reasons.push(format!("5m change {:.1}%: +{:.1}", snapshot.change_m5, p));
        points += p;
    }

    if snapshot.change_h1 > 0.0 {
        let p = (snapshot.change_h1 * 0.5).min(15.0);
        reasons.push(format!("1h change {:.1}%: +{:.1}", snapshot.change_h1, p));
        points += p;
    }

    if snapshot.change_m5 > 0.0 && snapshot.change_h1 > 0.0 && snapshot.change_h24 > 0.0 {
        reasons.push("uptrend across 5m/1h/24h: +5.0".to_string());
        points += 5.0;
    }

    points
}

/// Buy-pressure component, 0-20 points: 5 per unit of 1h ratio above 1
fn buy_pressure_points(ratio_h1: f64) -> f64 {
    if ratio_h1 > 1.0 {
        ((ratio_h1 - 1.0) * 5.0).min(20.0)
    } else {
        0.0
    }
}

/// Volume/liquidity component, -10 to +10 points.
///
/// Healthy turnover earns points; extreme turnover relative to pooled
/// liquidity is a pump-and-dump signal and is penalized.
fn volume_liquidity_points(ratio: f64) -> f64 {
    if ratio >= 10.0 {
        -10.0
    } else if ratio >= 0.5 {
        (ratio * 2.0).min(10.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use crate::dexscreener::PairSnapshot;

    fn snapshot() -> PairSnapshot {
        let now = Utc::now();
        PairSnapshot {
            token_address: "mint".to_string(),
            token_name: "Test".to_string(),
            token_symbol: "TEST".to_string(),
            price_native: 0.001,
            price_usd: 0.15,
            liquidity_usd: 20_000.0,
            volume_h24: 40_000.0,
            change_m5: 4.0,
            change_h1: 10.0,
            change_h24: 25.0,
            buys_m5: 30,
            sells_m5: 20,
            buys_h1: 200,
            sells_h1: 100,
            pair_created_at: now - Duration::hours(6),
            observed_at: now,
        }
    }

    #[test]
    fn test_crash_rejected_regardless_of_other_fields() {
        let mut snap = snapshot();
        snap.change_m5 = -35.0;
        snap.buys_m5 = 1000;
        snap.liquidity_usd = 1_000_000.0;

        let outcome = score(&snap);
        assert!(!outcome.accepted);
        assert_eq!(outcome.score, 0.0);
    }

    #[test]
    fn test_dump_in_progress_rejected() {
        let mut snap = snapshot();
        snap.change_m5 = -15.0;
        snap.buys_m5 = 4;
        snap.sells_m5 = 10; // ratio 0.4

        let outcome = score(&snap);
        assert!(!outcome.accepted);
        assert_eq!(outcome.score, 0.0);
    }

    #[test]
    fn test_mild_dip_with_buyers_not_rejected() {
        let mut snap = snapshot();
        snap.change_m5 = -15.0;
        snap.buys_m5 = 30;
        snap.sells_m5 = 20; // ratio 1.5, no dump signal

        let outcome = score(&snap);
        assert!(outcome.score > 0.0);
    }

    #[test]
    fn test_scorer_is_pure() {
        let snap = snapshot();
        let a = score(&snap);
        let b = score(&snap);
        assert_eq!(a.accepted, b.accepted);
        assert_eq!(a.score, b.score);
    }

    #[test]
    fn test_healthy_fresh_token_accepted() {
        let outcome = score(&snapshot());
        assert!(outcome.accepted);
        // age ~27.5 + m5 8 + h1 5 + uptrend 5 + pressure 5 + turnover 4
        assert!(outcome.score > 50.0, "score was {}", outcome.score);
        assert!(outcome.score <= 100.0);
    }

    #[test]
    fn test_age_decay() {
        assert!((age_points(0.0) - 30.0).abs() < 1e-9);
        assert!((age_points(24.0) - 20.0).abs() < 1e-9);
        assert!((age_points(48.0) - 12.5).abs() < 1e-9);
        assert!((age_points(72.0) - 5.0).abs() < 1e-9);
        assert_eq!(age_points(73.0), 0.0);
    }

    #[test]
    fn test_trend_caps() {
        let mut snap = snapshot();
        snap.change_m5 = 50.0; // capped at 20
        snap.change_h1 = 100.0; // capped at 15
        let mut reasons = Vec::new();
        // 20 + 15 + 5 all-positive bonus
        assert!((trend_points(&snap, &mut reasons) - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_buy_pressure_cap() {
        assert_eq!(buy_pressure_points(0.8), 0.0);
        assert!((buy_pressure_points(2.0) - 5.0).abs() < 1e-9);
        assert!((buy_pressure_points(100.0) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_excessive_turnover_penalized() {
        assert_eq!(volume_liquidity_points(12.0), -10.0);
        assert!((volume_liquidity_points(3.0) - 6.0).abs() < 1e-9);
        assert_eq!(volume_liquidity_points(0.2), 0.0);
    }

    #[test]
    fn test_score_never_negative() {
        let mut snap = snapshot();
        // Old pair, flat trend, wash-trade turnover: only the -10 penalty applies
        snap.pair_created_at = snap.observed_at - Duration::hours(100);
        snap.change_m5 = 0.0;
        snap.change_h1 = 0.0;
        snap.change_h24 = 0.0;
        snap.buys_h1 = 100;
        snap.sells_h1 = 100;
        snap.volume_h24 = 500_000.0;

        let outcome = score(&snap);
        assert_eq!(outcome.score, 0.0);
        assert!(!outcome.accepted);
    }
}
