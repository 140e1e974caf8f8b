//! Derived player metrics
//!
//! Ratios and ratings computed from window totals. Trained models
//! depend on these exact formulas and clamp bounds.

/// Denominator floor for the touchdown/interception ratio
pub const TD_INT_FLOOR: f32 = 0.05;

/// Upper clamp for each passer-rating component
pub const RATING_COMPONENT_MAX: f32 = 2.375;

/// Largest reachable rating: four maxed components
pub const RATING_SCORE_MAX: f32 = 4.0 * RATING_COMPONENT_MAX / 6.0 * 100.0;

/// Completions per attempt, 0 without attempts
pub fn completion_percentage(completions: f32, attempts: f32) -> f32 {
    if attempts > 0.0 {
        completions / attempts
    } else {
        0.0
    }
}

/// Touchdowns over interceptions, with interceptions floored at 0.05
pub fn td_int_ratio(touchdowns: f32, interceptions: f32) -> f32 {
    touchdowns / interceptions.max(TD_INT_FLOOR)
}

/// Passer rating from window passing totals
///
/// Four components (completion rate, yards per attempt, touchdown rate,
/// interception rate), each clamped to `[0, 2.375]`, combined as
/// `(a + b + c + d) / 6 * 100`. Zero attempts rate 0.
pub fn rating_score(
    attempts: f32,
    completions: f32,
    yards: f32,
    touchdowns: f32,
    interceptions: f32,
) -> f32 {
    if attempts <= 0.0 {
        return 0.0;
    }

    let a = clamp_component((completions / attempts - 0.3) * 5.0);
    let b = clamp_component((yards / attempts - 3.0) * 0.25);
    let c = clamp_component(touchdowns / attempts * 20.0);
    let d = clamp_component(RATING_COMPONENT_MAX - interceptions / attempts * 25.0);

    (a + b + c + d) / 6.0 * 100.0
}

/// Receiving yards per reception, receptions floored at 1
pub fn yards_per_catch(receiving_yards: f32, receptions: f32) -> f32 {
    receiving_yards / receptions.max(1.0)
}

fn clamp_component(value: f32) -> f32 {
    value.clamp(0.0, RATING_COMPONENT_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_percentage() {
        assert_eq!(completion_percentage(15.0, 20.0), 0.75);
        assert_eq!(completion_percentage(5.0, 0.0), 0.0);
    }

    #[test]
    fn test_td_int_ratio_uses_floor() {
        assert_eq!(td_int_ratio(2.0, 0.0), 2.0 / 0.05);
        assert_eq!(td_int_ratio(2.0, 0.01), 2.0 / 0.05);
        assert_eq!(td_int_ratio(2.0, 1.0), 2.0);
        assert!(td_int_ratio(3.0, 0.0).is_finite());
    }

    #[test]
    fn test_rating_zero_attempts() {
        assert_eq!(rating_score(0.0, 10.0, 300.0, 4.0, 0.0), 0.0);
    }

    #[test]
    fn test_rating_reference_values() {
        // 20/30, 250 yds, 2 TD, 1 INT
        let a = (20.0f32 / 30.0 - 0.3) * 5.0;
        let b = (250.0f32 / 30.0 - 3.0) * 0.25;
        let c = 2.0f32 / 30.0 * 20.0;
        let d = 2.375f32 - 1.0 / 30.0 * 25.0;
        let expected = (a.min(2.375) + b.min(2.375) + c.min(2.375) + d) / 6.0 * 100.0;
        let rating = rating_score(30.0, 20.0, 250.0, 2.0, 1.0);
        assert!((rating - expected).abs() < 1e-4);
    }

    #[test]
    fn test_rating_is_bounded() {
        let perfect = rating_score(10.0, 10.0, 300.0, 10.0, 0.0);
        assert!((perfect - RATING_SCORE_MAX).abs() < 1e-3);

        let awful = rating_score(10.0, 0.0, 0.0, 0.0, 10.0);
        assert_eq!(awful, 0.0);

        for attempts in [1.0f32, 5.0, 20.0, 45.0] {
            for completions in [0.0f32, 3.0, 18.0, 45.0] {
                for ints in [0.0f32, 1.0, 4.0] {
                    let r = rating_score(attempts, completions, 180.0, 2.0, ints);
                    assert!((0.0..=RATING_SCORE_MAX).contains(&r), "rating {} out of range", r);
                }
            }
        }
    }

    #[test]
    fn test_yards_per_catch() {
        assert_eq!(yards_per_catch(60.0, 4.0), 15.0);
        assert_eq!(yards_per_catch(60.0, 5.0), 12.0);
        // a single catch is not floored
        assert_eq!(yards_per_catch(9.0, 1.0), 9.0);
        assert_eq!(yards_per_catch(0.0, 0.0), 0.0);
    }
}
