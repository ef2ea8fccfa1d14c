use serde::{Deserialize, Serialize};

use crate::pow::{BASE_POINTS, MAGIC};
use crate::timestamp;

const HOUR_MS: i64 = 3_600_000;
const DECAY_STEP_HOURS: f64 = 24.0;

/// A rung on the predefined difficulty ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyLevel {
    pub name: &'static str,
    pub prefix: &'static str,
    pub points: u64,
}

pub const STANDARD: DifficultyLevel = DifficultyLevel { name: "standard", prefix: "21e8", points: 15 };
pub const HARD: DifficultyLevel = DifficultyLevel { name: "hard", prefix: "21e80", points: 60 };
pub const VERY_HARD: DifficultyLevel = DifficultyLevel { name: "very-hard", prefix: "21e800", points: 240 };
pub const EXTREME: DifficultyLevel = DifficultyLevel { name: "extreme", prefix: "21e8000", points: 960 };
pub const INSANE: DifficultyLevel = DifficultyLevel { name: "insane", prefix: "21e80000", points: 3840 };

/// Ascending by points. Selection walks this in reverse and never invents
/// a rung finer than these.
pub const LADDER: [DifficultyLevel; 5] = [STANDARD, HARD, VERY_HARD, EXTREME, INSANE];

impl DifficultyLevel {
    pub fn requirement(&self) -> Requirement {
        Requirement { prefix: self.prefix.to_string(), points: self.points }
    }
}

/// What a target currently demands of a hash: the literal prefix it must
/// start with and the minimum point score it must earn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    pub prefix: String,
    pub points: u64,
}

impl Requirement {
    /// Custom requirement from any valid `21e80*` prefix.
    pub fn from_prefix(prefix: &str) -> Option<Requirement> {
        let points = points_for_prefix(prefix);
        if points == 0 {
            return None;
        }
        Some(Requirement { prefix: prefix.to_string(), points })
    }
}

/// `^21e80*$`, length >= 4.
pub fn is_valid_prefix(prefix: &str) -> bool {
    prefix.len() >= 4
        && prefix.starts_with(MAGIC)
        && prefix[MAGIC.len()..].bytes().all(|b| b == b'0')
}

/// Point value a prefix is worth: 15 for `21e8`, x4 per appended zero.
/// Invalid prefixes are worth 0.
pub fn points_for_prefix(prefix: &str) -> u64 {
    if !is_valid_prefix(prefix) {
        return 0;
    }
    let zeros = (prefix.len() - MAGIC.len()) as u32;
    BASE_POINTS.saturating_mul(4u64.saturating_pow(zeros))
}

/// Current requirement for a thread, from its reply count, creation time
/// (unix ms) and the site-wide multiplier.
pub fn thread_difficulty(reply_count: u64, created_at: i64, multiplier: f64) -> Requirement {
    thread_difficulty_at(reply_count, created_at, timestamp(), multiplier)
}

/// Deterministic variant: `now` supplied by the caller.
pub fn thread_difficulty_at(
    reply_count: u64,
    created_at: i64,
    now: i64,
    multiplier: f64,
) -> Requirement {
    let base = match reply_count {
        0..=9 => STANDARD,
        10..=49 => HARD,
        50..=99 => VERY_HARD,
        _ => EXTREME,
    };

    let multiplier = if multiplier > 0.0 { multiplier } else { 1.0 };
    let mut target = base.points as f64 * multiplier;

    // created_at <= 0 means the caller had no timestamp; no decay then.
    let age_hours = if created_at <= 0 {
        0.0
    } else {
        (now - created_at).max(0) as f64 / HOUR_MS as f64
    };
    let decay = 1 + (age_hours / DECAY_STEP_HOURS).floor() as u64;
    target *= decay as f64;

    LADDER
        .iter()
        .rev()
        .find(|level| level.points as f64 <= target)
        .unwrap_or(&LADDER[0])
        .requirement()
}

/// A thread with 100+ replies locks once its aggregate PoW falls behind
/// 1000 points per reply; new content-target mining is rejected until the
/// total catches up.
pub fn is_locked(reply_count: u64, total_pow: u64) -> bool {
    if reply_count < 100 {
        return false;
    }
    total_pow < reply_count.saturating_mul(1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_follow_the_ladder() {
        assert_eq!(points_for_prefix("21e8"), 15);
        assert_eq!(points_for_prefix("21e80"), 60);
        assert_eq!(points_for_prefix("21e800"), 240);
        assert_eq!(points_for_prefix("21e8000"), 960);
        assert_eq!(points_for_prefix("21e80000"), 3840);
        assert_eq!(points_for_prefix("xyz"), 0);
        assert_eq!(points_for_prefix("21e7"), 0);
        assert_eq!(points_for_prefix("21e801"), 0);
    }

    #[test]
    fn prefix_validity() {
        assert!(is_valid_prefix("21e8"));
        assert!(is_valid_prefix("21e800"));
        assert!(!is_valid_prefix("21e7"));
        assert!(!is_valid_prefix(""));
        assert!(!is_valid_prefix("21e"));
    }

    #[test]
    fn custom_requirement_from_prefix() {
        let req = Requirement::from_prefix("21e800").unwrap();
        assert_eq!(req.points, 240);
        assert!(Requirement::from_prefix("dead").is_none());
    }

    #[test]
    fn reply_brackets_pick_the_base_level() {
        let now = timestamp();
        for replies in 0..10 {
            assert_eq!(thread_difficulty_at(replies, now, now, 1.0).prefix, "21e8");
        }
        assert_eq!(thread_difficulty_at(15, now, now, 1.0).points, 60);
        assert_eq!(thread_difficulty_at(50, now, now, 1.0).points, 240);
        assert_eq!(thread_difficulty_at(120, now, now, 1.0).points, 960);
    }

    #[test]
    fn age_decay_escalates_along_the_ladder() {
        let now = timestamp();
        let two_days = now - 48 * HOUR_MS;
        let ten_days = now - 240 * HOUR_MS;

        // 48h old: decay = 3, target 45, still below the next rung.
        assert_eq!(thread_difficulty_at(0, two_days, now, 1.0).points, 15);
        // 10 days old: decay = 11, target 165, escalates to HARD.
        assert_eq!(thread_difficulty_at(0, ten_days, now, 1.0).points, 60);
        // HARD base, 4 days old: decay = 5, target 300, escalates to VERY_HARD.
        let four_days = now - 96 * HOUR_MS;
        assert_eq!(thread_difficulty_at(15, four_days, now, 1.0).points, 240);
    }

    #[test]
    fn decay_is_monotonic_in_age() {
        let now = timestamp();
        let fresh = thread_difficulty_at(10, now, now, 1.0);
        let old = thread_difficulty_at(10, now - 30 * 24 * HOUR_MS, now, 1.0);
        assert!(old.points >= fresh.points);
    }

    #[test]
    fn missing_or_negative_created_at_means_no_decay() {
        let now = timestamp();
        assert_eq!(thread_difficulty_at(0, 0, now, 1.0).points, 15);
        assert_eq!(thread_difficulty_at(0, -5, now, 1.0).points, 15);
        // Clock skew: created in the future also means no decay.
        assert_eq!(thread_difficulty_at(0, now + HOUR_MS, now, 1.0).points, 15);
    }

    #[test]
    fn multiplier_scales_the_target() {
        let now = timestamp();
        assert_eq!(thread_difficulty_at(0, now, now, 4.0).points, 60);
        // Non-positive multipliers fall back to 1.0.
        assert_eq!(thread_difficulty_at(0, now, now, 0.0).points, 15);
        // An absurd multiplier still resolves to the top rung.
        assert_eq!(thread_difficulty_at(120, now, now, 1e12).points, 3840);
    }

    #[test]
    fn lock_thresholds() {
        assert!(!is_locked(50, 0));
        assert!(is_locked(150, 100_000));
        assert!(!is_locked(150, 200_000));
        assert!(!is_locked(99, 0));
        assert!(is_locked(100, 99_999));
    }
}
