//! Recency-decayed visit scoring.
//!
//! Visits are grouped per entity per local calendar day. A day `d` days ago
//! contributes `visits * base^d`; the summed contributions are multiplied by a
//! consistency bonus `1 + weight * min(distinct_days - 1, cap)` so habitual
//! revisits outrank one-off bursts.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::models::Visit;
use crate::storage::config::{MAX_RETENTION_DAYS, retention_horizon};

/// Per-day decay factor
pub const DEFAULT_DECAY_BASE: f64 = 0.95;

/// Bonus added per extra distinct active day
pub const DEFAULT_CONSISTENCY_WEIGHT: f64 = 0.1;

/// Extra distinct days beyond which the bonus stops growing
pub const DEFAULT_CONSISTENCY_CAP: u32 = 14;

/// Largest accepted observer offset, in minutes either side of UTC
pub const MAX_UTC_OFFSET_MINUTES: i32 = 1_439;

/// Ranking settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RankingConfig {
    /// Per-day decay factor, in (0, 1)
    pub decay_base: f64,

    /// Bonus per extra distinct active day
    pub consistency_weight: f64,

    /// Maximum number of extra days rewarded
    pub consistency_cap: u32,

    /// Visits older than this are ignored; entities without visits report
    /// `now - retention_days` as their last visit
    pub retention_days: i64,

    /// Observer's offset from UTC in minutes; the host's local offset if unset
    pub utc_offset_minutes: Option<i32>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            decay_base: DEFAULT_DECAY_BASE,
            consistency_weight: DEFAULT_CONSISTENCY_WEIGHT,
            consistency_cap: DEFAULT_CONSISTENCY_CAP,
            retention_days: 90,
            utc_offset_minutes: None,
        }
    }
}

impl RankingConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.decay_base > 0.0 && self.decay_base < 1.0) {
            return Err("decay_base must be between 0 and 1 (exclusive)".to_string());
        }
        if self.consistency_weight < 0.0 {
            return Err("consistency_weight must not be negative".to_string());
        }
        if self.retention_days <= 0 || self.retention_days > MAX_RETENTION_DAYS {
            return Err(format!(
                "retention_days must be between 1 and {}",
                MAX_RETENTION_DAYS
            ));
        }
        if let Some(minutes) = self.utc_offset_minutes {
            if fixed_offset(minutes).is_none() {
                return Err(format!("utc_offset_minutes {} is out of range", minutes));
            }
        }
        Ok(())
    }

    /// The observer's offset used to split visits into days
    pub fn offset(&self) -> FixedOffset {
        self.utc_offset_minutes
            .and_then(fixed_offset)
            .unwrap_or_else(|| *Local::now().offset())
    }

    pub fn horizon(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        retention_horizon(now, self.retention_days)
    }
}

fn fixed_offset(minutes: i32) -> Option<FixedOffset> {
    if minutes.abs() > MAX_UTC_OFFSET_MINUTES {
        return None;
    }
    FixedOffset::east_opt(minutes * 60)
}

/// `base^days_ago`, with today (and the future) counting fully
pub fn decay(base: f64, days_ago: i64) -> f64 {
    if days_ago <= 0 {
        return 1.0;
    }
    base.powi(days_ago.min(i32::MAX as i64) as i32)
}

/// Multiplier rewarding activity spread over several days
pub fn consistency_multiplier(weight: f64, cap: u32, distinct_days: usize) -> f64 {
    let extra = distinct_days.saturating_sub(1).min(cap as usize);
    1.0 + weight * extra as f64
}

/// Calendar day of `timestamp` for an observer at `offset`
pub fn local_day(timestamp: DateTime<Utc>, offset: &FixedOffset) -> NaiveDate {
    timestamp.with_timezone(offset).date_naive()
}

/// One visit to a ranked entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VisitEvent {
    pub entity_id: String,
    pub timestamp: DateTime<Utc>,
}

impl VisitEvent {
    pub fn new(entity_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            entity_id: entity_id.into(),
            timestamp,
        }
    }
}

impl From<&Visit> for VisitEvent {
    fn from(visit: &Visit) -> Self {
        Self::new(visit.website_id.clone(), visit.visited_at)
    }
}

/// Derived score of one entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityScore {
    pub entity_id: String,
    pub score: f64,
    pub last_visited: DateTime<Utc>,
    pub visit_count: usize,
    pub distinct_days: usize,
}

/// Score every entity in `entity_ids` from `events`.
///
/// Events for entities outside `entity_ids` or older than the retention
/// horizon are ignored. The result is ordered by score, then most recent
/// visit, then id.
pub fn compute_ranking(
    entity_ids: &[String],
    events: &[VisitEvent],
    now: DateTime<Utc>,
    config: &RankingConfig,
) -> Vec<EntityScore> {
    let offset = config.offset();
    let today = local_day(now, &offset);
    let horizon = config.horizon(now);

    let mut per_entity: HashMap<&str, Vec<&VisitEvent>> = entity_ids
        .iter()
        .map(|id| (id.as_str(), Vec::new()))
        .collect();
    for event in events.iter().filter(|e| e.timestamp >= horizon) {
        if let Some(bucket) = per_entity.get_mut(event.entity_id.as_str()) {
            bucket.push(event);
        }
    }

    let mut scores: Vec<EntityScore> = per_entity
        .into_iter()
        .map(|(entity_id, events)| score_entity(entity_id, &events, today, &offset, horizon, config))
        .collect();

    scores.sort_by(compare_scores);
    scores
}

fn score_entity(
    entity_id: &str,
    events: &[&VisitEvent],
    today: NaiveDate,
    offset: &FixedOffset,
    horizon: DateTime<Utc>,
    config: &RankingConfig,
) -> EntityScore {
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for event in events {
        *per_day.entry(local_day(event.timestamp, offset)).or_insert(0) += 1;
    }

    let raw: f64 = per_day
        .iter()
        .map(|(day, count)| {
            let days_ago = today.signed_duration_since(*day).num_days();
            *count as f64 * decay(config.decay_base, days_ago)
        })
        .sum();
    let bonus = consistency_multiplier(
        config.consistency_weight,
        config.consistency_cap,
        per_day.len(),
    );

    EntityScore {
        entity_id: entity_id.to_string(),
        score: raw * bonus,
        last_visited: events
            .iter()
            .map(|e| e.timestamp)
            .max()
            .unwrap_or(horizon),
        visit_count: events.len(),
        distinct_days: per_day.len(),
    }
}

fn compare_scores(a: &EntityScore, b: &EntityScore) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.last_visited.cmp(&a.last_visited))
        .then_with(|| a.entity_id.cmp(&b.entity_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn utc_config() -> RankingConfig {
        RankingConfig {
            utc_offset_minutes: Some(0),
            ..Default::default()
        }
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 20, 12, 0, 0).unwrap()
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_decay_curve() {
        assert_eq!(decay(0.95, 0), 1.0);
        assert_eq!(decay(0.95, -3), 1.0);
        assert!((decay(0.95, 1) - 0.95).abs() < 1e-12);
        assert!(decay(0.95, 30) < decay(0.95, 29));
    }

    #[test]
    fn test_consistency_multiplier_is_monotone_and_capped() {
        let mut previous = 0.0;
        for days in 0..30 {
            let m = consistency_multiplier(0.1, 14, days);
            assert!(m >= previous);
            previous = m;
        }
        assert_eq!(consistency_multiplier(0.1, 14, 1), 1.0);
        assert!((consistency_multiplier(0.1, 14, 100) - 2.4).abs() < 1e-12);
    }

    #[test]
    fn test_recent_visits_outrank_old_ones() {
        let now = noon();
        let mut events = Vec::new();
        for i in 0..5 {
            events.push(VisitEvent::new("a", now - Duration::minutes(i)));
            events.push(VisitEvent::new("b", now - Duration::days(14) - Duration::minutes(i)));
        }

        let ranking = compute_ranking(&ids(&["a", "b"]), &events, now, &utc_config());
        assert_eq!(ranking[0].entity_id, "a");
        assert!(ranking[0].score > ranking[1].score);
        assert_eq!(ranking[0].visit_count, 5);
        assert_eq!(ranking[1].visit_count, 5);
    }

    #[test]
    fn test_spread_visits_beat_a_burst() {
        let now = noon();
        let mut events = Vec::new();
        for day in 0..6 {
            events.push(VisitEvent::new("c", now - Duration::days(day)));
            events.push(VisitEvent::new("d", now - Duration::minutes(day)));
        }

        let ranking = compute_ranking(&ids(&["c", "d"]), &events, now, &utc_config());
        let c = ranking.iter().find(|s| s.entity_id == "c").unwrap();
        let d = ranking.iter().find(|s| s.entity_id == "d").unwrap();
        assert_eq!(c.distinct_days, 6);
        assert_eq!(d.distinct_days, 1);
        assert!(c.score >= d.score);
    }

    #[test]
    fn test_entities_without_visits_default_to_horizon() {
        let now = noon();
        let config = utc_config();
        let ranking = compute_ranking(&ids(&["idle"]), &[], now, &config);

        assert_eq!(ranking.len(), 1);
        assert_eq!(ranking[0].score, 0.0);
        assert_eq!(ranking[0].last_visited, config.horizon(now));
    }

    #[test]
    fn test_ties_break_on_last_visited_then_id() {
        let now = noon();
        let events = vec![
            VisitEvent::new("early", now - Duration::hours(3)),
            VisitEvent::new("late", now - Duration::hours(1)),
        ];

        let ranking = compute_ranking(&ids(&["early", "late", "x", "w"]), &events, now, &utc_config());
        let order: Vec<&str> = ranking.iter().map(|s| s.entity_id.as_str()).collect();
        assert_eq!(order, vec!["late", "early", "w", "x"]);
    }

    #[test]
    fn test_day_boundaries_follow_observer_offset() {
        // 23:30 UTC on the 19th is already the 20th at UTC+1
        let now = noon();
        let visit = Utc.with_ymd_and_hms(2024, 3, 19, 23, 30, 0).unwrap();
        let events = vec![VisitEvent::new("a", visit)];

        let utc = compute_ranking(&ids(&["a"]), &events, now, &utc_config());
        let plus_one = compute_ranking(
            &ids(&["a"]),
            &events,
            now,
            &RankingConfig {
                utc_offset_minutes: Some(60),
                ..Default::default()
            },
        );

        assert!((utc[0].score - 0.95).abs() < 1e-12);
        assert!((plus_one[0].score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_and_expired_events_are_ignored() {
        let now = noon();
        let events = vec![
            VisitEvent::new("ghost", now),
            VisitEvent::new("a", now - Duration::days(365)),
        ];

        let ranking = compute_ranking(&ids(&["a"]), &events, now, &utc_config());
        assert_eq!(ranking.len(), 1);
        assert_eq!(ranking[0].visit_count, 0);
    }

    #[test]
    fn test_config_validation() {
        assert!(RankingConfig::default().validate().is_ok());
        let bad = RankingConfig {
            decay_base: 1.5,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_huge_retention_is_rejected_and_never_panics() {
        let config = RankingConfig {
            retention_days: 1_000_000_000,
            ..utc_config()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.horizon(noon()), DateTime::<Utc>::MIN_UTC);

        let events = vec![VisitEvent::new("a", noon())];
        let ranking = compute_ranking(&ids(&["a"]), &events, noon(), &config);
        assert_eq!(ranking[0].visit_count, 1);

        let longest = RankingConfig {
            retention_days: MAX_RETENTION_DAYS,
            ..utc_config()
        };
        assert!(longest.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_offset_is_rejected() {
        let config = RankingConfig {
            utc_offset_minutes: Some(i32::MAX / 2),
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(
            RankingConfig {
                utc_offset_minutes: Some(-1_440),
                ..Default::default()
            }
            .validate()
            .is_err()
        );
        assert!(
            RankingConfig {
                utc_offset_minutes: Some(-MAX_UTC_OFFSET_MINUTES),
                ..Default::default()
            }
            .validate()
            .is_ok()
        );
        // falls back to the host offset rather than overflowing
        let _ = config.offset();
    }
}
