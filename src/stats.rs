//! Statistics over the saved-session collection
//!
//! Flattens every saved session into key moments, then aggregates the
//! dangerous ones three ways: per-session counts, a keyword taxonomy, and a
//! 15-minute trend. All of it is computed from the persisted collection;
//! nothing here talks to the network.

use serde::Serialize;

use crate::constants::TREND_BUCKET_MINUTES;
use crate::models::{SavedSession, parse_timestamp};

/// One event flattened out of a saved session.
#[derive(Debug, Clone, Serialize)]
pub struct KeyMoment {
    #[serde(rename = "sessionName")]
    pub session_name: String,
    pub timestamp: String,
    pub description: String,
    #[serde(rename = "isDangerous")]
    pub is_dangerous: bool,
}

/// Fixed danger taxonomy. Categorization scans the groups in this order and
/// the first group with a matching keyword wins; nothing is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DangerCategory {
    Posture,
    Movement,
    Proximity,
    Equipment,
    Environmental,
    Other,
}

const DANGER_TAXONOMY: &[(DangerCategory, &[&str])] = &[
    (DangerCategory::Posture, &["posture", "leaning", "balance"]),
    (
        DangerCategory::Movement,
        &["sudden", "rapid", "quick", "fast"],
    ),
    (
        DangerCategory::Proximity,
        &["close", "near", "proximity", "distance"],
    ),
    (
        DangerCategory::Equipment,
        &["tool", "machine", "equipment", "device"],
    ),
    (
        DangerCategory::Environmental,
        &["slip", "trip", "fall", "spill"],
    ),
];

/// Categorize one dangerous-event description by substring match.
pub fn categorize(description: &str) -> DangerCategory {
    let lowered = description.to_lowercase();
    for (category, keywords) in DANGER_TAXONOMY {
        if keywords.iter().any(|keyword| lowered.contains(keyword)) {
            return *category;
        }
    }
    DangerCategory::Other
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub category: DangerCategory,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendPoint {
    pub bucket: String,
    pub count: usize,
}

/// Everything the statistics page renders.
#[derive(Debug, Clone, Serialize)]
pub struct StatsOverview {
    #[serde(rename = "totalMoments")]
    pub total_moments: usize,
    #[serde(rename = "dangerousMoments")]
    pub dangerous_moments: usize,
    #[serde(rename = "dangerousBySession")]
    pub dangerous_by_session: Vec<SessionCount>,
    #[serde(rename = "categoryDistribution")]
    pub category_distribution: Vec<CategoryCount>,
    pub trend: Vec<TrendPoint>,
}

/// Flatten sessions into key moments, session name attached.
pub fn collect_moments(sessions: &[SavedSession]) -> Vec<KeyMoment> {
    sessions
        .iter()
        .flat_map(|session| {
            session.timestamps.iter().map(|event| KeyMoment {
                session_name: session.name.clone(),
                timestamp: event.timestamp.clone(),
                description: event.description.clone(),
                is_dangerous: event.is_dangerous,
            })
        })
        .collect()
}

/// Aggregate the saved collection for the statistics page.
pub fn build_overview(sessions: &[SavedSession]) -> StatsOverview {
    let moments = collect_moments(sessions);
    let dangerous: Vec<&KeyMoment> = moments.iter().filter(|m| m.is_dangerous).collect();

    // Per-session counts in first-seen order
    let mut by_session: Vec<SessionCount> = Vec::new();
    for moment in &dangerous {
        match by_session
            .iter_mut()
            .find(|s| s.name == moment.session_name)
        {
            Some(entry) => entry.count += 1,
            None => by_session.push(SessionCount {
                name: moment.session_name.clone(),
                count: 1,
            }),
        }
    }

    // Category counts in taxonomy order, Other last, zero groups omitted
    let mut category_counts = vec![0usize; DANGER_TAXONOMY.len() + 1];
    for moment in &dangerous {
        let category = categorize(&moment.description);
        let index = DANGER_TAXONOMY
            .iter()
            .position(|(c, _)| *c == category)
            .unwrap_or(DANGER_TAXONOMY.len());
        category_counts[index] += 1;
    }
    let category_distribution = category_counts
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .map(|(index, count)| CategoryCount {
            category: DANGER_TAXONOMY
                .get(index)
                .map(|(c, _)| *c)
                .unwrap_or(DangerCategory::Other),
            count: *count,
        })
        .collect();

    // 15-minute trend over the minute component of the "mm:ss" labels
    let mut buckets: Vec<(u64, usize)> = Vec::new();
    for moment in &dangerous {
        let Some(secs) = parse_timestamp(&moment.timestamp) else {
            continue;
        };
        let bucket =
            (secs / 60) / u64::from(TREND_BUCKET_MINUTES) * u64::from(TREND_BUCKET_MINUTES);
        match buckets.iter_mut().find(|(b, _)| *b == bucket) {
            Some((_, count)) => *count += 1,
            None => buckets.push((bucket, 1)),
        }
    }
    buckets.sort_by_key(|(bucket, _)| *bucket);
    let trend = buckets
        .into_iter()
        .map(|(bucket, count)| TrendPoint {
            bucket: format!("{:02}:00", bucket),
            count,
        })
        .collect();

    StatsOverview {
        total_moments: moments.len(),
        dangerous_moments: dangerous.len(),
        dangerous_by_session: by_session,
        category_distribution,
        trend,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimedEvent;

    fn session(name: &str, events: &[(&str, &str, bool)]) -> SavedSession {
        SavedSession {
            id: name.to_string(),
            name: name.to_string(),
            media_reference: format!("/media/{name}.mp4"),
            thumbnail_reference: String::new(),
            timestamps: events
                .iter()
                .map(|(timestamp, description, is_dangerous)| TimedEvent {
                    timestamp: timestamp.to_string(),
                    description: description.to_string(),
                    is_dangerous: *is_dangerous,
                })
                .collect(),
        }
    }

    #[test]
    fn first_matching_group_wins() {
        // Matches both the movement and equipment groups; movement is
        // declared first.
        assert_eq!(
            categorize("sudden movement near the machine"),
            DangerCategory::Movement
        );
        assert_eq!(
            categorize("worker leaning over the rail"),
            DangerCategory::Posture
        );
        assert_eq!(
            categorize("standing too close to the press"),
            DangerCategory::Proximity
        );
        assert_eq!(
            categorize("oil spill by the door"),
            DangerCategory::Environmental
        );
        assert_eq!(categorize("smoking indoors"), DangerCategory::Other);
    }

    #[test]
    fn categorization_is_case_insensitive() {
        assert_eq!(categorize("SUDDEN lunge"), DangerCategory::Movement);
    }

    #[test]
    fn overview_counts_dangerous_per_session() {
        let sessions = vec![
            session(
                "dock",
                &[
                    ("00:10", "sudden swerve", true),
                    ("00:40", "routine walkthrough", false),
                    ("01:20", "slip by the ramp", true),
                ],
            ),
            session("lobby", &[("00:05", "forklift too close", true)]),
        ];

        let overview = build_overview(&sessions);
        assert_eq!(overview.total_moments, 4);
        assert_eq!(overview.dangerous_moments, 3);

        assert_eq!(overview.dangerous_by_session.len(), 2);
        assert_eq!(overview.dangerous_by_session[0].name, "dock");
        assert_eq!(overview.dangerous_by_session[0].count, 2);
        assert_eq!(overview.dangerous_by_session[1].name, "lobby");
        assert_eq!(overview.dangerous_by_session[1].count, 1);
    }

    #[test]
    fn overview_buckets_trend_in_15_minute_windows() {
        let sessions = vec![session(
            "yard",
            &[
                ("02:05", "sudden fall", true),
                ("14:59", "rapid reversing", true),
                ("15:00", "near miss", true),
                ("47:30", "spill", true),
            ],
        )];

        let overview = build_overview(&sessions);
        let buckets: Vec<(&str, usize)> = overview
            .trend
            .iter()
            .map(|point| (point.bucket.as_str(), point.count))
            .collect();
        assert_eq!(buckets, vec![("00:00", 2), ("15:00", 1), ("45:00", 1)]);
    }

    #[test]
    fn overview_category_distribution_in_taxonomy_order() {
        let sessions = vec![session(
            "floor",
            &[
                ("00:01", "tool left running", true),
                ("00:02", "sudden jolt", true),
                ("00:03", "unknown hazard", true),
                ("00:04", "rapid descent", true),
            ],
        )];

        let overview = build_overview(&sessions);
        let pairs: Vec<(DangerCategory, usize)> = overview
            .category_distribution
            .iter()
            .map(|c| (c.category, c.count))
            .collect();
        assert_eq!(
            pairs,
            vec![
                (DangerCategory::Movement, 2),
                (DangerCategory::Equipment, 1),
                (DangerCategory::Other, 1),
            ]
        );
    }
}
