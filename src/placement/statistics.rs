//! Admin analytics over completed sessions.

use std::collections::BTreeMap;

use crate::models::{
    placement::{CategoryAverage, HistogramBucket, PlacementStatistics},
    question::Category,
    session::{Level, SessionStatus, TestSession},
};

/// Fixed 20-point score buckets; the last one includes 100.
const BUCKETS: [(i32, i32); 5] = [(0, 19), (20, 39), (40, 59), (60, 79), (80, 100)];

fn bucket_index(score: i32) -> usize {
    ((score.clamp(0, 100) / 20) as usize).min(BUCKETS.len() - 1)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Summarizes `sessions`, ignoring any that are not completed.
pub fn compute(sessions: &[TestSession]) -> PlacementStatistics {
    let completed: Vec<&TestSession> = sessions
        .iter()
        .filter(|s| s.status == SessionStatus::Completed)
        .collect();

    let mut level_distribution: BTreeMap<String, i64> = Level::ALL
        .iter()
        .map(|l| (l.as_str().to_string(), 0))
        .collect();
    let mut histogram = [0i64; BUCKETS.len()];
    let mut score_sum = 0i64;
    let mut per_category: BTreeMap<Category, (i64, i64)> = BTreeMap::new();

    for session in &completed {
        let score = session.scores.percentage_score;
        score_sum += i64::from(score);
        histogram[bucket_index(score)] += 1;

        if let Some(placement) = &session.placement {
            *level_distribution
                .entry(placement.assigned_level.as_str().to_string())
                .or_default() += 1;
        }

        for entry in &session.scores.category_scores {
            if let Ok(category) = entry.key.parse::<Category>() {
                let slot = per_category.entry(category).or_default();
                slot.0 += i64::from(entry.percentage);
                slot.1 += 1;
            }
        }
    }

    let count = completed.len() as i64;
    PlacementStatistics {
        completed_sessions: count,
        level_distribution,
        average_score: if count == 0 {
            0.0
        } else {
            round2(score_sum as f64 / count as f64)
        },
        score_histogram: BUCKETS
            .iter()
            .zip(histogram)
            .map(|((lo, hi), count)| HistogramBucket {
                range: format!("{}-{}", lo, hi),
                count,
            })
            .collect(),
        category_averages: per_category
            .into_iter()
            .map(|(category, (sum, n))| CategoryAverage {
                category: category.as_str().to_string(),
                average_percentage: round2(sum as f64 / n as f64),
                sessions: n,
            })
            .collect(),
    }
}
