// src/models/placement.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::session::Level;

/// Placement fields denormalized onto the user record.
/// Mirrors the user's most recent completed session, or is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementCache {
    pub user_id: i64,
    pub assigned_level: Option<Level>,
    pub level_code: Option<String>,
    pub placement_test_score: Option<i32>,
    pub placement_test_completed: bool,
    pub level_assigned_date: Option<DateTime<Utc>>,
    pub strength_areas: Vec<String>,
    pub improvement_areas: Vec<String>,
}

impl PlacementCache {
    pub fn cleared(user_id: i64) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistogramBucket {
    pub range: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAverage {
    pub category: String,
    pub average_percentage: f64,
    pub sessions: i64,
}

/// Aggregate statistics over completed sessions (admin analytics).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementStatistics {
    pub completed_sessions: i64,
    pub level_distribution: BTreeMap<String, i64>,
    pub average_score: f64,
    pub score_histogram: Vec<HistogramBucket>,
    pub category_averages: Vec<CategoryAverage>,
}
