//! The user's denormalized placement fields.
//!
//! `sync_user_placement_cache` is the only producer of these fields. It is
//! called by session completion and by retake, and the store writes its
//! result in the same transaction as the session change.

use crate::models::{
    placement::PlacementCache,
    session::{SessionStatus, TestSession},
};

/// Cache contents for `user_id` given their latest completed session.
///
/// `None`, or a session that is not completed, yields cleared fields.
pub fn sync_user_placement_cache(user_id: i64, latest: Option<&TestSession>) -> PlacementCache {
    let Some(session) = latest.filter(|s| s.status == SessionStatus::Completed && s.user_id == user_id)
    else {
        return PlacementCache::cleared(user_id);
    };
    let Some(placement) = &session.placement else {
        return PlacementCache::cleared(user_id);
    };

    PlacementCache {
        user_id,
        assigned_level: Some(placement.assigned_level),
        level_code: Some(placement.level_code.clone()),
        placement_test_score: Some(session.scores.percentage_score),
        placement_test_completed: true,
        level_assigned_date: session.completed_at,
        strength_areas: placement.strength_areas.clone(),
        improvement_areas: placement.improvement_areas.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            question::{Category, Difficulty},
            session::{Level, NewSession},
        },
        placement::{level::LevelPolicy, testutil::choice_question},
    };
    use chrono::Utc;
    use serde_json::json;

    fn completed_session(user_id: i64) -> TestSession {
        let questions: Vec<_> = (1..=4)
            .map(|id| choice_question(id, Category::Database, Difficulty::Medium, 1, "A"))
            .collect();
        let mut session = TestSession::open(9, 1, NewSession::new(user_id, &questions, Utc::now(), None));
        for q in &questions {
            let answer = if q.id == 4 { json!("C") } else { json!("A") };
            session.submit_answer(q, answer, 3, Utc::now()).unwrap();
        }
        session.complete(&[], &LevelPolicy::default(), Utc::now()).unwrap();
        session
    }

    #[test]
    fn completed_session_populates_cache() {
        let session = completed_session(5);
        let cache = sync_user_placement_cache(5, Some(&session));

        assert!(cache.placement_test_completed);
        assert_eq!(cache.placement_test_score, Some(75));
        assert_eq!(cache.assigned_level, Some(Level::Intermediate));
        assert_eq!(cache.level_code.as_deref(), Some("B1-B2"));
        assert_eq!(cache.strength_areas, vec!["database"]);
        assert_eq!(cache.level_assigned_date, session.completed_at);
    }

    #[test]
    fn missing_or_abandoned_session_clears_cache() {
        assert_eq!(sync_user_placement_cache(5, None), PlacementCache::cleared(5));

        let mut session = completed_session(5);
        session.abandon_for_retake();
        assert_eq!(sync_user_placement_cache(5, Some(&session)), PlacementCache::cleared(5));
    }
}
