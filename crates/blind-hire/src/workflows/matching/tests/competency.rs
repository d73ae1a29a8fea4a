use std::collections::BTreeMap;

use chrono::Utc;

use super::common::*;
use crate::workflows::matching::error::{MatchingError, ValidationError};
use crate::workflows::matching::vault::CandidateRegistration;

#[test]
fn declared_levels_merge_and_keep_verified_scores() {
    let fx = fixture();
    let candidate = fx.candidate("Ana Souza", "ana@example.com");
    fx.service
        .ledger()
        .record_verified_score(&candidate.candidate_id, "rust", 88, Utc::now())
        .expect("scored");

    let mut update = BTreeMap::new();
    update.insert(" RUST ".to_string(), 5);
    update.insert("Kubernetes".to_string(), 2);
    let profile = fx
        .service
        .ledger()
        .declare(&candidate.candidate_id, &update)
        .expect("declared");

    let rust = profile
        .iter()
        .find(|summary| summary.skill == "rust")
        .expect("rust kept");
    assert_eq!(rust.declared_level, 5);
    assert_eq!(rust.verified_score, Some(88));
    assert!(profile.iter().any(|summary| summary.skill == "kubernetes"));
    assert!(profile.iter().any(|summary| summary.skill == "sql"));
}

#[test]
fn levels_outside_one_to_five_are_rejected() {
    let fx = fixture();
    let candidate = fx.candidate("Ana Souza", "ana@example.com");

    let mut update = BTreeMap::new();
    update.insert("rust".to_string(), 6);
    let err = fx
        .service
        .ledger()
        .declare(&candidate.candidate_id, &update)
        .expect_err("level 6");
    assert!(matches!(
        err,
        MatchingError::Validation(ValidationError::LevelOutOfRange { level: 6, .. })
    ));

    let mut registration = BTreeMap::new();
    registration.insert("rust".to_string(), 0);
    let err = fx
        .service
        .vault()
        .register(CandidateRegistration {
            identity: identity("Bruno Lima", "bruno@example.com"),
            competencies: registration,
        })
        .expect_err("level 0");
    assert_eq!(err.code(), "ValidationError");
}

#[test]
fn verified_scores_need_a_declared_skill_and_a_valid_range() {
    let fx = fixture();
    let candidate = fx.candidate("Ana Souza", "ana@example.com");
    let ledger = fx.service.ledger();

    assert!(matches!(
        ledger.record_verified_score(&candidate.candidate_id, "cobol", 70, Utc::now()),
        Err(MatchingError::Validation(
            ValidationError::UndeclaredSkill { .. }
        ))
    ));
    assert!(matches!(
        ledger.record_verified_score(&candidate.candidate_id, "rust", 101, Utc::now()),
        Err(MatchingError::Validation(
            ValidationError::ScoreOutOfRange { score: 101, .. }
        ))
    ));
}

#[test]
fn matching_transitions_leave_competencies_untouched() {
    let fx = fixture();
    let company = fx.company("Acme");
    let job = fx.open_job(&company, "Backend engineer");
    let candidate = fx.candidate("Ana Souza", "ana@example.com");
    let before = fx
        .service
        .ledger()
        .profile(&candidate.candidate_id)
        .expect("profile");

    fx.disclosed(&company, &candidate, &job);
    fx.service
        .pipeline()
        .apply(&candidate.candidate_id, &job)
        .expect("applied");

    let after = fx
        .service
        .ledger()
        .profile(&candidate.candidate_id)
        .expect("profile");
    assert_eq!(before, after);
}
