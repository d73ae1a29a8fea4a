use super::common::*;
use crate::config::MatchingConfig;
use crate::workflows::matching::domain::AnonymousHandle;
use crate::workflows::matching::error::MatchingError;
use crate::workflows::matching::vault::CandidateView;

#[test]
fn gate_stays_closed_without_consent() {
    let fx = fixture();
    let company = fx.company("Acme");
    let job = fx.open_job(&company, "Backend engineer");
    let candidate = fx.candidate("Ana Souza", "ana@example.com");
    fx.service
        .pipeline()
        .apply(&candidate.candidate_id, &job)
        .expect("applied");

    assert!(!fx.is_open(&candidate.candidate_id, &company, &job));
    let view = fx
        .service
        .vault()
        .resolve(&candidate.candidate_id, &company, &job)
        .expect("resolves");
    match view {
        CandidateView::Anonymous(anonymous) => {
            assert_eq!(anonymous.handle, candidate.handle);
            assert_eq!(anonymous.competencies.len(), 2);
        }
        other => panic!("expected anonymous view, got {other:?}"),
    }
}

#[test]
fn consent_for_one_company_does_not_leak_to_another() {
    let fx = fixture();
    let company = fx.company("Acme");
    let other = fx.company("Globex");
    let job = fx.open_job(&company, "Backend engineer");
    let candidate = fx.candidate("Ana Souza", "ana@example.com");
    fx.disclosed(&company, &candidate, &job);

    assert!(fx.is_open(&candidate.candidate_id, &company, &job));
    assert!(!fx.is_open(&candidate.candidate_id, &other, &job));
    let view = fx
        .service
        .resolve_candidate(&other, &candidate.handle, &job)
        .expect("resolves");
    assert!(!view.is_disclosed());
}

#[test]
fn unknown_handles_resolve_to_an_empty_anonymous_view() {
    let fx = fixture();
    let company = fx.company("Acme");
    let job = fx.open_job(&company, "Backend engineer");
    let guessed = AnonymousHandle("anon-0000".to_string());

    let view = fx
        .service
        .resolve_candidate(&company, &guessed, &job)
        .expect("no error for unknown handles");
    match view {
        CandidateView::Anonymous(anonymous) => {
            assert_eq!(anonymous.handle, guessed);
            assert!(anonymous.competencies.is_empty());
        }
        other => panic!("expected anonymous view, got {other:?}"),
    }
}

#[test]
fn resolving_an_unknown_internal_id_is_not_found() {
    let fx = fixture();
    let company = fx.company("Acme");
    let job = fx.open_job(&company, "Backend engineer");

    let err = fx
        .service
        .vault()
        .resolve(
            &crate::workflows::matching::CandidateId("cand-missing".to_string()),
            &company,
            &job,
        )
        .expect_err("unknown id");
    assert!(matches!(err, MatchingError::NotFound { .. }));
}

#[test]
fn handles_do_not_reveal_identity() {
    let fx = fixture();
    let candidate = fx.candidate("Ana Souza", "ana@example.com");

    assert!(candidate.handle.as_str().starts_with("anon-"));
    assert!(!candidate.handle.as_str().contains("ana"));
    assert_ne!(candidate.handle.as_str(), candidate.candidate_id.as_str());
}

#[test]
fn browse_lists_active_candidates_up_to_the_configured_cap() {
    let fx = fixture_with(MatchingConfig { browse_limit: 2 });
    for (name, email) in [
        ("Ana Souza", "ana@example.com"),
        ("Bruno Lima", "bruno@example.com"),
        ("Carla Dias", "carla@example.com"),
    ] {
        fx.candidate(name, email);
    }

    assert_eq!(fx.service.browse(None).expect("browse").len(), 2);
    assert_eq!(fx.service.browse(Some(10)).expect("browse").len(), 2);
    assert_eq!(fx.service.browse(Some(1)).expect("browse").len(), 1);

    let serialized = serde_json::to_string(&fx.service.browse(None).expect("browse"))
        .expect("serializes");
    assert!(!serialized.contains("@example.com"));
}

#[test]
fn candidates_can_read_and_edit_their_own_identity() {
    let fx = fixture();
    let candidate = fx.candidate("Ana Souza", "ana@example.com");

    fx.service
        .vault()
        .update_identity(
            &candidate.candidate_id,
            identity("Ana Souza Lima", " ANA.LIMA@Example.com "),
        )
        .expect("updated");

    let own = fx
        .service
        .vault()
        .own_identity(&candidate.candidate_id)
        .expect("readable");
    assert_eq!(own.full_name, "Ana Souza Lima");
    assert_eq!(own.email, "ana.lima@example.com");
}
