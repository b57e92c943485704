use super::common::*;
use crate::workflows::equivalency::audit::AuditAction;
use crate::workflows::equivalency::domain::{CandidateId, MappingId};
use crate::workflows::equivalency::repository::RecordKind;
use crate::workflows::equivalency::scoring::ScoreBreakdown;
use crate::workflows::equivalency::ServiceError;

#[test]
fn accept_by_threshold_includes_the_boundary() {
    let (service, _) = build_service();
    seed_catalog(&service);
    let ids = seed_candidate(&service, "cand-1", &[0.85, 0.84, 0.90]);
    let before = audit_len(&service);

    let outcome = service
        .mappings()
        .accept_by_threshold(&CandidateId::from("cand-1"), 0.85, ADMIN)
        .expect("batch accept succeeds");

    assert_eq!(outcome.affected, vec![ids[0].clone(), ids[2].clone()]);

    let log = service.audit_log().unwrap();
    assert_eq!(log.len(), before + 2);
    let touched: Vec<_> = log[..2].iter().map(|entry| entry.entity_id.clone()).collect();
    assert!(touched.contains(&ids[0].to_string()));
    assert!(touched.contains(&ids[2].to_string()));
    assert!(log[..2]
        .iter()
        .all(|entry| entry.action == AuditAction::AcceptThreshold
            && entry.entity == RecordKind::Mapping
            && entry.actor == ADMIN));

    let mappings = service
        .mappings_for_candidate(&CandidateId::from("cand-1"))
        .unwrap();
    let untouched = mappings.iter().find(|m| m.id == ids[1]).unwrap();
    assert!(!untouched.overridden_by_admin);
    for id in [&ids[0], &ids[2]] {
        let accepted = mappings.iter().find(|m| &m.id == id).unwrap();
        assert!(accepted.overridden_by_admin);
        assert_eq!(accepted.target_subject_code.as_deref(), Some("MAT101"));
    }
}

#[test]
fn reject_below_threshold_excludes_the_boundary_and_clears_targets() {
    let (service, _) = build_service();
    seed_catalog(&service);
    let ids = seed_candidate(&service, "cand-1", &[0.85, 0.84, 0.90]);

    let outcome = service
        .mappings()
        .reject_below_threshold(&CandidateId::from("cand-1"), 0.85, ADMIN)
        .expect("batch reject succeeds");

    assert_eq!(outcome.affected, vec![ids[1].clone()]);
    let rejected = service
        .mappings_for_candidate(&CandidateId::from("cand-1"))
        .unwrap()
        .into_iter()
        .find(|m| m.id == ids[1])
        .unwrap();
    assert_eq!(rejected.target_subject_code, None);
    assert!(rejected.overridden_by_admin);

    let entry = &service.audit_log().unwrap()[0];
    assert_eq!(entry.action, AuditAction::RejectThreshold);
    assert_eq!(entry.before.as_ref().unwrap()["target_subject_code"], "MAT101");
    assert!(entry.after.as_ref().unwrap()["target_subject_code"].is_null());
}

#[test]
fn batch_without_qualifying_mappings_is_a_silent_no_op() {
    let (service, _) = build_service();
    seed_candidate(&service, "cand-1", &[0.40, 0.55]);
    let before = audit_len(&service);

    let outcome = service
        .mappings()
        .accept_by_threshold(&CandidateId::from("cand-1"), 0.85, ADMIN)
        .expect("empty batch is not an error");

    assert!(outcome.is_empty());
    assert_eq!(audit_len(&service), before);
}

#[test]
fn batch_on_unknown_candidate_is_not_found() {
    let (service, _) = build_service();

    match service
        .mappings()
        .reject_below_threshold(&CandidateId::from("ghost"), 0.5, ADMIN)
    {
        Err(ServiceError::NotFound { kind, id }) => {
            assert_eq!(kind, RecordKind::Candidate);
            assert_eq!(id, "ghost");
        }
        other => panic!("expected not found, got {other:?}"),
    }
    assert_eq!(audit_len(&service), 0);
}

#[test]
fn set_target_records_full_before_and_after() {
    let (service, _) = build_service();
    seed_catalog(&service);
    let ids = seed_candidate(&service, "cand-1", &[0.72]);

    let updated = service
        .mappings()
        .set_target(&ids[0], Some("PHY101".to_string()), ADMIN)
        .expect("reassignment succeeds");

    assert_eq!(updated.target_subject_code.as_deref(), Some("PHY101"));
    assert!(updated.overridden_by_admin);

    let entry = &service.audit_log().unwrap()[0];
    assert_eq!(entry.action, AuditAction::UpdateMapping);
    assert_eq!(entry.entity_id, ids[0].to_string());
    let before = entry.before.as_ref().unwrap();
    let after = entry.after.as_ref().unwrap();
    assert_eq!(before["target_subject_code"], "MAT101");
    assert_eq!(before["overridden_by_admin"], false);
    assert_eq!(after["target_subject_code"], "PHY101");
    assert_eq!(after["overridden_by_admin"], true);
    assert_eq!(after["confidence"], 0.72);
}

#[test]
fn set_target_accepts_clearing_the_assignment() {
    let (service, _) = build_service();
    let ids = seed_candidate(&service, "cand-1", &[0.91]);

    let cleared = service
        .mappings()
        .set_target(&ids[0], None, ADMIN)
        .expect("clearing succeeds");

    assert!(!cleared.is_accepted());
    assert!(cleared.overridden_by_admin);
}

#[test]
fn blank_target_codes_clear_the_assignment() {
    let (service, _) = build_service();
    seed_catalog(&service);
    let ids = seed_candidate(&service, "cand-1", &[0.91, 0.88]);

    let emptied = service
        .mappings()
        .set_target(&ids[0], Some(String::new()), ADMIN)
        .expect("empty code is accepted");
    let padded = service
        .mappings()
        .set_target(&ids[1], Some("   ".to_string()), ADMIN)
        .expect("whitespace code is accepted");

    assert_eq!(emptied.target_subject_code, None);
    assert_eq!(padded.target_subject_code, None);
    assert!(!emptied.is_accepted());
    let breakdown = service
        .breakdown_for_candidate(&CandidateId::from("cand-1"))
        .expect("breakdown computes");
    assert_eq!(breakdown, ScoreBreakdown::ZERO);
}

#[test]
fn proposals_with_blank_codes_arrive_unmapped() {
    let (service, _) = build_service();
    seed_catalog(&service);
    seed_candidate(&service, "cand-1", &[]);
    let intake = service.intake();
    intake
        .add_extracted_subject(subject("sub-9", "cand-1-doc", 14.0, 20.0, None))
        .unwrap();

    let stored = intake
        .propose_mapping(proposal("map-9", "sub-9", Some(" "), 0.95))
        .expect("proposal stored");

    assert_eq!(stored.target_subject_code, None);
    assert!(!stored.is_accepted());
    assert_eq!(
        service
            .breakdown_for_candidate(&CandidateId::from("cand-1"))
            .unwrap(),
        ScoreBreakdown::ZERO
    );
}

#[test]
fn override_flag_never_reverts_across_resolver_operations() {
    let (service, _) = build_service();
    seed_catalog(&service);
    let ids = seed_candidate(&service, "cand-1", &[0.30, 0.95]);
    let candidate_id = CandidateId::from("cand-1");

    service
        .mappings()
        .set_target(&ids[0], Some("MAT201".to_string()), ADMIN)
        .unwrap();
    service
        .mappings()
        .accept_by_threshold(&candidate_id, 0.9, ADMIN)
        .unwrap();
    service
        .mappings()
        .reject_below_threshold(&candidate_id, 0.5, ADMIN)
        .unwrap();
    service.mappings().confirm(&ids[1], ADMIN).unwrap();
    service.mappings().set_target(&ids[0], None, ADMIN).unwrap();

    let mappings = service.mappings_for_candidate(&candidate_id).unwrap();
    assert!(mappings.iter().all(|mapping| mapping.overridden_by_admin));
}

#[test]
fn unknown_mapping_is_not_found_and_unaudited() {
    let (service, _) = build_service();

    let result = service
        .mappings()
        .set_target(&MappingId::from("map-404"), Some("MAT101".to_string()), ADMIN);

    assert!(matches!(
        result,
        Err(ServiceError::NotFound {
            kind: RecordKind::Mapping,
            ..
        })
    ));
    assert_eq!(audit_len(&service), 0);
}
