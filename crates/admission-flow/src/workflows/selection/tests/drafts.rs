use std::thread;
use std::time::Duration;

use chrono::Utc;

use crate::workflows::selection::domain::{ApplicantId, TemplateId, UnitId};
use crate::workflows::selection::drafts::{Draft, DraftStore, InMemoryDraftStore};
use crate::workflows::selection::template::{AnswerSet, AnswerValue};

fn draft(text: &str) -> Draft {
    let mut answers = AnswerSet::new();
    answers.insert(
        "motivation".to_string(),
        AnswerValue::Text(text.to_string()),
    );
    Draft {
        template_id: TemplateId(1),
        template_version: 1,
        answers,
        updated_at: Utc::now(),
    }
}

#[test]
fn saved_draft_comes_back() {
    let store = InMemoryDraftStore::new(Duration::from_secs(60));
    store.save(ApplicantId(1), UnitId(1), draft("hello")).unwrap();

    let found = store.get(ApplicantId(1), UnitId(1)).unwrap().unwrap();
    assert_eq!(
        found.answers.get("motivation"),
        Some(&AnswerValue::Text("hello".to_string()))
    );
}

#[test]
fn drafts_are_scoped_per_applicant_and_unit() {
    let store = InMemoryDraftStore::new(Duration::from_secs(60));
    store.save(ApplicantId(1), UnitId(1), draft("a")).unwrap();

    assert!(store.get(ApplicantId(2), UnitId(1)).unwrap().is_none());
    assert!(store.get(ApplicantId(1), UnitId(2)).unwrap().is_none());
}

#[test]
fn last_write_wins() {
    let store = InMemoryDraftStore::new(Duration::from_secs(60));
    store.save(ApplicantId(1), UnitId(1), draft("first")).unwrap();
    store.save(ApplicantId(1), UnitId(1), draft("second")).unwrap();

    let found = store.get(ApplicantId(1), UnitId(1)).unwrap().unwrap();
    assert_eq!(
        found.answers.get("motivation"),
        Some(&AnswerValue::Text("second".to_string()))
    );
}

#[test]
fn draft_expires_after_its_ttl() {
    let store = InMemoryDraftStore::new(Duration::from_millis(20));
    store.save(ApplicantId(1), UnitId(1), draft("fading")).unwrap();

    thread::sleep(Duration::from_millis(40));
    assert!(store.get(ApplicantId(1), UnitId(1)).unwrap().is_none());
    assert!(store
        .remaining_ttl(ApplicantId(1), UnitId(1))
        .unwrap()
        .is_none());
}

#[test]
fn saving_again_resets_the_ttl() {
    let store = InMemoryDraftStore::new(Duration::from_millis(80));
    store.save(ApplicantId(1), UnitId(1), draft("v1")).unwrap();

    thread::sleep(Duration::from_millis(50));
    store.save(ApplicantId(1), UnitId(1), draft("v2")).unwrap();
    thread::sleep(Duration::from_millis(50));

    // 100ms after the first save, but only 50ms after the second.
    assert!(store.get(ApplicantId(1), UnitId(1)).unwrap().is_some());
}

#[test]
fn remaining_ttl_is_bounded_by_the_configured_ttl() {
    let store = InMemoryDraftStore::new(Duration::from_secs(60));
    store.save(ApplicantId(1), UnitId(1), draft("x")).unwrap();

    let ttl = store
        .remaining_ttl(ApplicantId(1), UnitId(1))
        .unwrap()
        .unwrap();
    assert!(ttl <= Duration::from_secs(60));
    assert!(ttl > Duration::from_secs(59));
}

#[test]
fn discard_removes_the_draft() {
    let store = InMemoryDraftStore::new(Duration::from_secs(60));
    store.save(ApplicantId(1), UnitId(1), draft("x")).unwrap();
    store.discard(ApplicantId(1), UnitId(1)).unwrap();

    assert!(store.get(ApplicantId(1), UnitId(1)).unwrap().is_none());
}

#[test]
fn discarding_an_absent_draft_is_a_no_op() {
    let store = InMemoryDraftStore::new(Duration::from_secs(60));
    assert!(store.discard(ApplicantId(9), UnitId(9)).is_ok());
}
