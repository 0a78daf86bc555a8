/// Reconciliation scenarios against the in-memory transport:
/// idempotence, ordering, validation and partial-failure isolation
use contact_sync::*;
use std::sync::Arc;

fn hotel() -> ParentId {
    ParentId::new("hotel-42")
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn add(value: &str, kind: ContactKind) -> TransportCall {
    TransportCall::AddValue {
        parent: hotel(),
        kind,
        value: value.to_string(),
    }
}

fn delete(value: &str, kind: ContactKind) -> TransportCall {
    TransportCall::DeleteValue {
        parent: hotel(),
        kind,
        value: value.to_string(),
    }
}

fn collection(kind: ContactKind, values: &[&str]) -> EditableCollection {
    let mut c = EditableCollection::new(kind);
    let first = c.entries()[0].local_id;
    for (i, value) in values.iter().enumerate() {
        let id = if i == 0 { first } else { c.add_blank() };
        c.set_value(id, value);
    }
    c
}

#[tokio::test]
async fn test_add_then_delete_scenario() {
    let transport = InMemoryTransport::new().with_values(&hotel(), ContactKind::Email, &["b@x.com", "c@x.com"]);
    let reconciler = CollectionReconciler::new(transport);
    let local = collection(ContactKind::Email, &["a@x.com", "b@x.com"]);

    let result = reconciler.reconcile(&hotel(), &local).await.unwrap();

    assert_eq!(
        reconciler.transport().mutation_calls(),
        vec![add("a@x.com", ContactKind::Email), delete("c@x.com", ContactKind::Email)]
    );
    assert_eq!(result.adds, OpTally { attempted: 1, succeeded: 1 });
    assert_eq!(result.deletes, OpTally { attempted: 1, succeeded: 1 });
    assert_eq!(result.deleted, vec!["c@x.com"]);
    assert_eq!(result.created[0].value, "a@x.com");
    assert!(result.is_complete());
    assert_eq!(
        reconciler.transport().values(&hotel(), ContactKind::Email),
        vec!["b@x.com", "a@x.com"]
    );
}

#[tokio::test]
async fn test_single_blank_row_is_rejected_without_calls() {
    let reconciler = CollectionReconciler::new(InMemoryTransport::new());
    let local = EditableCollection::new(ContactKind::Email);

    let err = reconciler.reconcile(&hotel(), &local).await.unwrap_err();

    assert_eq!(err, ReconcileError::ValidationFailed { kind: ContactKind::Email });
    assert!(reconciler.transport().calls().is_empty());
}

#[tokio::test]
async fn test_blank_only_rows_are_rejected_without_calls() {
    let reconciler = CollectionReconciler::new(InMemoryTransport::new());
    let local = collection(ContactKind::Phone, &["   ", "", "abc"]);

    let err = reconciler.reconcile(&hotel(), &local).await.unwrap_err();

    assert_eq!(err.kind(), ContactKind::Phone);
    assert!(matches!(err, ReconcileError::ValidationFailed { .. }));
    assert!(reconciler.transport().calls().is_empty());
}

#[tokio::test]
async fn test_unchanged_phone_list_makes_no_mutations() {
    let transport = InMemoryTransport::new().with_values(&hotel(), ContactKind::Phone, &["+1-555-0100"]);
    let reconciler = CollectionReconciler::new(transport);
    let local = collection(ContactKind::Phone, &["+1-555-0100"]);

    let result = reconciler.reconcile(&hotel(), &local).await.unwrap();

    assert!(reconciler.transport().mutation_calls().is_empty());
    assert_eq!(result.attempted(), 0);
    assert_eq!(result.succeeded(), 0);
    assert!(result.failures.is_empty());
    assert!(result.is_noop());
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let transport = InMemoryTransport::new().with_values(&hotel(), ContactKind::Email, &["old@x.com", "keep@x.com"]);
    let reconciler = CollectionReconciler::new(transport);
    let local = collection(ContactKind::Email, &["keep@x.com", "new1@x.com", "new2@x.com"]);

    let first = reconciler.reconcile(&hotel(), &local).await.unwrap();
    assert_eq!(first.attempted(), 3);

    reconciler.transport().clear_calls();
    let second = reconciler.reconcile(&hotel(), &local).await.unwrap();

    assert!(second.is_noop());
    assert!(reconciler.transport().mutation_calls().is_empty());
    assert_eq!(reconciler.transport().calls().len(), 1);
}

#[tokio::test]
async fn test_adds_follow_local_order_and_deletes_follow_snapshot_order() {
    let transport = InMemoryTransport::new().with_values(&hotel(), ContactKind::Email, &["s3", "s1", "s2"]);
    let reconciler = CollectionReconciler::new(transport);
    let local = collection(ContactKind::Email, &["l2", "l3", "l1"]);

    reconciler.reconcile(&hotel(), &local).await.unwrap();

    assert_eq!(
        reconciler.transport().mutation_calls(),
        vec![
            add("l2", ContactKind::Email),
            add("l3", ContactKind::Email),
            add("l1", ContactKind::Email),
            delete("s3", ContactKind::Email),
            delete("s1", ContactKind::Email),
            delete("s2", ContactKind::Email),
        ]
    );
}

#[tokio::test]
async fn test_failed_delete_does_not_stop_later_deletes() {
    let transport = InMemoryTransport::new().with_values(&hotel(), ContactKind::Email, &["d1", "d2", "d3", "keep"]);
    transport.fail(
        TransportOp::Delete,
        Some("d2"),
        TransportError::Status { status: 500, message: "boom".to_string() },
    );
    let reconciler = CollectionReconciler::new(transport);
    let local = collection(ContactKind::Email, &["keep"]);

    let result = reconciler.reconcile(&hotel(), &local).await.unwrap();

    assert_eq!(
        reconciler.transport().mutation_calls(),
        vec![
            delete("d1", ContactKind::Email),
            delete("d2", ContactKind::Email),
            delete("d3", ContactKind::Email),
        ]
    );
    assert_eq!(result.deletes, OpTally { attempted: 3, succeeded: 2 });
    assert_eq!(result.failures.len(), 1);
    assert!(matches!(&result.failures[0], ItemFailure::DeleteFailed { value, .. } if value == "d2"));
    assert_eq!(result.summary(), "2 of 3 email updates succeeded; delete 'd2' failed: server returned 500: boom");
}

#[tokio::test]
async fn test_failed_add_stops_remaining_adds_but_still_deletes() {
    let transport = InMemoryTransport::new().with_values(&hotel(), ContactKind::Phone, &["111"]);
    transport.fail(TransportOp::Add, Some("222"), TransportError::Network("connection reset".to_string()));
    let reconciler = CollectionReconciler::new(transport);
    let local = collection(ContactKind::Phone, &["222", "333", "444"]);

    let result = reconciler.reconcile(&hotel(), &local).await.unwrap();

    assert_eq!(
        reconciler.transport().mutation_calls(),
        vec![add("222", ContactKind::Phone), delete("111", ContactKind::Phone)]
    );
    assert_eq!(result.adds, OpTally { attempted: 1, succeeded: 0 });
    assert_eq!(result.skipped, vec!["333", "444"]);
    assert_eq!(result.deletes.succeeded, 1);
    assert!(matches!(&result.failures[..], [ItemFailure::AddFailed { value, .. }] if value == "222"));
    assert!(!result.is_complete());
}

#[tokio::test]
async fn test_fetch_failure_aborts_before_mutation() {
    let transport = InMemoryTransport::new().with_values(&hotel(), ContactKind::Email, &["a@x.com"]);
    transport.fail(TransportOp::Fetch, None, TransportError::Network("dns".to_string()));
    let reconciler = CollectionReconciler::new(transport);
    let local = collection(ContactKind::Email, &["b@x.com"]);

    let err = reconciler.reconcile(&hotel(), &local).await.unwrap_err();

    assert!(matches!(err, ReconcileError::Fetch { kind: ContactKind::Email, .. }));
    assert!(!err.may_have_mutated());
    assert!(reconciler.transport().mutation_calls().is_empty());
}

#[tokio::test]
async fn test_missing_authorization_aborts_run() {
    let transport = InMemoryTransport::new().with_values(&hotel(), ContactKind::Email, &["a@x.com"]);
    transport.fail(TransportOp::Add, None, TransportError::Unauthorized("no session token".to_string()));
    let reconciler = CollectionReconciler::new(transport);
    let local = collection(ContactKind::Email, &["b@x.com", "c@x.com"]);

    let err = reconciler.reconcile(&hotel(), &local).await.unwrap_err();

    match err {
        ReconcileError::Aborted { phase, partial, .. } => {
            assert_eq!(phase, ReconcilePhase::Adding);
            assert_eq!(partial.adds.attempted, 1);
            assert_eq!(partial.skipped, vec!["c@x.com", "a@x.com"]);
            assert_eq!(partial.deletes.attempted, 0);
        }
        other => panic!("expected abort, got {:?}", other),
    }
    assert_eq!(reconciler.transport().mutation_calls(), vec![add("b@x.com", ContactKind::Email)]);
}

#[tokio::test]
async fn test_edit_in_place_is_delete_and_add() {
    let transport = InMemoryTransport::new().with_values(&hotel(), ContactKind::Email, &["front@x.com"]);
    let rows = transport.rows(&hotel(), ContactKind::Email);
    let mut local = EditableCollection::from_snapshot(ContactKind::Email, &rows);
    let row = local.entries()[0].local_id;
    local.set_value(row, "front@y.com");
    let reconciler = CollectionReconciler::new(transport);

    reconciler.reconcile(&hotel(), &local).await.unwrap();

    assert_eq!(
        reconciler.transport().mutation_calls(),
        vec![add("front@y.com", ContactKind::Email), delete("front@x.com", ContactKind::Email)]
    );
}

#[tokio::test]
async fn test_shared_transport_through_arc() {
    let transport = Arc::new(InMemoryTransport::new());
    let reconciler = CollectionReconciler::new(Arc::clone(&transport));

    reconciler
        .reconcile_values(&hotel(), ContactKind::Phone, &strings(&["555"]))
        .await
        .unwrap();

    assert_eq!(transport.values(&hotel(), ContactKind::Phone), vec!["555"]);
}

#[tokio::test]
async fn test_hotel_form_round_trip() {
    let transport = Arc::new(
        InMemoryTransport::new()
            .with_values(&hotel(), ContactKind::Email, &["desk@hotel.com"])
            .with_values(&hotel(), ContactKind::Phone, &["+1 555 0100"]),
    );
    let mut form = HotelContactForm::load(transport.as_ref(), hotel()).await.unwrap();

    let new_phone = form.phones_mut().add_blank();
    form.phones_mut().set_value(new_phone, "+1 555 0199 (night)");
    let old_email = form.emails().entries()[0].local_id;
    form.emails_mut().remove(old_email);
    let row = form.emails().entries()[0].local_id;
    form.emails_mut().set_value(row, "reservations@hotel.com");

    let reconciler = CollectionReconciler::new(Arc::clone(&transport));
    let report = form.save(&reconciler).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(transport.values(&hotel(), ContactKind::Email), vec!["reservations@hotel.com"]);
    assert_eq!(transport.values(&hotel(), ContactKind::Phone), vec!["+1 555 0100", "+1 555 0199 ()"]);
    assert_eq!(report.to_view().len(), 2);
}

#[tokio::test]
async fn test_hotel_form_validates_both_kinds_before_any_call() {
    let transport = Arc::new(InMemoryTransport::new());
    let mut form = HotelContactForm::new(hotel());
    let row = form.emails().entries()[0].local_id;
    form.emails_mut().set_value(row, "desk@hotel.com");

    let reconciler = CollectionReconciler::new(Arc::clone(&transport));
    let err = form.save(&reconciler).await.unwrap_err();

    assert_eq!(err, ReconcileError::ValidationFailed { kind: ContactKind::Phone });
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_hotel_report_keeps_kinds_independent() {
    let transport = Arc::new(InMemoryTransport::new());
    transport.fail_once(TransportOp::Fetch, None, TransportError::Network("timeout".to_string()));
    let mut form = HotelContactForm::new(hotel());
    let row = form.emails().entries()[0].local_id;
    form.emails_mut().set_value(row, "desk@hotel.com");
    let row = form.phones().entries()[0].local_id;
    form.phones_mut().set_value(row, "555");

    let reconciler = CollectionReconciler::new(Arc::clone(&transport));
    let report = form.save(&reconciler).await.unwrap();

    assert!(report.emails.is_err());
    assert!(report.phones.as_ref().unwrap().is_complete());
    assert!(!report.is_complete());
    assert_eq!(
        report.summary(),
        "could not fetch email snapshot: network error: timeout\n1 of 1 phone updates succeeded"
    );
}

#[tokio::test]
async fn test_unedited_form_saves_without_mutations() {
    let transport = Arc::new(
        InMemoryTransport::new()
            .with_values(&hotel(), ContactKind::Email, &["desk@hotel.com"])
            .with_values(&hotel(), ContactKind::Phone, &["555.0100", "+1 555 0199 ext. 4"]),
    );
    let form = HotelContactForm::load(transport.as_ref(), hotel()).await.unwrap();
    assert_eq!(form.phones().values(), vec!["555.0100", "+1 555 0199 ext. 4"]);

    let reconciler = CollectionReconciler::new(Arc::clone(&transport));
    let report = form.save(&reconciler).await.unwrap();

    assert!(transport.mutation_calls().is_empty());
    assert_eq!(report.summary(), "no email changes\nno phone changes");
    assert_eq!(
        transport.values(&hotel(), ContactKind::Phone),
        vec!["555.0100", "+1 555 0199 ext. 4"]
    );
}

#[tokio::test]
async fn test_fatal_email_error_skips_phones() {
    let transport = Arc::new(
        InMemoryTransport::new()
            .with_values(&hotel(), ContactKind::Email, &["desk@hotel.com"])
            .with_values(&hotel(), ContactKind::Phone, &["555"]),
    );
    let mut form = HotelContactForm::load(transport.as_ref(), hotel()).await.unwrap();
    let row = form.emails_mut().add_blank();
    form.emails_mut().set_value(row, "night@hotel.com");
    let row = form.phones_mut().add_blank();
    form.phones_mut().set_value(row, "777");

    transport.clear_calls();
    transport.fail(TransportOp::Add, None, TransportError::Unauthorized("session expired".to_string()));
    let reconciler = CollectionReconciler::new(Arc::clone(&transport));
    let report = form.save(&reconciler).await.unwrap();

    assert!(matches!(report.emails, Err(ReconcileError::Aborted { .. })));
    assert_eq!(
        report.phones,
        Err(ReconcileError::NotStarted {
            kind: ContactKind::Phone,
            source: TransportError::Unauthorized("session expired".to_string()),
        })
    );
    assert!(transport
        .calls()
        .iter()
        .all(|call| !matches!(call, TransportCall::FetchSnapshot { kind: ContactKind::Phone, .. })));
    assert_eq!(transport.values(&hotel(), ContactKind::Phone), vec!["555"]);
}

#[tokio::test]
async fn test_non_fatal_email_error_still_saves_phones() {
    let transport = Arc::new(InMemoryTransport::new().with_values(&hotel(), ContactKind::Phone, &["555"]));
    transport.fail(
        TransportOp::Add,
        Some("desk@hotel.com"),
        TransportError::Status { status: 422, message: "invalid".to_string() },
    );
    let mut form = HotelContactForm::load(transport.as_ref(), hotel()).await.unwrap();
    let row = form.emails().entries()[0].local_id;
    form.emails_mut().set_value(row, "desk@hotel.com");
    let row = form.phones_mut().add_blank();
    form.phones_mut().set_value(row, "777");

    let reconciler = CollectionReconciler::new(Arc::clone(&transport));
    let report = form.save(&reconciler).await.unwrap();

    assert!(!report.emails.as_ref().unwrap().is_complete());
    assert!(report.phones.as_ref().unwrap().is_complete());
    assert_eq!(transport.values(&hotel(), ContactKind::Phone), vec!["555", "777"]);
}
