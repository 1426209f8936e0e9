//! Reservation engine scenarios: creation, conflicts, recurrence,
//! cancellation, and alternatives.

mod common;

use chrono::Duration;
use common::{t, Harness};
use scheduler_core::common::AppError;
use scheduler_core::domains::audit::AuditAction;
use scheduler_core::domains::reservations::{ApprovalStatus, CreateReservationRequest};
use scheduler_core::domains::resources::ResourceType;
use scheduler_core::domains::users::Role;

fn single_request(
    organizer: &scheduler_core::domains::users::User,
    resource: &scheduler_core::domains::resources::Resource,
    start: &str,
    end: &str,
) -> CreateReservationRequest {
    CreateReservationRequest::builder()
        .organizer_id(organizer.id)
        .resource_ids(vec![resource.id])
        .title("Planning session")
        .start_at(t(start))
        .end_at(t(end))
        .timezone("Asia/Tokyo")
        .build()
}

#[tokio::test]
async fn single_create_writes_parent_instance_assignment_audit_and_job() {
    let harness = Harness::new();
    let organizer = harness.seed_user("organizer@example.com", Role::General).await;
    let room = harness.seed_room("Room A").await;

    let reservation = harness
        .engine
        .create_reservation(
            &harness.actor(&organizer),
            single_request(
                &organizer,
                &room,
                "2025-06-01T10:00:00Z",
                "2025-06-01T11:00:00Z",
            ),
        )
        .await
        .unwrap();

    assert_eq!(reservation.approval_status, ApprovalStatus::Confirmed);
    assert_eq!(harness.store.reservation_count().await, 1);

    let instances = harness.store.instances().await;
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].start_at, t("2025-06-01T10:00:00Z"));
    assert_eq!(instances[0].end_at, t("2025-06-01T11:00:00Z"));
    assert_eq!(instances[0].reservation_start_at, reservation.start_at);

    assert_eq!(harness.store.assignments().await.len(), 1);

    let audit = harness.store.audit_entries().await;
    let creates: Vec<_> = audit.iter().filter(|e| e.action == AuditAction::Create).collect();
    assert_eq!(creates.len(), 1);
    assert_eq!(creates[0].target_id, reservation.id.to_string());

    let jobs = harness.queue.main_jobs().await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_type, "send_email");
}

#[tokio::test]
async fn direct_conflict_is_rejected_without_side_effects() {
    let harness = Harness::new();
    let organizer = harness.seed_user("organizer@example.com", Role::General).await;
    let other = harness.seed_user("other@example.com", Role::General).await;
    let room = harness.seed_room("Room A").await;

    harness
        .engine
        .create_reservation(
            &harness.actor(&organizer),
            single_request(
                &organizer,
                &room,
                "2025-06-01T10:00:00Z",
                "2025-06-01T11:00:00Z",
            ),
        )
        .await
        .unwrap();

    let err = harness
        .engine
        .create_reservation(
            &harness.actor(&other),
            single_request(
                &other,
                &room,
                "2025-06-01T10:30:00Z",
                "2025-06-01T11:30:00Z",
            ),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ResourceNotAvailable));
    assert_eq!(harness.store.reservation_count().await, 1);
    assert_eq!(harness.store.instances().await.len(), 1);

    // No audit entry for the failed attempt.
    let creates = harness
        .store
        .audit_entries()
        .await
        .into_iter()
        .filter(|e| e.action == AuditAction::Create)
        .count();
    assert_eq!(creates, 1);
}

#[tokio::test]
async fn touching_intervals_coexist() {
    let harness = Harness::new();
    let organizer = harness.seed_user("organizer@example.com", Role::General).await;
    let room = harness.seed_room("Room A").await;

    harness
        .engine
        .create_reservation(
            &harness.actor(&organizer),
            single_request(
                &organizer,
                &room,
                "2025-06-01T10:00:00Z",
                "2025-06-01T11:00:00Z",
            ),
        )
        .await
        .unwrap();

    // [11:00, 12:00) touches [10:00, 11:00) and must not conflict.
    harness
        .engine
        .create_reservation(
            &harness.actor(&organizer),
            single_request(
                &organizer,
                &room,
                "2025-06-01T11:00:00Z",
                "2025-06-01T12:00:00Z",
            ),
        )
        .await
        .unwrap();

    assert_eq!(harness.store.reservation_count().await, 2);
    assert_eq!(harness.store.instances().await.len(), 2);
}

#[tokio::test]
async fn daily_rrule_expands_five_siblings_sharing_partition_key() {
    let harness = Harness::new();
    harness.clock.set(t("2025-01-01T00:00:00Z"));
    let organizer = harness.seed_user("organizer@example.com", Role::General).await;
    let room = harness.seed_room("Room A").await;

    let request = CreateReservationRequest::builder()
        .organizer_id(organizer.id)
        .resource_ids(vec![room.id])
        .title("Daily standup")
        .start_at(t("2025-01-01T10:00:00Z"))
        .end_at(t("2025-01-01T11:00:00Z"))
        .rrule(Some("FREQ=DAILY;COUNT=5".to_string()))
        .timezone("Asia/Tokyo")
        .build();

    let reservation = harness
        .engine
        .create_reservation(&harness.actor(&organizer), request)
        .await
        .unwrap();

    let instances = harness.store.instances().await;
    assert_eq!(instances.len(), 5);
    for (day, instance) in instances.iter().enumerate() {
        assert_eq!(
            instance.start_at,
            t("2025-01-01T10:00:00Z") + Duration::days(day as i64)
        );
        assert_eq!(instance.end_at - instance.start_at, Duration::hours(1));
        assert_eq!(instance.reservation_start_at, reservation.start_at);
    }
    // One assignment per instance on the single room.
    assert_eq!(harness.store.assignments().await.len(), 5);
}

#[tokio::test]
async fn recurring_conflict_on_any_occurrence_rejects_whole_series() {
    let harness = Harness::new();
    harness.clock.set(t("2025-01-01T00:00:00Z"));
    let organizer = harness.seed_user("organizer@example.com", Role::General).await;
    let room = harness.seed_room("Room A").await;

    // Single booking on Jan 3 overlapping the would-be third occurrence.
    harness
        .engine
        .create_reservation(
            &harness.actor(&organizer),
            single_request(
                &organizer,
                &room,
                "2025-01-03T10:30:00Z",
                "2025-01-03T11:30:00Z",
            ),
        )
        .await
        .unwrap();

    let request = CreateReservationRequest::builder()
        .organizer_id(organizer.id)
        .resource_ids(vec![room.id])
        .title("Daily standup")
        .start_at(t("2025-01-01T10:00:00Z"))
        .end_at(t("2025-01-01T11:00:00Z"))
        .rrule(Some("FREQ=DAILY;COUNT=5".to_string()))
        .timezone("UTC")
        .build();

    let err = harness
        .engine
        .create_reservation(&harness.actor(&organizer), request)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ResourceNotAvailable));
    assert_eq!(harness.store.reservation_count().await, 1);
}

#[tokio::test]
async fn validation_rejects_bad_range_timezone_and_empty_resources() {
    let harness = Harness::new();
    let organizer = harness.seed_user("organizer@example.com", Role::General).await;
    let room = harness.seed_room("Room A").await;

    let inverted = single_request(
                &organizer,
        &room,
        "2025-06-01T11:00:00Z",
        "2025-06-01T10:00:00Z",
    );
    assert!(matches!(
        harness
            .engine
            .create_reservation(&harness.actor(&organizer), inverted)
            .await,
        Err(AppError::InvalidTimeRange)
    ));

    let bad_tz = CreateReservationRequest::builder()
        .organizer_id(organizer.id)
        .resource_ids(vec![room.id])
        .title("Bad timezone")
        .start_at(t("2025-06-01T10:00:00Z"))
        .end_at(t("2025-06-01T11:00:00Z"))
        .timezone("Not/AZone")
        .build();
    assert!(matches!(
        harness
            .engine
            .create_reservation(&harness.actor(&organizer), bad_tz)
            .await,
        Err(AppError::InvalidTimezone(_))
    ));

    let no_resources = CreateReservationRequest::builder()
        .organizer_id(organizer.id)
        .resource_ids(Vec::new())
        .title("No resources")
        .start_at(t("2025-06-01T10:00:00Z"))
        .end_at(t("2025-06-01T11:00:00Z"))
        .timezone("UTC")
        .build();
    assert!(matches!(
        harness
            .engine
            .create_reservation(&harness.actor(&organizer), no_resources)
            .await,
        Err(AppError::InvalidRequest(_))
    ));
}

#[tokio::test]
async fn required_role_gates_booking() {
    let harness = Harness::new();
    let general = harness.seed_user("general@example.com", Role::General).await;
    let manager = harness.seed_user("manager@example.com", Role::Manager).await;
    let board_room = harness
        .seed_resource("Board room", ResourceType::MeetingRoom, Some(12), Some(Role::Manager))
        .await;

    let err = harness
        .engine
        .create_reservation(
            &harness.actor(&general),
            single_request(
                &general,
                &board_room,
                "2025-06-01T10:00:00Z",
                "2025-06-01T11:00:00Z",
            ),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientPermission));

    harness
        .engine
        .create_reservation(
            &harness.actor(&manager),
            single_request(
                &manager,
                &board_room,
                "2025-06-01T10:00:00Z",
                "2025-06-01T11:00:00Z",
            ),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn only_organizer_may_cancel_and_last_instance_removes_parent() {
    let harness = Harness::new();
    let organizer = harness.seed_user("organizer@example.com", Role::General).await;
    let stranger = harness.seed_user("stranger@example.com", Role::General).await;
    let room = harness.seed_room("Room A").await;

    let reservation = harness
        .engine
        .create_reservation(
            &harness.actor(&organizer),
            single_request(
                &organizer,
                &room,
                "2025-06-10T10:00:00Z",
                "2025-06-10T11:00:00Z",
            ),
        )
        .await
        .unwrap();

    let err = harness
        .engine
        .cancel_reservation(&harness.actor(&stranger), reservation.id, t("2025-06-10T10:00:00Z"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientPermission));

    harness
        .engine
        .cancel_reservation(&harness.actor(&organizer), reservation.id, t("2025-06-10T10:00:00Z"))
        .await
        .unwrap();

    assert_eq!(harness.store.reservation_count().await, 0);
    assert!(harness.store.instances().await.is_empty());
    assert!(harness.store.assignments().await.is_empty());

    let cancels = harness
        .store
        .audit_entries()
        .await
        .into_iter()
        .filter(|e| e.action == AuditAction::Cancel)
        .count();
    assert_eq!(cancels, 1);
}

#[tokio::test]
async fn late_cancellation_draws_a_penalty_early_one_does_not() {
    let harness = Harness::new();
    let organizer = harness.seed_user("organizer@example.com", Role::General).await;
    let room = harness.seed_room("Room A").await;

    let make = |start: &str, end: &str| single_request(&organizer, &room, start, end);

    let early = harness
        .engine
        .create_reservation(&harness.actor(&organizer), make("2025-06-20T10:00:00Z", "2025-06-20T11:00:00Z"))
        .await
        .unwrap();
    let late = harness
        .engine
        .create_reservation(&harness.actor(&organizer), make("2025-06-21T10:00:00Z", "2025-06-21T11:00:00Z"))
        .await
        .unwrap();

    // Ten days out: no penalty.
    harness
        .engine
        .cancel_reservation(&harness.actor(&organizer), early.id, t("2025-06-20T10:00:00Z"))
        .await
        .unwrap();
    assert_eq!(harness.store.user(organizer.id).await.unwrap().penalty_score, 0);

    // Two hours before the occurrence: inside the 24 h window.
    harness.set_clock_before(t("2025-06-21T10:00:00Z"), 2);
    harness
        .engine
        .cancel_reservation(&harness.actor(&organizer), late.id, t("2025-06-21T10:00:00Z"))
        .await
        .unwrap();

    let penalised = harness.store.user(organizer.id).await.unwrap();
    assert_eq!(penalised.penalty_score, 1);
    assert!(penalised.penalty_expires_at.is_some());
}

#[tokio::test]
async fn alternatives_exclude_booked_resources_but_not_touching_ones() {
    let harness = Harness::new();
    let organizer = harness.seed_user("organizer@example.com", Role::General).await;
    let room_a = harness.seed_room("Room A").await;
    let room_b = harness.seed_room("Room B").await;
    harness
        .seed_resource("Projector", ResourceType::Equipment, None, None)
        .await;

    harness
        .engine
        .create_reservation(
            &harness.actor(&organizer),
            single_request(
                &organizer,
                &room_a,
                "2025-06-01T10:00:00Z",
                "2025-06-01T11:00:00Z",
            ),
        )
        .await
        .unwrap();

    // Overlapping window: only Room B is free (the projector is equipment).
    let free = harness
        .engine
        .find_alternatives(
            t("2025-06-01T10:30:00Z"),
            t("2025-06-01T11:30:00Z"),
            ResourceType::MeetingRoom,
        )
        .await
        .unwrap();
    assert_eq!(free.iter().map(|r| r.id).collect::<Vec<_>>(), vec![room_b.id]);

    // Touching window: both rooms are free.
    let free = harness
        .engine
        .find_alternatives(
            t("2025-06-01T11:00:00Z"),
            t("2025-06-01T12:00:00Z"),
            ResourceType::MeetingRoom,
        )
        .await
        .unwrap();
    assert_eq!(free.len(), 2);
}
