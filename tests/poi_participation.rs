//! Integration tests for the POI engine: CRUD, participation, and the
//! discussion-timer state machine.

use breakoutglobe::data::models::{Bounds, UserRole};
use breakoutglobe::errors::ServiceError;
use breakoutglobe::events::DomainEvent;
use breakoutglobe::poi::{CreatePoiInput, PoiUpdate};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

mod helpers;
use helpers::{World, make_guest, make_map, pos, world};

fn cafe_input(map_id: Uuid, created_by: Uuid) -> CreatePoiInput {
    CreatePoiInput {
        map_id,
        name: "Cafe".into(),
        description: "A place to chat".into(),
        position: pos(40.7128, -74.0060),
        max_participants: Some(5),
        created_by,
        image_url: None,
        thumbnail_url: None,
    }
}

async fn setup(pool: &PgPool) -> (World, Uuid, Uuid) {
    let w = world(pool);
    let map = make_map(pool, "M1").await;
    let creator = make_guest(pool, "Creator").await;
    (w, map.id, creator.id)
}

#[sqlx::test]
async fn create_poi_publishes_and_defaults_capacity(pool: PgPool) {
    let (w, map_id, creator) = setup(&pool).await;
    let mut rx = w.events.subscribe(map_id);

    let poi = w
        .pois
        .create_poi(CreatePoiInput {
            max_participants: None,
            ..cafe_input(map_id, creator)
        })
        .await
        .unwrap();

    assert_eq!(poi.max_participants, 10);
    assert!(!poi.is_discussion_active);
    assert!(poi.discussion_start_time.is_none());

    match rx.try_recv().expect("expected poi-created event") {
        DomainEvent::PoiCreated { poi: payload } => assert_eq!(payload.id, poi.id),
        other => panic!("expected PoiCreated, got {other:?}"),
    }
}

#[sqlx::test]
async fn create_poi_validates_fields(pool: PgPool) {
    let (w, map_id, creator) = setup(&pool).await;

    let cases = [
        CreatePoiInput {
            name: "x".repeat(101),
            ..cafe_input(map_id, creator)
        },
        CreatePoiInput {
            description: "d".repeat(501),
            ..cafe_input(map_id, creator)
        },
        CreatePoiInput {
            max_participants: Some(0),
            ..cafe_input(map_id, creator)
        },
        CreatePoiInput {
            max_participants: Some(51),
            ..cafe_input(map_id, creator)
        },
        CreatePoiInput {
            position: pos(91.0, 0.0),
            ..cafe_input(map_id, creator)
        },
    ];
    for input in cases {
        assert!(matches!(
            w.pois.create_poi(input).await.unwrap_err(),
            ServiceError::Validation(_)
        ));
    }
}

#[sqlx::test]
async fn duplicate_location_is_rejected_at_four_decimals(pool: PgPool) {
    let (w, map_id, creator) = setup(&pool).await;

    w.pois.create_poi(cafe_input(map_id, creator)).await.unwrap();

    // Differs only in the 5th decimal: same location
    let err = w
        .pois
        .create_poi(CreatePoiInput {
            name: "Other".into(),
            position: pos(40.71284, -74.00603),
            ..cafe_input(map_id, creator)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::DuplicateLocation));

    // Differs in the 4th decimal: a distinct location
    assert!(
        w.pois
            .create_poi(CreatePoiInput {
                name: "Other".into(),
                position: pos(40.7129, -74.0060),
                ..cafe_input(map_id, creator)
            })
            .await
            .is_ok()
    );

    // Same coordinates on another map are fine
    let other_map = make_map(&pool, "M2").await;
    assert!(
        w.pois
            .create_poi(cafe_input(other_map.id, creator))
            .await
            .is_ok()
    );
}

#[sqlx::test]
async fn bounds_query_filters_and_validates(pool: PgPool) {
    let (w, map_id, creator) = setup(&pool).await;

    let inside = w.pois.create_poi(cafe_input(map_id, creator)).await.unwrap();
    w.pois
        .create_poi(CreatePoiInput {
            name: "Far away".into(),
            position: pos(-10.0, 100.0),
            ..cafe_input(map_id, creator)
        })
        .await
        .unwrap();

    let found = w
        .pois
        .list_in_bounds(
            map_id,
            Bounds {
                min_lat: 40.0,
                max_lat: 41.0,
                min_lng: -75.0,
                max_lng: -74.0,
            },
        )
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, inside.id);

    // Degenerate box is rejected before any store call
    let err = w
        .pois
        .list_in_bounds(
            map_id,
            Bounds {
                min_lat: 40.0,
                max_lat: 40.0,
                min_lng: -75.0,
                max_lng: -74.0,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[sqlx::test]
async fn discussion_timer_follows_membership(pool: PgPool) {
    let (w, map_id, creator) = setup(&pool).await;
    let alice = make_guest(&pool, "Alice").await;
    let bob = make_guest(&pool, "Bob").await;
    let poi = w.pois.create_poi(cafe_input(map_id, creator)).await.unwrap();

    // One participant: INACTIVE
    w.pois.join_poi(poi.id, alice.id, None).await.unwrap();
    let state = w.pois.get_poi(poi.id).await.unwrap();
    assert!(!state.is_discussion_active);
    assert!(state.discussion_start_time.is_none());

    // Two participants: ACTIVE with a start time
    w.pois.join_poi(poi.id, bob.id, None).await.unwrap();
    let state = w.pois.get_poi(poi.id).await.unwrap();
    assert!(state.is_discussion_active);
    let started = state.discussion_start_time.expect("start time missing");

    // Dropping below two clears both
    w.pois.leave_poi(poi.id, bob.id, None).await.unwrap();
    let state = w.pois.get_poi(poi.id).await.unwrap();
    assert!(!state.is_discussion_active);
    assert!(state.discussion_start_time.is_none());

    // Re-activation stamps a fresh start
    w.pois.join_poi(poi.id, bob.id, None).await.unwrap();
    let state = w.pois.get_poi(poi.id).await.unwrap();
    assert!(state.discussion_start_time.expect("start time missing") >= started);
}

#[sqlx::test]
async fn capacity_is_enforced_under_concurrent_joins(pool: PgPool) {
    let (w, map_id, creator) = setup(&pool).await;
    let poi = w
        .pois
        .create_poi(CreatePoiInput {
            max_participants: Some(1),
            ..cafe_input(map_id, creator)
        })
        .await
        .unwrap();

    let alice = make_guest(&pool, "Alice").await;
    let bob = make_guest(&pool, "Bob").await;

    let pois = Arc::clone(&w.pois);
    let a = tokio::spawn({
        let pois = Arc::clone(&pois);
        async move { pois.join_poi(poi.id, alice.id, None).await }
    });
    let b = tokio::spawn({
        let pois = Arc::clone(&pois);
        async move { pois.join_poi(poi.id, bob.id, None).await }
    });

    let results = [a.await.unwrap(), b.await.unwrap()];
    let joined = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(ServiceError::CapacityExceeded)))
        .count();

    assert_eq!(joined, 1);
    assert_eq!(rejected, 1);
    assert_eq!(w.participation.count(poi.id), 1);
}

#[sqlx::test]
async fn join_twice_then_leave_then_join_again(pool: PgPool) {
    let (w, map_id, creator) = setup(&pool).await;
    let alice = make_guest(&pool, "Alice").await;
    let poi = w.pois.create_poi(cafe_input(map_id, creator)).await.unwrap();

    w.pois.join_poi(poi.id, alice.id, None).await.unwrap();
    assert!(matches!(
        w.pois.join_poi(poi.id, alice.id, None).await.unwrap_err(),
        ServiceError::AlreadyJoined
    ));

    w.pois.leave_poi(poi.id, alice.id, None).await.unwrap();
    assert!(matches!(
        w.pois.leave_poi(poi.id, alice.id, None).await.unwrap_err(),
        ServiceError::NotJoined
    ));

    assert!(w.pois.join_poi(poi.id, alice.id, None).await.is_ok());
}

#[sqlx::test]
async fn joining_a_second_poi_leaves_the_first(pool: PgPool) {
    let (w, map_id, creator) = setup(&pool).await;
    let alice = make_guest(&pool, "Alice").await;
    let p1 = w.pois.create_poi(cafe_input(map_id, creator)).await.unwrap();
    let p2 = w
        .pois
        .create_poi(CreatePoiInput {
            name: "Library".into(),
            position: pos(40.8, -74.1),
            ..cafe_input(map_id, creator)
        })
        .await
        .unwrap();

    w.pois.join_poi(p1.id, alice.id, None).await.unwrap();

    let mut rx = w.events.subscribe(map_id);
    w.pois.join_poi(p2.id, alice.id, None).await.unwrap();

    // The old POI no longer lists the user; the new one does
    assert!(!w.participation.is_member(p1.id, alice.id));
    assert!(w.participation.is_member(p2.id, alice.id));
    assert_eq!(w.participation.pois_for(alice.id), vec![p2.id]);

    // The leave is published before the join, both with participant lists
    match rx.try_recv().expect("expected poi-left event") {
        DomainEvent::PoiLeft {
            poi_id,
            participants,
            ..
        } => {
            assert_eq!(poi_id, p1.id);
            assert!(participants.is_empty());
        }
        other => panic!("expected PoiLeft, got {other:?}"),
    }
    match rx.try_recv().expect("expected poi-joined event") {
        DomainEvent::PoiJoined {
            poi_id,
            current_count,
            participants,
            ..
        } => {
            assert_eq!(poi_id, p2.id);
            assert_eq!(current_count, 1);
            assert_eq!(participants[0].display_name, "Alice");
        }
        other => panic!("expected PoiJoined, got {other:?}"),
    }
}

#[sqlx::test]
async fn joining_a_full_poi_keeps_existing_membership(pool: PgPool) {
    let (w, map_id, creator) = setup(&pool).await;
    let alice = make_guest(&pool, "Alice").await;
    let bob = make_guest(&pool, "Bob").await;
    let home = w.pois.create_poi(cafe_input(map_id, creator)).await.unwrap();
    let full = w
        .pois
        .create_poi(CreatePoiInput {
            name: "Booth".into(),
            position: pos(40.8, -74.1),
            max_participants: Some(1),
            ..cafe_input(map_id, creator)
        })
        .await
        .unwrap();

    w.pois.join_poi(home.id, alice.id, None).await.unwrap();
    w.pois.join_poi(full.id, bob.id, None).await.unwrap();

    let mut rx = w.events.subscribe(map_id);
    assert!(matches!(
        w.pois.join_poi(full.id, alice.id, None).await.unwrap_err(),
        ServiceError::CapacityExceeded
    ));

    // The rejected join must not have evicted the user from their POI
    assert!(w.participation.is_member(home.id, alice.id));
    assert_eq!(w.participation.pois_for(alice.id), vec![home.id]);
    assert!(
        rx.try_recv().is_err(),
        "a rejected join must publish no events"
    );
}

#[sqlx::test]
async fn join_events_carry_resolved_participants(pool: PgPool) {
    let (w, map_id, creator) = setup(&pool).await;
    let alice = make_guest(&pool, "Alice").await;
    let bob = make_guest(&pool, "Bob").await;
    let poi = w.pois.create_poi(cafe_input(map_id, creator)).await.unwrap();

    w.pois.join_poi(poi.id, alice.id, None).await.unwrap();

    let mut rx = w.events.subscribe(map_id);
    w.pois.join_poi(poi.id, bob.id, None).await.unwrap();

    match rx.try_recv().expect("expected poi-joined event") {
        DomainEvent::PoiJoined {
            current_count,
            participants,
            user_id,
            ..
        } => {
            assert_eq!(user_id, bob.id);
            assert_eq!(current_count, 2);
            let mut names: Vec<_> = participants
                .iter()
                .map(|p| p.display_name.as_str())
                .collect();
            names.sort();
            assert_eq!(names, ["Alice", "Bob"]);
        }
        other => panic!("expected PoiJoined, got {other:?}"),
    }
}

#[sqlx::test]
async fn update_poi_is_validated_and_owner_guarded(pool: PgPool) {
    let (w, map_id, creator) = setup(&pool).await;
    let stranger = make_guest(&pool, "Mallory").await;
    let poi = w.pois.create_poi(cafe_input(map_id, creator)).await.unwrap();

    let err = w
        .pois
        .update_poi(
            poi.id,
            PoiUpdate {
                name: Some("New name".into()),
                ..PoiUpdate::default()
            },
            stranger.id,
            UserRole::User,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden));

    // Admins may edit anyone's POI
    let updated = w
        .pois
        .update_poi(
            poi.id,
            PoiUpdate {
                name: Some("Renamed".into()),
                max_participants: Some(3),
                ..PoiUpdate::default()
            },
            stranger.id,
            UserRole::Admin,
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.max_participants, 3);

    let err = w
        .pois
        .update_poi(
            poi.id,
            PoiUpdate {
                max_participants: Some(51),
                ..PoiUpdate::default()
            },
            creator,
            UserRole::User,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[sqlx::test]
async fn delete_poi_empties_participation_first(pool: PgPool) {
    let (w, map_id, creator) = setup(&pool).await;
    let alice = make_guest(&pool, "Alice").await;
    let poi = w.pois.create_poi(cafe_input(map_id, creator)).await.unwrap();
    w.pois.join_poi(poi.id, alice.id, None).await.unwrap();

    let mut rx = w.events.subscribe(map_id);
    w.pois
        .delete_poi(poi.id, creator, UserRole::User)
        .await
        .unwrap();

    assert!(w.participation.pois_for(alice.id).is_empty());
    assert!(matches!(
        w.pois.get_poi(poi.id).await.unwrap_err(),
        ServiceError::PoiNotFound
    ));
    assert!(matches!(
        rx.try_recv().expect("expected poi-deleted event"),
        DomainEvent::PoiDeleted { .. }
    ));

    // Deletion by a non-owner non-admin is forbidden
    let other = w.pois.create_poi(cafe_input(map_id, creator)).await.unwrap();
    assert!(matches!(
        w.pois
            .delete_poi(other.id, alice.id, UserRole::User)
            .await
            .unwrap_err(),
        ServiceError::Forbidden
    ));
}

#[sqlx::test]
async fn join_missing_poi_is_terminal(pool: PgPool) {
    let (w, _, _) = setup(&pool).await;
    let alice = make_guest(&pool, "Alice").await;

    assert!(matches!(
        w.pois.join_poi(Uuid::new_v4(), alice.id, None).await.unwrap_err(),
        ServiceError::PoiNotFound
    ));
}
