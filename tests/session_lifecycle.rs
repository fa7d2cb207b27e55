//! Integration tests for the session engine: lifecycle, presence, movement.

use breakoutglobe::errors::ServiceError;
use breakoutglobe::events::DomainEvent;
use sqlx::PgPool;
use uuid::Uuid;

mod helpers;
use helpers::{make_guest, make_map, pos, world};

#[sqlx::test]
async fn create_session_persists_and_writes_presence(pool: PgPool) {
    let w = world(&pool);
    let user = make_guest(&pool, "Alice").await;
    let map = make_map(&pool, "M1").await;

    let session = w
        .sessions
        .create_session(user.id, map.id, pos(40.7128, -74.0060))
        .await
        .unwrap();

    assert!(session.is_active);
    assert_eq!(session.user_id, user.id);
    assert_eq!(session.map_id, map.id);
    assert_eq!(session.position().lat, 40.7128);

    let record = w.presence.get(session.id).expect("presence record missing");
    assert_eq!(record.user_id, user.id);
    assert_eq!(record.map_id, map.id);
    assert!(record.current_poi.is_none());
}

#[sqlx::test]
async fn second_active_session_in_same_map_conflicts(pool: PgPool) {
    let w = world(&pool);
    let user = make_guest(&pool, "Alice").await;
    let map = make_map(&pool, "M1").await;

    w.sessions
        .create_session(user.id, map.id, pos(0.0, 0.0))
        .await
        .unwrap();
    let err = w
        .sessions
        .create_session(user.id, map.id, pos(1.0, 1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::UserAlreadyInMap));

    // A different map is a different world
    let other_map = make_map(&pool, "M2").await;
    assert!(
        w.sessions
            .create_session(user.id, other_map.id, pos(0.0, 0.0))
            .await
            .is_ok()
    );
}

#[sqlx::test]
async fn create_end_create_roundtrip(pool: PgPool) {
    let w = world(&pool);
    let user = make_guest(&pool, "Alice").await;
    let map = make_map(&pool, "M1").await;

    let first = w
        .sessions
        .create_session(user.id, map.id, pos(0.0, 0.0))
        .await
        .unwrap();
    w.sessions.end_session(first.id).await.unwrap();

    let second = w
        .sessions
        .create_session(user.id, map.id, pos(0.0, 0.0))
        .await
        .unwrap();
    assert_ne!(first.id, second.id);
    assert!(w.presence.get(first.id).is_none());
    assert!(w.presence.get(second.id).is_some());
}

#[sqlx::test]
async fn create_session_rejects_unknown_map_and_user(pool: PgPool) {
    let w = world(&pool);
    let user = make_guest(&pool, "Alice").await;
    let map = make_map(&pool, "M1").await;

    let err = w
        .sessions
        .create_session(user.id, Uuid::new_v4(), pos(0.0, 0.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::MapNotFound));

    let err = w
        .sessions
        .create_session(Uuid::new_v4(), map.id, pos(0.0, 0.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::UserNotFound));
}

#[sqlx::test]
async fn position_bounds_are_inclusive(pool: PgPool) {
    let w = world(&pool);
    let user = make_guest(&pool, "Alice").await;
    let map = make_map(&pool, "M1").await;

    // Poles and antimeridian are inside the range
    let session = w
        .sessions
        .create_session(user.id, map.id, pos(90.0, 180.0))
        .await
        .unwrap();

    let err = w
        .sessions
        .update_position(session.id, pos(90.0001, 0.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[sqlx::test]
async fn update_position_persists_and_publishes(pool: PgPool) {
    let w = world(&pool);
    let user = make_guest(&pool, "Alice").await;
    let map = make_map(&pool, "M1").await;
    let session = w
        .sessions
        .create_session(user.id, map.id, pos(40.7128, -74.0060))
        .await
        .unwrap();

    let mut rx = w.events.subscribe(map.id);
    w.sessions
        .update_position(session.id, pos(41.0, -75.0))
        .await
        .unwrap();

    let listed = w.sessions.list_active_by_map(map.id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].position().lat, 41.0);
    assert_eq!(listed[0].position().lng, -75.0);

    match rx.try_recv().expect("expected avatar-moved event") {
        DomainEvent::AvatarMoved {
            session_id,
            user_id,
            position,
            ..
        } => {
            assert_eq!(session_id, session.id);
            assert_eq!(user_id, user.id);
            assert_eq!(position.lat, 41.0);
        }
        other => panic!("expected AvatarMoved, got {other:?}"),
    }
}

#[sqlx::test]
async fn update_position_on_ended_session_is_not_found(pool: PgPool) {
    let w = world(&pool);
    let user = make_guest(&pool, "Alice").await;
    let map = make_map(&pool, "M1").await;
    let session = w
        .sessions
        .create_session(user.id, map.id, pos(0.0, 0.0))
        .await
        .unwrap();
    w.sessions.end_session(session.id).await.unwrap();

    let err = w
        .sessions
        .update_position(session.id, pos(1.0, 1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::SessionNotFound));
}

#[sqlx::test]
async fn heartbeat_is_idempotent_and_monotonic(pool: PgPool) {
    let w = world(&pool);
    let user = make_guest(&pool, "Alice").await;
    let map = make_map(&pool, "M1").await;
    let session = w
        .sessions
        .create_session(user.id, map.id, pos(0.0, 0.0))
        .await
        .unwrap();

    w.sessions.heartbeat(session.id).await.unwrap();
    let after_one = w.sessions.get_session(session.id).await.unwrap();

    for _ in 0..3 {
        w.sessions.heartbeat(session.id).await.unwrap();
    }
    let after_many = w.sessions.get_session(session.id).await.unwrap();

    // Same durable state modulo the monotonically advancing timestamp
    assert!(after_many.last_active >= after_one.last_active);
    assert_eq!(after_many.is_active, after_one.is_active);
    assert_eq!(after_many.position(), after_one.position());

    let err = w.sessions.heartbeat(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, ServiceError::SessionNotFound));
}

#[sqlx::test]
async fn end_session_evicts_user_from_poi(pool: PgPool) {
    let w = world(&pool);
    let user = make_guest(&pool, "Alice").await;
    let other = make_guest(&pool, "Bob").await;
    let map = make_map(&pool, "M1").await;
    let session = w
        .sessions
        .create_session(user.id, map.id, pos(0.0, 0.0))
        .await
        .unwrap();

    let poi = w
        .pois
        .create_poi(breakoutglobe::poi::CreatePoiInput {
            map_id: map.id,
            name: "Cafe".into(),
            description: String::new(),
            position: pos(40.7, -74.0),
            max_participants: Some(5),
            created_by: other.id,
            image_url: None,
            thumbnail_url: None,
        })
        .await
        .unwrap();

    w.pois.join_poi(poi.id, user.id, Some(session.id)).await.unwrap();
    assert!(w.participation.is_member(poi.id, user.id));

    let mut rx = w.events.subscribe(map.id);
    w.sessions.end_session(session.id).await.unwrap();

    assert!(!w.participation.is_member(poi.id, user.id));
    assert!(matches!(
        rx.try_recv().expect("expected poi-left event"),
        DomainEvent::PoiLeft { .. }
    ));
}

#[sqlx::test]
async fn cleanup_expires_stale_sessions_like_an_explicit_end(pool: PgPool) {
    let w = world(&pool);
    let user = make_guest(&pool, "Alice").await;
    let other = make_guest(&pool, "Bob").await;
    let map = make_map(&pool, "M1").await;
    let session = w
        .sessions
        .create_session(user.id, map.id, pos(0.0, 0.0))
        .await
        .unwrap();

    let poi = w
        .pois
        .create_poi(breakoutglobe::poi::CreatePoiInput {
            map_id: map.id,
            name: "Cafe".into(),
            description: String::new(),
            position: pos(40.7, -74.0),
            max_participants: Some(5),
            created_by: other.id,
            image_url: None,
            thumbnail_url: None,
        })
        .await
        .unwrap();
    w.pois.join_poi(poi.id, user.id, Some(session.id)).await.unwrap();

    // Backdate the heartbeat past the 30-minute TTL
    sqlx::query("UPDATE sessions SET last_active = now() - interval '31 minutes' WHERE id = $1")
        .bind(session.id)
        .execute(&pool)
        .await
        .unwrap();

    let expired = w.sessions.cleanup_expired().await.unwrap();
    assert_eq!(expired, 1);

    let stored = w.sessions.get_session(session.id).await.unwrap();
    assert!(!stored.is_active);
    assert!(!w.participation.is_member(poi.id, user.id));
    assert!(w.sessions.list_active_by_map(map.id).await.unwrap().is_empty());

    // A fresh session is unaffected by the next sweep
    let fresh = w
        .sessions
        .create_session(user.id, map.id, pos(0.0, 0.0))
        .await
        .unwrap();
    assert_eq!(w.sessions.cleanup_expired().await.unwrap(), 0);
    assert!(w.sessions.get_session(fresh.id).await.unwrap().is_active);
}
