use std::sync::Arc;

use chrono::NaiveDate;
use portal_client::auth::SESSION_KEY;
use portal_client::cache::CACHE_KEY;
use portal_client::test_util::mock_backend::{
    auth_error_json, event_json, notification_json, profile_row_json, session_json, user_json,
};
use portal_client::test_util::{portal_with_memory_store, test_profile, TEST_ANON_KEY};
use portal_client::{Error, KeyValueStore, MemoryStore, Phase, Portal, Registration, SignUpOutcome};
use portal_common::{Event, EventDraft, RecordId, Role};
use serde_json::{json, Value};
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mock_sign_in(server: &MockServer, user_id: Uuid, email: &str) {
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(header("apikey", TEST_ANON_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_json(user_id, email, 3600)))
        .mount(server)
        .await;
}

async fn mock_profile_row(server: &MockServer, user_id: Uuid, row: Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("select", "role,prenom,nom"))
        .and(query_param("id", format!("eq.{}", user_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(row))
        .mount(server)
        .await;
}

async fn signed_in_portal(server: &MockServer) -> (Portal, Uuid) {
    let user_id = Uuid::new_v4();
    mock_sign_in(server, user_id, "jeanne@example.fr").await;
    let (portal, _store) = portal_with_memory_store(&server.uri());
    portal
        .account
        .login("jeanne@example.fr", "secret123")
        .await
        .unwrap();
    (portal, user_id)
}

fn stored_session(store: &MemoryStore) -> Option<Value> {
    store
        .get(SESSION_KEY)
        .unwrap()
        .map(|raw| serde_json::from_str(&raw).unwrap())
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_login_persists_session_and_emits_change() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();
    mock_sign_in(&server, user_id, "jeanne@example.fr").await;

    let (portal, store) = portal_with_memory_store(&server.uri());
    let mut changes = portal.auth.subscribe();

    let session = portal
        .account
        .login("jeanne@example.fr", "secret123")
        .await
        .unwrap();

    assert_eq!(session.user_id(), user_id);
    assert!(session.expires_at.is_some());

    let stored = stored_session(&store).unwrap();
    assert_eq!(stored["user"]["id"], json!(user_id));

    let change = changes.recv().await.unwrap();
    assert_eq!(change.event, portal_client::AuthChangeEvent::SignedIn);
    assert_eq!(change.session.unwrap().user_id(), user_id);
}

#[tokio::test]
async fn test_login_failure_surfaces_service_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(auth_error_json("Invalid login credentials")))
        .mount(&server)
        .await;

    let (portal, store) = portal_with_memory_store(&server.uri());
    let err = portal.account.login("a@b.fr", "wrong").await.unwrap_err();

    assert_eq!(err.to_string(), "Invalid login credentials");
    assert!(store.get(SESSION_KEY).unwrap().is_none());
}

#[tokio::test]
async fn test_expired_session_is_refreshed() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(body_partial_json(json!({ "refresh_token": "old-refresh" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_json(user_id, "a@b.fr", 3600)))
        .expect(1)
        .mount(&server)
        .await;

    let (portal, store) = portal_with_memory_store(&server.uri());
    let expired = json!({
        "access_token": "old-access",
        "refresh_token": "old-refresh",
        "token_type": "bearer",
        "expires_at": 1_000,
        "user": user_json(user_id, "a@b.fr", json!({})),
    });
    store.set(SESSION_KEY, &expired.to_string()).unwrap();

    let session = portal.auth.get_session().await.unwrap().unwrap();
    assert_eq!(session.access_token, format!("access-{}", user_id));
    assert_eq!(
        stored_session(&store).unwrap()["access_token"],
        json!(format!("access-{}", user_id))
    );
}

#[tokio::test]
async fn test_rejected_refresh_ends_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(auth_error_json("Invalid Refresh Token")))
        .mount(&server)
        .await;

    let (portal, store) = portal_with_memory_store(&server.uri());
    let expired = json!({
        "access_token": "old-access",
        "refresh_token": "old-refresh",
        "expires_at": 1_000,
        "user": user_json(Uuid::new_v4(), "a@b.fr", json!({})),
    });
    store.set(SESSION_KEY, &expired.to_string()).unwrap();

    assert!(portal.auth.get_session().await.unwrap().is_none());
    assert!(store.get(SESSION_KEY).unwrap().is_none());
}

#[tokio::test]
async fn test_unreadable_session_is_discarded() {
    let server = MockServer::start().await;
    let (portal, store) = portal_with_memory_store(&server.uri());
    store.set(SESSION_KEY, "{not json").unwrap();

    assert!(portal.auth.get_session().await.unwrap().is_none());
    assert!(store.get(SESSION_KEY).unwrap().is_none());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_logout_clears_session_even_when_remote_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (portal, _) = signed_in_portal(&server).await;
    portal.account.logout().await.unwrap();

    assert!(portal.auth.get_session().await.unwrap().is_none());
}

#[tokio::test]
async fn test_password_reset_sends_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/recover"))
        .and(query_param("redirect_to", "https://portal.example.fr/update-password"))
        .and(body_partial_json(json!({ "email": "a@b.fr" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let mut config = portal_client::test_util::test_config(&server.uri());
    config.auth.reset_redirect_url = Some("https://portal.example.fr/update-password".to_string());
    let portal = Portal::with_store(config, store).unwrap();

    portal.account.request_password_reset("a@b.fr").await.unwrap();
}

// ---------------------------------------------------------------------------
// Data API
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_signed_out_requests_use_anon_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/events"))
        .and(header("apikey", TEST_ANON_KEY))
        .and(header("authorization", format!("Bearer {}", TEST_ANON_KEY).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let (portal, _) = portal_with_memory_store(&server.uri());
    let events = portal.events.calendar().await.unwrap();
    assert!(events.is_empty());
}

#[tokio::test]
async fn test_upcoming_events_query_and_embedding() {
    let server = MockServer::start().await;
    let (portal, user_id) = signed_in_portal(&server).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/events"))
        .and(query_param("select", "*,inscriptions(id,user_id,users(id,email,nom,prenom))"))
        .and(query_param("date", "gte.2026-10-19"))
        .and(query_param("annule", "eq.false"))
        .and(query_param("order", "date.asc"))
        .and(header("authorization", format!("Bearer access-{}", user_id).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            event_json(1, "Maraude", "2026-10-20", json!([
                {"id": 10, "user_id": user_id, "users": {"id": user_id, "email": "jeanne@example.fr", "prenom": "Jeanne", "nom": "Martin"}}
            ])),
            event_json(2, "Collecte", "2026-10-22", json!([])),
        ])))
        .mount(&server)
        .await;

    let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
    let events = portal.events.upcoming_from(today).await.unwrap();

    assert_eq!(events.len(), 2);
    assert!(events[0].is_signed_up(user_id));
    assert_eq!(events[0].remaining_seats(), Some(4));
    assert_eq!(events[0].signups[0].user.as_ref().unwrap().display_name(), "Jeanne Martin");
    assert!(!events[1].is_signed_up(user_id));
    assert_eq!(events[1].duration_hours(), 3.0);
}

#[tokio::test]
async fn test_backend_error_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/events"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "code": "42501",
            "message": "permission denied for table events",
        })))
        .mount(&server)
        .await;

    let (portal, _) = portal_with_memory_store(&server.uri());
    let err = portal.events.calendar().await.unwrap_err();
    assert_eq!(err.to_string(), "permission denied for table events");
}

#[tokio::test]
async fn test_get_missing_event_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/events"))
        .and(query_param("id", "eq.99"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let (portal, _) = portal_with_memory_store(&server.uri());
    let err = portal.events.get(&RecordId::from("99")).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

// ---------------------------------------------------------------------------
// Signups
// ---------------------------------------------------------------------------

fn event_with(signups: Value) -> Event {
    serde_json::from_value(event_json(7, "Maraude", "2026-10-20", signups)).unwrap()
}

#[tokio::test]
async fn test_sign_up_inserts_row() {
    let server = MockServer::start().await;
    let (portal, user_id) = signed_in_portal(&server).await;

    Mock::given(method("HEAD"))
        .and(path("/rest/v1/inscriptions"))
        .and(query_param("event_id", "eq.7"))
        .and(query_param("user_id", format!("eq.{}", user_id)))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/0"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/inscriptions"))
        .and(body_partial_json(json!({ "event_id": "7", "user_id": user_id })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let mut profile = test_profile(Role::Volunteer);
    profile.id = user_id;
    portal
        .signups
        .sign_up(Some(&profile), &event_with(json!([])))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_sign_up_twice_is_refused_without_insert() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/inscriptions"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let (portal, _) = portal_with_memory_store(&server.uri());
    let profile = test_profile(Role::Volunteer);
    let event = event_with(json!([{ "id": 1, "user_id": profile.id }]));

    let err = portal.signups.sign_up(Some(&profile), &event).await.unwrap_err();
    assert!(matches!(err, Error::AlreadySignedUp(id) if id.as_str() == "7"));
}

#[tokio::test]
async fn test_sign_up_refused_when_row_already_exists() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/inscriptions"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "0-0/1"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/inscriptions"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let (portal, _) = portal_with_memory_store(&server.uri());
    let profile = test_profile(Role::Volunteer);

    let err = portal
        .signups
        .sign_up(Some(&profile), &event_with(json!([])))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadySignedUp(_)));
}

#[tokio::test]
async fn test_join_fetches_event_then_inserts() {
    let server = MockServer::start().await;
    let profile = test_profile(Role::Volunteer);

    Mock::given(method("GET"))
        .and(path("/rest/v1/events"))
        .and(query_param("id", "eq.7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            event_json(7, "Maraude", "2026-10-20", json!([]))
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/inscriptions"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/0"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/inscriptions"))
        .and(body_partial_json(json!({ "event_id": "7", "user_id": profile.id })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let (portal, _) = portal_with_memory_store(&server.uri());
    let event = portal
        .signups
        .join(Some(&profile), &RecordId::from("7"))
        .await
        .unwrap();
    assert_eq!(event.title, "Maraude");
}

#[tokio::test]
async fn test_join_signed_out_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let (portal, _) = portal_with_memory_store(&server.uri());
    let err = portal
        .signups
        .join(None, &RecordId::from("3"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotSignedIn));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_withdraw_deletes_own_row() {
    let server = MockServer::start().await;
    let profile = test_profile(Role::Volunteer);

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/inscriptions"))
        .and(query_param("event_id", "eq.7"))
        .and(query_param("user_id", format!("eq.{}", profile.id)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let (portal, _) = portal_with_memory_store(&server.uri());
    portal
        .signups
        .withdraw(Some(&profile), &RecordId::from("7"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_my_hours_sums_event_durations() {
    let server = MockServer::start().await;
    let profile = test_profile(Role::Volunteer);

    Mock::given(method("GET"))
        .and(path("/rest/v1/inscriptions"))
        .and(query_param("select", "events(id,titre,date,heure_debut,heure_fin)"))
        .and(query_param("user_id", format!("eq.{}", profile.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"events": {"id": 2, "titre": "B", "date": "2026-09-02", "heure_debut": "14:00:00", "heure_fin": "15:30:00"}},
            {"events": {"id": 1, "titre": "A", "date": "2026-09-01", "heure_debut": "09:00:00", "heure_fin": "12:00:00"}},
            {"events": null}
        ])))
        .mount(&server)
        .await;

    let (portal, _) = portal_with_memory_store(&server.uri());
    let summary = portal.signups.my_hours(Some(&profile)).await.unwrap();

    assert_eq!(summary.events.len(), 2);
    assert_eq!(summary.events[0].title, "A");
    assert!((summary.total_hours - 4.5).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_self_service_requires_volunteer_role() {
    let server = MockServer::start().await;
    let (portal, _) = portal_with_memory_store(&server.uri());

    let admin = test_profile(Role::Admin);
    assert!(matches!(
        portal.signups.mine(Some(&admin)).await,
        Err(Error::Forbidden(_))
    ));
    assert!(matches!(portal.signups.my_hours(None).await, Err(Error::NotSignedIn)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Admin operations and notifications
// ---------------------------------------------------------------------------

fn draft() -> EventDraft {
    EventDraft {
        title: "Distribution".to_string(),
        date: NaiveDate::from_ymd_opt(2026, 11, 3).unwrap(),
        start_time: "10:00".to_string(),
        end_time: "13:00".to_string(),
        description: "Quai 4".to_string(),
        seats: Some(0),
        urgent: true,
    }
}

#[tokio::test]
async fn test_create_event_notifies_volunteers() {
    let server = MockServer::start().await;
    let volunteers = [Uuid::new_v4(), Uuid::new_v4()];

    Mock::given(method("POST"))
        .and(path("/rest/v1/events"))
        .and(body_partial_json(json!({ "titre": "Distribution", "urgence": true, "nb_places": 0 })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("select", "id"))
        .and(query_param("role", "eq.benevole"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": volunteers[0]}, {"id": volunteers[1]}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/notifications"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let (portal, _) = portal_with_memory_store(&server.uri());
    let admin = test_profile(Role::Admin);
    let notified = portal.events.create(Some(&admin), &draft()).await.unwrap();
    assert_eq!(notified, 2);

    let requests = server.received_requests().await.unwrap();
    let notifications = requests
        .iter()
        .find(|r| r.url.path() == "/rest/v1/notifications")
        .unwrap();
    let body: Value = serde_json::from_slice(&notifications.body).unwrap();
    assert_eq!(
        body,
        json!([
            {"user_id": volunteers[0], "message": "Nouvel événement : Distribution", "type": "nouvel_evenement"},
            {"user_id": volunteers[1], "message": "Nouvel événement : Distribution", "type": "nouvel_evenement"},
        ])
    );
}

#[tokio::test]
async fn test_fan_out_failure_does_not_fail_create() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/events"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "boom" })))
        .mount(&server)
        .await;

    let (portal, _) = portal_with_memory_store(&server.uri());
    let admin = test_profile(Role::Admin);
    assert_eq!(portal.events.create(Some(&admin), &draft()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_create_event_failure_skips_fan_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/events"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "message": "invalid input syntax for type date" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let (portal, _) = portal_with_memory_store(&server.uri());
    let admin = test_profile(Role::Admin);
    let err = portal.events.create(Some(&admin), &draft()).await.unwrap_err();
    assert_eq!(err.to_string(), "invalid input syntax for type date");
}

#[tokio::test]
async fn test_admin_operations_refused_for_volunteer() {
    let server = MockServer::start().await;
    let (portal, _) = portal_with_memory_store(&server.uri());
    let volunteer = test_profile(Role::Volunteer);
    let id = RecordId::from("1");

    assert!(matches!(
        portal.events.create(Some(&volunteer), &draft()).await,
        Err(Error::Forbidden(_))
    ));
    assert!(matches!(
        portal.events.cancel(Some(&volunteer), &id).await,
        Err(Error::Forbidden(_))
    ));
    assert!(matches!(
        portal.volunteers.with_hours(Some(&volunteer)).await,
        Err(Error::Forbidden(_))
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_edit_by_volunteer_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let (portal, _) = portal_with_memory_store(&server.uri());
    let volunteer = test_profile(Role::Volunteer);
    let err = portal
        .events
        .edit(Some(&volunteer), &RecordId::from("3"), |draft| draft)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_edit_patches_changed_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/events"))
        .and(query_param("id", "eq.7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            event_json(7, "Maraude", "2026-10-20", json!([]))
        ])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/events"))
        .and(query_param("id", "eq.7"))
        .and(body_partial_json(json!({ "titre": "Maraude", "heure_fin": "13:00", "urgence": true })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let (portal, _) = portal_with_memory_store(&server.uri());
    let admin = test_profile(Role::Admin);
    portal
        .events
        .edit(Some(&admin), &RecordId::from("7"), |mut draft| {
            draft.end_time = "13:00".to_string();
            draft.urgent = true;
            draft
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_cancel_marks_event_cancelled() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/events"))
        .and(query_param("id", "eq.5"))
        .and(body_partial_json(json!({ "annule": true })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let (portal, _) = portal_with_memory_store(&server.uri());
    let admin = test_profile(Role::Admin);
    portal
        .events
        .cancel(Some(&admin), &RecordId::from("5"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_volunteers_with_hours() {
    let server = MockServer::start().await;
    let alice = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("role", "eq.benevole"))
        .and(query_param("order", "prenom.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": alice, "prenom": "Alice", "nom": "A", "email": "alice@x.fr"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/inscriptions"))
        .and(query_param("select", "user_id,events(heure_debut,heure_fin)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"user_id": alice, "events": {"heure_debut": "08:00:00", "heure_fin": "10:00:00"}},
            {"user_id": alice, "events": [{"heure_debut": "13:00:00", "heure_fin": "14:00:00"}]}
        ])))
        .mount(&server)
        .await;

    let (portal, _) = portal_with_memory_store(&server.uri());
    let rows = portal
        .volunteers
        .with_hours(Some(&test_profile(Role::Admin)))
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].email, "alice@x.fr");
    assert_eq!(rows[0].hours, 3.0);
}

#[tokio::test]
async fn test_notifications_listed_and_marked_seen() {
    let server = MockServer::start().await;
    let profile = test_profile(Role::Volunteer);

    Mock::given(method("GET"))
        .and(path("/rest/v1/notifications"))
        .and(query_param("user_id", format!("eq.{}", profile.id)))
        .and(query_param("order", "created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            notification_json(3, profile.id, "Nouvel événement : C", false),
            notification_json(2, profile.id, "Nouvel événement : B", true),
            notification_json(1, profile.id, "Nouvel événement : A", false),
        ])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/notifications"))
        .and(query_param("id", "in.(3,1)"))
        .and(body_partial_json(json!({ "vu": true })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let (portal, _) = portal_with_memory_store(&server.uri());
    let notifications = portal
        .notifications
        .list_and_mark_seen(Some(&profile))
        .await
        .unwrap();

    assert_eq!(notifications.len(), 3);
    assert!(!notifications[0].seen);
    assert!(notifications[0].created_at().is_some());
}

#[tokio::test]
async fn test_unread_count_uses_exact_count() {
    let server = MockServer::start().await;
    let profile = test_profile(Role::Volunteer);

    Mock::given(method("HEAD"))
        .and(path("/rest/v1/notifications"))
        .and(query_param("user_id", format!("eq.{}", profile.id)))
        .and(query_param("vu", "eq.false"))
        .and(header("prefer", "count=exact"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "0-2/3"))
        .mount(&server)
        .await;

    let (portal, _) = portal_with_memory_store(&server.uri());
    assert_eq!(portal.notifications.unread_count(Some(&profile)).await.unwrap(), 3);
}

// ---------------------------------------------------------------------------
// Account registration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_register_creates_volunteer_row() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .and(body_partial_json(json!({
            "email": "jeanne@example.fr",
            "data": {"prenom": "Jeanne", "nom": "Martin", "role": "benevole"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json(
            user_id,
            "jeanne@example.fr",
            json!({"prenom": "Jeanne", "nom": "Martin", "role": "benevole"}),
        )))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .and(body_partial_json(json!({
            "id": user_id, "prenom": "Jeanne", "nom": "Martin", "role": "benevole"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let (portal, _) = portal_with_memory_store(&server.uri());
    let outcome = portal
        .account
        .register(&Registration {
            email: "jeanne@example.fr".to_string(),
            password: "secret123".to_string(),
            first_name: "Jeanne".to_string(),
            last_name: "Martin".to_string(),
        })
        .await
        .unwrap();

    assert!(matches!(outcome, SignUpOutcome::ConfirmationRequired(ref u) if u.id == user_id));

    let requests = server.received_requests().await.unwrap();
    let upsert = requests
        .iter()
        .find(|r| r.url.path() == "/rest/v1/users")
        .unwrap();
    let prefer = upsert.headers.get("prefer").unwrap().to_str().unwrap();
    assert!(prefer.contains("resolution=merge-duplicates"));
}

// ---------------------------------------------------------------------------
// Identity resolution against the backend
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_identity_follows_login_and_logout() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();
    mock_sign_in(&server, user_id, "admin@example.fr").await;
    mock_profile_row(&server, user_id, json!([profile_row_json("admin", "Ada", "Admin")])).await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let (portal, store) = portal_with_memory_store(&server.uri());
    let identity = portal.identity();
    assert_eq!(identity.resolved().await.profile, None);

    let mut state = identity.subscribe();
    portal.account.login("admin@example.fr", "pw").await.unwrap();
    let signed_in = state
        .wait_for(|s| s.phase == Phase::Resolved && s.profile.is_some())
        .await
        .unwrap()
        .clone();
    let profile = signed_in.profile.unwrap();
    assert_eq!(profile.role, Role::Admin);
    assert_eq!(profile.email, "admin@example.fr");
    assert!(store.get(CACHE_KEY).unwrap().is_some());

    portal.account.logout().await.unwrap();
    let signed_out = state
        .wait_for(|s| s.phase == Phase::Resolved && s.profile.is_none())
        .await
        .unwrap()
        .clone();
    assert!(!signed_out.loading);
    assert!(store.get(CACHE_KEY).unwrap().is_none());
}

#[tokio::test]
async fn test_identity_falls_back_to_metadata_without_row() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();
    mock_profile_row(&server, user_id, json!([])).await;

    let (portal, store) = portal_with_memory_store(&server.uri());
    let session = json!({
        "access_token": "a",
        "refresh_token": "r",
        "expires_in": 3600,
        "expires_at": chrono::Utc::now().timestamp() + 3600,
        "user": user_json(user_id, "new@example.fr", json!({"role": "benevole", "prenom": "Nina", "nom": "N"})),
    });
    store.set(SESSION_KEY, &session.to_string()).unwrap();

    let state = portal.identity().resolved().await;
    let profile = state.profile.unwrap();
    assert_eq!(profile.role, Role::Volunteer);
    assert_eq!(profile.first_name, "Nina");
}

#[tokio::test]
async fn test_identity_lookup_error_means_no_profile() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({ "message": "unavailable" })))
        .expect(1)
        .mount(&server)
        .await;

    let (portal, store) = portal_with_memory_store(&server.uri());
    let session = json!({
        "access_token": "a",
        "expires_at": chrono::Utc::now().timestamp() + 3600,
        "user": user_json(user_id, "x@example.fr", json!({})),
    });
    store.set(SESSION_KEY, &session.to_string()).unwrap();

    let state = portal.identity().resolved().await;
    assert_eq!(state.profile, None);
    assert!(!state.loading);
}
