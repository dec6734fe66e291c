use serde_json::{json, Value};
use uuid::Uuid;

/// Body of a successful password grant or refresh.
pub fn session_json(user_id: Uuid, email: &str, expires_in: i64) -> Value {
    json!({
        "access_token": format!("access-{}", user_id),
        "refresh_token": format!("refresh-{}", user_id),
        "token_type": "bearer",
        "expires_in": expires_in,
        "user": user_json(user_id, email, json!({})),
    })
}

pub fn user_json(user_id: Uuid, email: &str, metadata: Value) -> Value {
    json!({
        "id": user_id,
        "aud": "authenticated",
        "email": email,
        "user_metadata": metadata,
    })
}

/// A `users` row as selected during identity resolution.
pub fn profile_row_json(role: &str, first_name: &str, last_name: &str) -> Value {
    json!({ "role": role, "prenom": first_name, "nom": last_name })
}

/// An `events` row with the given signups embedded.
pub fn event_json(id: i64, title: &str, date: &str, signups: Value) -> Value {
    json!({
        "id": id,
        "titre": title,
        "date": date,
        "heure_debut": "09:00:00",
        "heure_fin": "12:00:00",
        "description": "",
        "nb_places": 5,
        "urgence": false,
        "annule": false,
        "inscriptions": signups,
    })
}

pub fn notification_json(id: i64, user_id: Uuid, message: &str, seen: bool) -> Value {
    json!({
        "id": id,
        "user_id": user_id,
        "message": message,
        "type": "nouvel_evenement",
        "created_at": "2026-10-18T08:30:00.123456+00:00",
        "vu": seen,
    })
}

/// Error body in the auth service's format.
pub fn auth_error_json(message: &str) -> Value {
    json!({ "error": "invalid_grant", "error_description": message })
}
