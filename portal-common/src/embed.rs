//! Helpers for relations embedded by the data API.

use serde::{Deserialize, Deserializer};

/// Deserialize a to-one embedded relation.
///
/// Depending on how the foreign key is detected the backend returns either
/// an object, a one-element array or null; all three are accepted.
pub fn one<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Embedded<T> {
        Many(Vec<T>),
        One(T),
    }

    Ok(match Option::<Embedded<T>>::deserialize(deserializer)? {
        None => None,
        Some(Embedded::One(value)) => Some(value),
        Some(Embedded::Many(values)) => values.into_iter().next(),
    })
}
