//! Typed records for both services.
//!
//! Decoding is lenient: missing fields and JSON `null`s fall back to the
//! documented defaults so a partial payload never fails. Encoding leaves out
//! unset optional fields instead of writing `null`.

pub mod chat;
pub mod verifier;

use serde::{Deserialize, Deserializer};

/// Deserialize `null` as the type's default value.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub(crate) fn is_none_or_empty<T>(value: &Option<Vec<T>>) -> bool {
    value.as_ref().map_or(true, Vec::is_empty)
}
