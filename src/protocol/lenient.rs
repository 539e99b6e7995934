//! Forgiving field decoders for Backend documents.
//!
//! Backends written in loosely typed languages send `null` for empty maps,
//! lists and strings, and may send a status outside the u16 range. Both are
//! accepted: `null` becomes the default value and the status keeps its low
//! 16 bits.

use serde::{Deserialize, Deserializer};

/// Treat a JSON `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Narrow any JSON integer to its low 16 bits.
pub(crate) fn wrapping_u16<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i64>::deserialize(deserializer)?.unwrap_or(0) as u16)
}
