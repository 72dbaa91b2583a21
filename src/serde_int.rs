//! Serde adapters encoding `rug::Integer` fields as unsigned big-endian
//! byte strings.

use rug::integer::Order;
use rug::Integer;
use serde::{Deserialize, Deserializer, Serializer};

pub(crate) fn serialize<S>(value: &Integer, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_bytes(&value.to_digits::<u8>(Order::Msf))
}

pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Integer, D::Error>
where
    D: Deserializer<'de>,
{
    let bytes = Vec::<u8>::deserialize(deserializer)?;
    Ok(Integer::from_digits(&bytes, Order::Msf))
}
