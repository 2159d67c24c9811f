use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::sqlite::{SqliteArgumentValue, SqliteTypeInfo, SqliteValueRef};
use sqlx::{Decode, Encode, Sqlite, Type};

pub const BYTES_PER_GB: i64 = 1_000_000_000;

/// Exact byte accounting, exposed to JSON as (fractional) gigabytes.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ByteCount(i64);

impl ByteCount {
    pub const ZERO: ByteCount = ByteCount(0);

    pub const fn new(bytes: i64) -> Self {
        Self(bytes)
    }

    pub const fn bytes(self) -> i64 {
        self.0
    }

    pub fn from_gb(gb: f64) -> Self {
        Self((gb * BYTES_PER_GB as f64).round() as i64)
    }

    pub fn as_gb(self) -> f64 {
        self.0 as f64 / BYTES_PER_GB as f64
    }

    pub fn saturating_sub(self, other: ByteCount) -> Self {
        Self(self.0.saturating_sub(other.0).max(0))
    }
}

impl From<i64> for ByteCount {
    fn from(bytes: i64) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Display for ByteCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}B", self.0)
    }
}

impl Serialize for ByteCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_gb())
    }
}

impl<'de> Deserialize<'de> for ByteCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        f64::deserialize(deserializer).map(Self::from_gb)
    }
}

impl Decode<'_, Sqlite> for ByteCount {
    fn decode(value: SqliteValueRef<'_>) -> Result<Self, BoxDynError> {
        Ok(Self(<i64 as Decode<Sqlite>>::decode(value)?))
    }
}

impl Encode<'_, Sqlite> for ByteCount {
    fn encode_by_ref(
        &self,
        args: &mut Vec<SqliteArgumentValue<'_>>,
    ) -> Result<IsNull, BoxDynError> {
        args.push(SqliteArgumentValue::Int64(self.0));
        Ok(IsNull::No)
    }
}

impl Type<Sqlite> for ByteCount {
    fn compatible(ty: &SqliteTypeInfo) -> bool {
        <i64 as Type<Sqlite>>::compatible(ty)
    }

    fn type_info() -> SqliteTypeInfo {
        <i64 as Type<Sqlite>>::type_info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gb_conversion_is_exact_in_bytes() {
        assert_eq!(ByteCount::from_gb(1.0).bytes(), BYTES_PER_GB);
        assert_eq!(ByteCount::from_gb(0.000001).bytes(), 1000);
        assert_eq!(ByteCount::new(5).as_gb(), 5e-9);
    }

    #[test]
    fn test_json_is_gigabytes() {
        let json = serde_json::to_string(&ByteCount::new(2 * BYTES_PER_GB)).unwrap();
        assert_eq!(json, "2.0");
        let parsed: ByteCount = serde_json::from_str("0.5").unwrap();
        assert_eq!(parsed.bytes(), BYTES_PER_GB / 2);
    }

    #[test]
    fn test_saturating_sub_clamps() {
        assert_eq!(ByteCount::new(3).saturating_sub(ByteCount::new(5)), ByteCount::ZERO);
    }
}
