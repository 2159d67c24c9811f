use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::sqlite::{SqliteArgumentValue, SqliteTypeInfo, SqliteValueRef};
use sqlx::{Decode, Encode, Sqlite, Type};

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    #[default]
    File,
    Dir,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::File => "file",
            ResourceKind::Dir => "dir",
        }
    }
}

impl Decode<'_, Sqlite> for ResourceKind {
    fn decode(value: SqliteValueRef<'_>) -> Result<Self, BoxDynError> {
        match <&str as Decode<Sqlite>>::decode(value)? {
            "file" => Ok(ResourceKind::File),
            "dir" => Ok(ResourceKind::Dir),
            other => Err(format!("invalid resource type: {}", other).into()),
        }
    }
}

impl Encode<'_, Sqlite> for ResourceKind {
    fn encode_by_ref(
        &self,
        args: &mut Vec<SqliteArgumentValue<'_>>,
    ) -> Result<IsNull, BoxDynError> {
        args.push(SqliteArgumentValue::Text(self.as_str().into()));
        Ok(IsNull::No)
    }
}

impl Type<Sqlite> for ResourceKind {
    fn type_info() -> SqliteTypeInfo {
        <str as Type<Sqlite>>::type_info()
    }
}
