use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::sqlite::{SqliteArgumentValue, SqliteTypeInfo, SqliteValueRef};
use sqlx::{Decode, Encode, Sqlite, Type};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    Execute,
}

impl Access {
    fn offset(self) -> usize {
        match self {
            Access::Read => 0,
            Access::Write => 1,
            Access::Execute => 2,
        }
    }

    fn letter(self) -> u8 {
        b"rwx"[self.offset()]
    }
}

/// Nine-character POSIX mode string, e.g. `rw-r--r--`.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Perms(String);

impl Perms {
    pub const DEFAULT_FILE: &'static str = "rw-r--r--";

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `class` is 0 for owner, 1 for group, 2 for other.
    pub fn allows(&self, class: usize, access: Access) -> bool {
        self.0.as_bytes()[class * 3 + access.offset()] == access.letter()
    }
}

impl Default for Perms {
    fn default() -> Self {
        Self(Self::DEFAULT_FILE.to_string())
    }
}

impl FromStr for Perms {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        let well_formed = bytes.len() == 9
            && bytes
                .iter()
                .enumerate()
                .all(|(i, b)| *b == b'-' || *b == b"rwx"[i % 3]);
        if well_formed {
            Ok(Self(s.to_string()))
        } else {
            Err(format!("invalid perms '{}': expected rwxrwxrwx with '-'", s))
        }
    }
}

impl TryFrom<String> for Perms {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Perms> for String {
    fn from(p: Perms) -> Self {
        p.0
    }
}

impl std::fmt::Display for Perms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Decode<'_, Sqlite> for Perms {
    fn decode(value: SqliteValueRef<'_>) -> Result<Self, BoxDynError> {
        let s = <&str as Decode<Sqlite>>::decode(value)?;
        Ok(s.parse()?)
    }
}

impl Encode<'_, Sqlite> for Perms {
    fn encode_by_ref(
        &self,
        args: &mut Vec<SqliteArgumentValue<'_>>,
    ) -> Result<IsNull, BoxDynError> {
        args.push(SqliteArgumentValue::Text(self.0.clone().into()));
        Ok(IsNull::No)
    }
}

impl Type<Sqlite> for Perms {
    fn type_info() -> SqliteTypeInfo {
        <str as Type<Sqlite>>::type_info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_perms() {
        assert!("rw-r--r--".parse::<Perms>().is_ok());
        assert!("rwxrwxrwx".parse::<Perms>().is_ok());
        assert!("---------".parse::<Perms>().is_ok());
        assert!("rw-r--r-".parse::<Perms>().is_err());
        assert!("wr-r--r--".parse::<Perms>().is_err());
        assert!("rw-r--r-x-".parse::<Perms>().is_err());
    }

    #[test]
    fn test_allows() {
        let p: Perms = "rw-r-----".parse().unwrap();
        assert!(p.allows(0, Access::Write));
        assert!(p.allows(1, Access::Read));
        assert!(!p.allows(1, Access::Write));
        assert!(!p.allows(2, Access::Read));
    }
}
