use crate::constants::ACCOUNT_ID_SIZE;
use crate::error::LedgerError;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Opaque account identifier. The all-zero value is reserved for the system
/// account that issues mining rewards.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct AccountId([u8; ACCOUNT_ID_SIZE]);

impl AccountId {
    pub const SYSTEM: AccountId = AccountId([0u8; ACCOUNT_ID_SIZE]);

    pub const fn from_bytes(bytes: [u8; ACCOUNT_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// A fresh random address. Never returns the system account.
    pub fn random() -> Self {
        loop {
            let id = Self(rand::random());
            if !id.is_system() {
                return id;
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8; ACCOUNT_ID_SIZE] {
        &self.0
    }

    pub fn is_system(&self) -> bool {
        *self == Self::SYSTEM
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({self})")
    }
}

impl FromStr for AccountId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; ACCOUNT_ID_SIZE];
        hex::decode_to_slice(s.trim(), &mut bytes)
            .map_err(|e| LedgerError::InvalidAccountId(format!("{s:?}: {e}")))?;
        Ok(Self(bytes))
    }
}

impl Serialize for AccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
