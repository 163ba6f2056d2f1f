//! User identity model
//!
//! [`UserId`] is the one canonical identifier type. Upstream collaborators
//! (token issuers, legacy clients) send user ids as JSON numbers, floats or
//! decimal strings; everything is normalized here, once, at the boundary.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical user identifier (positive i64)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(transparent))]
pub struct UserId(i64);

/// Rejected user identifier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid user id: {0}")]
pub struct InvalidUserId(pub String);

impl UserId {
    pub fn new(raw: i64) -> Result<Self, InvalidUserId> {
        if raw > 0 {
            Ok(Self(raw))
        } else {
            Err(InvalidUserId(raw.to_string()))
        }
    }

    pub fn get(self) -> i64 {
        self.0
    }

    fn from_f64(raw: f64) -> Result<Self, InvalidUserId> {
        // Integral floats only; 2^53 is the last exactly representable integer
        if raw.is_finite() && raw.fract() == 0.0 && raw.abs() <= 9_007_199_254_740_992.0 {
            Self::new(raw as i64)
        } else {
            Err(InvalidUserId(raw.to_string()))
        }
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = InvalidUserId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(v) = trimmed.parse::<i64>() {
            return Self::new(v);
        }
        match trimmed.parse::<f64>() {
            Ok(v) => Self::from_f64(v),
            Err(_) => Err(InvalidUserId(s.to_string())),
        }
    }
}

impl TryFrom<i64> for UserId {
    type Error = InvalidUserId;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct UserIdVisitor;

        impl Visitor<'_> for UserIdVisitor {
            type Value = UserId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a positive integer user id (number or string)")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<UserId, E> {
                UserId::new(v).map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<UserId, E> {
                let v = i64::try_from(v).map_err(|_| E::custom(InvalidUserId(v.to_string())))?;
                UserId::new(v).map_err(E::custom)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<UserId, E> {
                UserId::from_f64(v).map_err(E::custom)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<UserId, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(UserIdVisitor)
    }
}

/// Caller role carried in the access token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Staff,
    Admin,
}

impl Role {
    /// Staff and admins form the back office: they drive order status and
    /// receive the admin notification pool.
    pub fn is_back_office(self) -> bool {
        matches!(self, Role::Staff | Role::Admin)
    }

    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// User directory entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: Option<String>,
    pub stored_address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        id: UserId,
    }

    #[test]
    fn accepts_number_string_and_integral_float() {
        let a: Wrapper = serde_json::from_str(r#"{"id": 42}"#).unwrap();
        let b: Wrapper = serde_json::from_str(r#"{"id": "42"}"#).unwrap();
        let c: Wrapper = serde_json::from_str(r#"{"id": 42.0}"#).unwrap();
        let d: Wrapper = serde_json::from_str(r#"{"id": " 42 "}"#).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.id, c.id);
        assert_eq!(c.id, d.id);
        assert_eq!(a.id.get(), 42);
    }

    #[test]
    fn rejects_fractional_negative_and_garbage() {
        assert!(serde_json::from_str::<Wrapper>(r#"{"id": 4.5}"#).is_err());
        assert!(serde_json::from_str::<Wrapper>(r#"{"id": -3}"#).is_err());
        assert!(serde_json::from_str::<Wrapper>(r#"{"id": 0}"#).is_err());
        assert!(serde_json::from_str::<Wrapper>(r#"{"id": "abc"}"#).is_err());
        assert!(serde_json::from_str::<Wrapper>(r#"{"id": null}"#).is_err());
    }

    #[test]
    fn serializes_as_plain_number() {
        let id = UserId::new(7).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
    }

    #[test]
    fn back_office_roles() {
        assert!(Role::Admin.is_back_office());
        assert!(Role::Staff.is_back_office());
        assert!(!Role::Customer.is_back_office());
        assert!(!Role::Staff.is_admin());
    }
}
