//! Everything related to the caller's identity.
//!
//! A `Session` replaces the token/role pair the browser used to keep in its storage: it is
//! built once (usually from the configuration file) and passed by reference to every component
//! that needs credentials.  Nothing in the tracker ever mutates it.
//!

use std::fmt::{Debug, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Roles known by the dispatch backend.
///
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Eq,
    PartialEq,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::VariantNames,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Role {
    /// Regular user requesting an ambulance
    #[default]
    User,
    /// Driver of an ambulance, the only one allowed to publish its position
    Driver,
    /// Dispatch operator
    Dispatcher,
}

/// Credentials and identity of the viewer.
///
#[derive(Clone, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Session {
    /// Bearer token, absent when not logged in
    pub token: Option<String>,
    /// Backend user id
    pub user_id: String,
    /// Role
    #[serde(default)]
    pub role: Role,
}

impl Session {
    pub fn new(user_id: &str, role: Role) -> Self {
        Session {
            token: None,
            user_id: user_id.to_owned(),
            role,
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_owned());
        self
    }

    /// Return the token if there is a usable one.
    ///
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// Value for the `Authorization` header.
    ///
    pub fn bearer(&self) -> Option<String> {
        self.token().map(|t| format!("Bearer {t}"))
    }

    #[inline]
    pub fn is_driver(&self) -> bool {
        self.role == Role::Driver
    }
}

/// Never print the token.
///
impl Debug for Session {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "HIDDEN"))
            .field("user_id", &self.user_id)
            .field("role", &self.role)
            .finish()
    }
}

impl Display for Session {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let auth = if self.token().is_some() {
            "HIDDEN"
        } else {
            "none"
        };
        write!(f, "{}({}) token={}", self.user_id, self.role, auth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_role_from_str() {
        assert_eq!(Role::Driver, Role::from_str("DRIVER").unwrap());
        assert_eq!(Role::Dispatcher, Role::from_str("dispatcher").unwrap());
        assert!(Role::from_str("admin").is_err());
    }

    #[test]
    fn test_role_serde() {
        let r: Role = serde_json::from_str(r#""DISPATCHER""#).unwrap();
        assert_eq!(Role::Dispatcher, r);
        assert_eq!(r#""USER""#, serde_json::to_string(&Role::User).unwrap());
    }

    #[test]
    fn test_session_token() {
        let s = Session::new("42", Role::User);
        assert!(s.token().is_none());
        assert!(s.bearer().is_none());

        let s = s.with_token("   ");
        assert!(s.token().is_none());

        let s = Session::new("42", Role::Driver).with_token("FOOBAR");
        assert_eq!(Some("Bearer FOOBAR".to_string()), s.bearer());
        assert!(s.is_driver());
    }

    #[test]
    fn test_session_hides_token() {
        let s = Session::new("42", Role::User).with_token("FOOBAR");
        assert!(!format!("{s:?}").contains("FOOBAR"));
        assert!(!s.to_string().contains("FOOBAR"));
        assert_eq!("42(USER) token=HIDDEN", s.to_string());
    }
}
