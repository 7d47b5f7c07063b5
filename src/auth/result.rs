//! Typed outcomes of the authenticate, refresh and validate flows.

use chrono::{DateTime, Utc};

use super::claims::ClaimSet;
use super::codec::TokenError;
use super::store::Principal;

/// Generic credential failure; identical for unknown principals and wrong
/// secrets.
pub const AUTHENTICATION_FAILED: &str = "Authentication failed.";
pub const PRINCIPAL_NOT_FOUND: &str = "Principal not found.";
pub const STALE_TOKEN: &str = "Stale token.";
pub const INVALID_SECURITY_STAMP: &str = "Invalid security stamp.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Ok,
    Rejected,
    NotFound,
}

impl Status {
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Rejected => 403,
            Self::NotFound => 404,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectionKind {
    CredentialFailure,
    TokenMalformed,
    TokenExpired,
    PrincipalNotFound,
    StampMismatch,
}

impl RejectionKind {
    /// Expired and malformed tokens share a status on purpose.
    #[must_use]
    pub const fn status(self) -> Status {
        match self {
            Self::PrincipalNotFound => Status::NotFound,
            Self::CredentialFailure
            | Self::TokenMalformed
            | Self::TokenExpired
            | Self::StampMismatch => Status::Rejected,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub message: String,
}

impl Rejection {
    #[must_use]
    pub fn new(kind: RejectionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn credentials() -> Self {
        Self::new(RejectionKind::CredentialFailure, AUTHENTICATION_FAILED)
    }

    #[must_use]
    pub fn token(err: &TokenError) -> Self {
        let kind = if err.is_expired() {
            RejectionKind::TokenExpired
        } else {
            RejectionKind::TokenMalformed
        };
        Self::new(kind, err.to_string())
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::new(RejectionKind::PrincipalNotFound, PRINCIPAL_NOT_FOUND)
    }

    #[must_use]
    pub const fn status(&self) -> Status {
        self.kind.status()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of authenticate and refresh: a token or a rejection, never both.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthResult {
    Issued(IssuedToken),
    Rejected(Rejection),
}

impl AuthResult {
    #[must_use]
    pub const fn status(&self) -> Status {
        match self {
            Self::Issued(_) => Status::Ok,
            Self::Rejected(rejection) => rejection.status(),
        }
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Issued(issued) => Some(&issued.token),
            Self::Rejected(_) => None,
        }
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Issued(issued) => Some(issued.expires_at),
            Self::Rejected(_) => None,
        }
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Issued(_) => None,
            Self::Rejected(rejection) => Some(&rejection.message),
        }
    }

    #[must_use]
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Issued(_) => None,
            Self::Rejected(rejection) => Some(rejection),
        }
    }
}

/// A token that passed signature, expiry and stamp checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedToken {
    pub principal: Principal,
    pub claims: ClaimSet,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationResult {
    Valid(ValidatedToken),
    Rejected(Rejection),
}

impl ValidationResult {
    #[must_use]
    pub const fn status(&self) -> Status {
        match self {
            Self::Valid(_) => Status::Ok,
            Self::Rejected(rejection) => rejection.status(),
        }
    }

    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Self::Valid(valid) => Some(&valid.principal),
            Self::Rejected(_) => None,
        }
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Valid(_) => None,
            Self::Rejected(rejection) => Some(&rejection.message),
        }
    }

    #[must_use]
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Valid(_) => None,
            Self::Rejected(rejection) => Some(rejection),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(Status::Ok.code(), 200);
        assert_eq!(Status::Rejected.code(), 403);
        assert_eq!(Status::NotFound.code(), 404);
    }

    #[test]
    fn expired_and_forged_share_a_status() {
        let expired = Rejection::token(&TokenError::Expired);
        let forged = Rejection::token(&TokenError::InvalidSignature);
        assert_eq!(expired.kind, RejectionKind::TokenExpired);
        assert_eq!(forged.kind, RejectionKind::TokenMalformed);
        assert_eq!(expired.status(), forged.status());
        assert_eq!(expired.message, "token expired");
    }

    #[test]
    fn only_missing_principal_is_not_found() {
        assert_eq!(Rejection::not_found().status(), Status::NotFound);
        assert_eq!(Rejection::credentials().status(), Status::Rejected);
        assert_eq!(
            RejectionKind::StampMismatch.status(),
            Status::Rejected
        );
    }

    #[test]
    fn auth_result_accessors_are_exclusive() {
        let issued = AuthResult::Issued(IssuedToken {
            token: "t".to_string(),
            expires_at: DateTime::<Utc>::default(),
        });
        assert_eq!(issued.token(), Some("t"));
        assert!(issued.message().is_none());

        let rejected = AuthResult::Rejected(Rejection::credentials());
        assert!(rejected.token().is_none());
        assert!(rejected.expires_at().is_none());
        assert_eq!(rejected.message(), Some(AUTHENTICATION_FAILED));
    }
}
