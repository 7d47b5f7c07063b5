//! Stamp comparison between a validated token and the current principal.

use super::claims::{stamp_suffix, ClaimSet, ClaimTypes, UNSTAMPED};
use super::store::Principal;

/// Detects tokens issued before the principal's last stamp rotation.
#[derive(Clone, Debug)]
pub struct StampGuard {
    claim_type: String,
}

impl StampGuard {
    #[must_use]
    pub fn new(types: &ClaimTypes) -> Self {
        Self {
            claim_type: types.stamp.clone(),
        }
    }

    /// True when the token's stamp suffix matches the principal's current one.
    #[must_use]
    pub fn check(&self, claims: &ClaimSet, principal: &Principal) -> bool {
        let presented = claims.first(&self.claim_type).unwrap_or(UNSTAMPED);
        presented == stamp_suffix(principal.stamp.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(stamp: Option<&str>) -> Principal {
        Principal {
            id: "u1".to_string(),
            username: "alice".to_string(),
            email: "alice@tessera.dev".to_string(),
            password_hash: None,
            stamp: stamp.map(str::to_string),
        }
    }

    fn claims_with_stamp(stamp: Option<&str>) -> ClaimSet {
        let mut claims = ClaimSet::default();
        claims.push("sub", "u1");
        if let Some(stamp) = stamp {
            claims.push("stamp", stamp);
        }
        claims
    }

    #[test]
    fn matches_current_suffix() {
        let guard = StampGuard::new(&ClaimTypes::default());
        let p = principal(Some("0f1e2d3c-aaaa-bbbb-cccc-99998888abcd"));
        assert!(guard.check(&claims_with_stamp(Some("8888abcd")), &p));
        assert!(!guard.check(&claims_with_stamp(Some("7777abcd")), &p));
    }

    #[test]
    fn missing_claim_only_matches_unstamped_principal() {
        let guard = StampGuard::new(&ClaimTypes::default());
        assert!(guard.check(&claims_with_stamp(None), &principal(None)));
        assert!(guard.check(&claims_with_stamp(None), &principal(Some(""))));
        assert!(!guard.check(&claims_with_stamp(None), &principal(Some("abc12345"))));
    }

    #[test]
    fn honours_configured_claim_type() {
        let types = ClaimTypes {
            stamp: "sec".to_string(),
            ..ClaimTypes::default()
        };
        let guard = StampGuard::new(&types);
        let mut claims = ClaimSet::default();
        claims.push("sec", "abc12345");
        assert!(guard.check(&claims, &principal(Some("abc12345"))));
        assert!(!guard.check(&claims_with_stamp(Some("abc12345")), &principal(Some("abc12345"))));
    }
}
