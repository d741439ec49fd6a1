// src/oauth/credential.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A stored OAuth credential for one channel.
///
/// `refresh_token` is absent for providers that never issued one; such a
/// credential cannot be renewed silently and needs a full re-authorization
/// once it expires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub granted_scopes: String,
    pub token_type: String,
    pub created_at: DateTime<Utc>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Validity check against a caller-supplied clock. Pure, no I/O.
    ///
    /// The safety margin makes a token invalid slightly before its literal
    /// expiry so in-flight requests don't race the provider. An absent
    /// expiry is trusted only when the provider profile says tokens never
    /// expire; for Google a missing expiry means the value was lost.
    pub fn is_valid_at(
        &self,
        now: DateTime<Utc>,
        safety_margin: Duration,
        assume_non_expiring: bool,
    ) -> bool {
        if self.access_token.is_empty() {
            return false;
        }

        match self.expires_at {
            None => assume_non_expiring,
            Some(expires_at) => now < expires_at - safety_margin,
        }
    }

    /// Validity against the current wall clock.
    pub fn is_valid(&self, safety_margin: Duration, assume_non_expiring: bool) -> bool {
        self.is_valid_at(Utc::now(), safety_margin, assume_non_expiring)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(expires_at: Option<DateTime<Utc>>) -> Credential {
        Credential {
            access_token: "AT1".to_string(),
            refresh_token: Some("RT1".to_string()),
            expires_at,
            granted_scopes: "https://www.googleapis.com/auth/youtube".to_string(),
            token_type: "Bearer".to_string(),
            created_at: Utc::now(),
            refreshed_at: None,
        }
    }

    #[test]
    fn test_valid_before_margin() {
        let now = Utc::now();
        let cred = credential(Some(now + Duration::hours(1)));
        assert!(cred.is_valid_at(now, Duration::minutes(5), false));
    }

    #[test]
    fn test_invalid_inside_safety_margin() {
        // Expires in 3 minutes, margin is 5: already invalid even though the
        // provider would still technically accept it.
        let now = Utc::now();
        let cred = credential(Some(now + Duration::minutes(3)));
        assert!(!cred.is_valid_at(now, Duration::minutes(5), false));
    }

    #[test]
    fn test_invalid_exactly_at_margin_boundary() {
        let now = Utc::now();
        let cred = credential(Some(now + Duration::minutes(5)));
        assert!(!cred.is_valid_at(now, Duration::minutes(5), false));
    }

    #[test]
    fn test_invalid_after_expiry_for_all_margins() {
        let now = Utc::now();
        let cred = credential(Some(now - Duration::seconds(1)));
        for margin_secs in [0i64, 60, 300, 3600] {
            assert!(!cred.is_valid_at(now, Duration::seconds(margin_secs), false));
        }
    }

    #[test]
    fn test_zero_margin_honors_literal_expiry() {
        let now = Utc::now();
        let cred = credential(Some(now + Duration::seconds(10)));
        assert!(cred.is_valid_at(now, Duration::zero(), false));
    }

    #[test]
    fn test_empty_access_token_never_valid() {
        let mut cred = credential(Some(Utc::now() + Duration::hours(1)));
        cred.access_token = String::new();
        assert!(!cred.is_valid_at(Utc::now(), Duration::minutes(5), false));
        assert!(!cred.is_valid_at(Utc::now(), Duration::minutes(5), true));
    }

    #[test]
    fn test_missing_expiry_follows_provider_profile() {
        let cred = credential(None);
        // Default profile: missing expiry means the value was lost.
        assert!(!cred.is_valid_at(Utc::now(), Duration::minutes(5), false));
        // Non-expiring provider profile trusts it.
        assert!(cred.is_valid_at(Utc::now(), Duration::minutes(5), true));
    }
}
