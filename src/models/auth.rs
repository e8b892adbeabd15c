// Bearer token claims issued by the external auth provider.
// This service only validates; issuance lives elsewhere.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalClaims {
    /// User ID (subject)
    pub sub: String,

    /// Platform role (driver, company, advertiser, admin)
    pub role: String,

    /// Display name, informational only
    #[serde(default)]
    pub name: String,

    /// Audience (aud)
    pub aud: String,

    /// Issuer (iss)
    pub iss: String,

    /// Issued at timestamp (Unix epoch seconds)
    pub iat: u64,

    /// Expires at timestamp (Unix epoch seconds)
    pub exp: u64,
}
