use serde::Deserialize;

/// Token issuance settings.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
}

impl JwtConfig {
    pub const DEV_SECRET: &'static str = "dev-secret-change-me";

    pub fn uses_dev_secret(&self) -> bool {
        self.secret == Self::DEV_SECRET
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: Self::DEV_SECRET.to_string(),
            issuer: "backoffice".to_string(),
            audience: "backoffice".to_string(),
            access_token_minutes: 30,
            refresh_token_days: 7,
        }
    }
}

impl core::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_token_minutes", &self.access_token_minutes)
            .field("refresh_token_days", &self.refresh_token_days)
            .finish()
    }
}
