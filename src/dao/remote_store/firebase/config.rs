/// Runtime configuration describing how to reach the realtime database.
#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    pub database_url: String,
    pub auth_token: Option<String>,
}

impl FirebaseConfig {
    /// Construct a configuration from an explicit database URL.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            auth_token: None,
        }
    }

    /// Attach the token sent as the `auth` query parameter.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}
