/// Credential handling for the upstream API key
use std::fmt;
use std::str::FromStr;

/// The bearer secret used to authenticate to the upstream service.
///
/// Wrapped so the key can never leak through `Debug` output: config structs
/// get logged at startup, and the redacted form is all that ever appears.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    /// The raw secret, for building the Authorization header. Callers must
    /// not log or echo the returned value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl FromStr for ApiKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}
