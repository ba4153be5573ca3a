//! Credentials used to authenticate the WebSocket handshake.
//!
//! The backend authenticates sockets with a bearer token passed as the `token` query parameter.
//! The manager never stores the token itself: it asks its [`TokenProvider`] on every
//! [`connect`](crate::ws::WebSocketManager::connect), so a token refreshed by the host
//! application is picked up by the next (re)connect.

/// Secret string types that redact values in debug output for security.
pub use secrecy::{ExposeSecret, SecretString};
use url::Url;

/// Supplies the current bearer token.
///
/// Returning `None` (or an empty token) makes `connect` fail immediately without touching
/// the network.
///
/// # Example
///
/// ```
/// use admin_monitor_ws::auth::TokenProvider;
///
/// let provider = || Some("eyJhbGciOi...".to_owned());
/// assert!(provider.token().is_some());
/// ```
pub trait TokenProvider: Send + Sync + 'static {
    fn token(&self) -> Option<SecretString>;
}

/// A fixed token, typically read once from the login response.
#[derive(Clone, Debug)]
pub struct StaticToken(SecretString);

impl StaticToken {
    #[must_use]
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self(SecretString::from(token.into()))
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<SecretString> {
        Some(self.0.clone())
    }
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<String> + Send + Sync + 'static,
{
    fn token(&self) -> Option<SecretString> {
        self().map(SecretString::from)
    }
}

/// Replace the value of the `token` query parameter in `url` with `***`, for logging.
///
/// ```
/// use admin_monitor_ws::auth::redact_token;
///
/// assert_eq!(
///     redact_token("ws://localhost:8000/ws/test/?token=abc&lang=en"),
///     "ws://localhost:8000/ws/test/?token=***&lang=en"
/// );
/// ```
#[must_use]
pub fn redact_token(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_owned();
    };
    if !parsed.query_pairs().any(|(key, _)| key == "token") {
        return url.to_owned();
    }

    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(key, value)| {
            let value = if key == "token" { "***".into() } else { value };
            (key.into_owned(), value.into_owned())
        })
        .collect();
    parsed.query_pairs_mut().clear().extend_pairs(pairs);

    parsed.into()
}

/// Reads a token from `provider`, treating an empty token as missing.
pub(crate) fn current_token(provider: &dyn TokenProvider) -> Option<SecretString> {
    provider
        .token()
        .filter(|token| !token.expose_secret().is_empty())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn static_token_should_expose_value() {
        let provider = StaticToken::new("abc");

        let token = current_token(&provider).unwrap();
        assert_eq!(token.expose_secret(), "abc");
    }

    #[test]
    fn empty_token_is_treated_as_missing() {
        let provider = StaticToken::new("");

        assert!(current_token(&provider).is_none());
    }

    #[test]
    fn closure_provider_is_read_on_every_call() {
        let current = std::sync::Arc::new(Mutex::new(Some("first".to_owned())));
        let shared = std::sync::Arc::clone(&current);
        let provider = move || shared.lock().unwrap().clone();

        assert_eq!(current_token(&provider).unwrap().expose_secret(), "first");

        *current.lock().unwrap() = Some("second".to_owned());
        assert_eq!(current_token(&provider).unwrap().expose_secret(), "second");

        *current.lock().unwrap() = None;
        assert!(current_token(&provider).is_none());
    }

    #[test]
    fn redact_leaves_urls_without_token_alone() {
        assert_eq!(
            redact_token("wss://admin.example.com/ws/test/"),
            "wss://admin.example.com/ws/test/"
        );
        assert_eq!(
            redact_token("wss://admin.example.com/ws/test/?lang=en&token=x%20y"),
            "wss://admin.example.com/ws/test/?lang=en&token=***"
        );
    }

    #[test]
    fn redact_keeps_other_pairs_encoded() {
        assert_eq!(
            redact_token("ws://127.0.0.1:8000/ws/test/?token=a+b%26c&db=x%26y&token=again"),
            "ws://127.0.0.1:8000/ws/test/?token=***&db=x%26y&token=***"
        );
        assert_eq!(redact_token("not a url?token=abc"), "not a url?token=abc");
    }

    #[test]
    fn debug_output_is_redacted() {
        let provider = StaticToken::new("super-secret");

        assert!(!format!("{provider:?}").contains("super-secret"));
    }
}
