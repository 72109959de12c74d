//! Credentials that stay out of logs, plus the `authorization` header values built from them.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
// self
use crate::_prelude::*;

const REDACTED: &str = "<redacted>";

/// Token, API key, or password that never prints its contents through `Debug` or `Display`.
///
/// Deserializes from a plain string so it can sit directly in instance configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Whether the secret is an empty string.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// `Bearer <secret>` header value.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.0)
	}

	/// `Basic base64(<username>:<secret>)` header value.
	pub fn basic(&self, username: &str) -> String {
		format!("Basic {}", STANDARD.encode(format!("{username}:{}", self.0)))
	}
}
impl From<&str> for TokenSecret {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}
impl From<String> for TokenSecret {
	fn from(value: String) -> Self {
		Self(value)
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "TokenSecret({REDACTED})")
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(REDACTED)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn formatters_never_reveal_the_value() {
		let secret = TokenSecret::new("super-secret");

		assert_eq!(format!("{secret:?}"), "TokenSecret(<redacted>)");
		assert_eq!(format!("{secret}"), "<redacted>");
		assert!(!format!("{:?}", Some(&secret)).contains("super-secret"));
	}

	#[test]
	fn header_values_embed_the_secret() {
		let secret = TokenSecret::from("t0k");

		assert_eq!(secret.bearer(), "Bearer t0k");
		assert_eq!(secret.basic("bot"), "Basic Ym90OnQwaw==");
	}

	#[test]
	fn config_strings_deserialize_into_secrets() {
		let secret: TokenSecret =
			serde_json::from_str("\"api-key\"").expect("Plain strings should deserialize.");

		assert_eq!(secret.expose(), "api-key");
		assert!(!secret.is_empty());
	}
}
