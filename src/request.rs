//! Request options and response payloads understood by the dispatcher.
//!
//! [`RequestOptions`] mirrors what a facade knows about one call: an optional method, a query
//! with set semantics, caller headers, an optional body, and response-parsing hints.
//! [`ResponseBody`] is the classified success payload.

// crates.io
use ::http::Method;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use url::form_urlencoded;
// self
use crate::{_prelude::*, error::ResponseShapeError};

/// Content type applied to URL-encoded form bodies.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";
/// Content type applied to JSON bodies.
pub const JSON_CONTENT_TYPE: &str = "application/json";
/// Content type applied to raw XML bodies.
pub const XML_CONTENT_TYPE: &str = "application/xml";

/// Characters left untouched when encoding a path component (the URI-component unreserved set).
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
	.remove(b'-')
	.remove(b'_')
	.remove(b'.')
	.remove(b'!')
	.remove(b'~')
	.remove(b'*')
	.remove(b'\'')
	.remove(b'(')
	.remove(b')');

/// Percent-encodes one path component.
pub fn encode_component(component: &str) -> String {
	utf8_percent_encode(component, COMPONENT).to_string()
}

/// Query parameters with set semantics: a later value for a key replaces the earlier one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query(Vec<(String, String)>);
impl Query {
	/// Creates an empty query.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets `key` to `value`, replacing any previous value in place.
	pub fn set(&mut self, key: impl Into<String>, value: impl Display) {
		let key = key.into();
		let value = value.to_string();

		match self.0.iter_mut().find(|(existing, _)| *existing == key) {
			Some(slot) => slot.1 = value,
			None => self.0.push((key, value)),
		}
	}

	/// Sets `key` when `value` is present; `None` leaves the query untouched.
	pub fn set_opt(&mut self, key: impl Into<String>, value: Option<impl Display>) {
		if let Some(value) = value {
			self.set(key, value);
		}
	}

	/// Builder form of [`Query::set`].
	pub fn with(mut self, key: impl Into<String>, value: impl Display) -> Self {
		self.set(key, value);

		self
	}

	/// Builder form of [`Query::set_opt`].
	pub fn with_opt(mut self, key: impl Into<String>, value: Option<impl Display>) -> Self {
		self.set_opt(key, value);

		self
	}

	/// Returns the value stored for `key`.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.iter().find(|(existing, _)| existing == key).map(|(_, value)| value.as_str())
	}

	/// Whether no parameter is set.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Iterates over the parameters in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
	}
}

/// Value of a caller-supplied header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeaderEntry {
	/// Plain value.
	Single(String),
	/// Multiple values, sent as one comma-joined string.
	Multi(Vec<String>),
	/// Explicitly absent; the header is omitted even if a default exists.
	Unset,
}
impl HeaderEntry {
	/// Flattens the entry into the value sent on the wire.
	pub fn flatten(&self) -> Option<String> {
		match self {
			Self::Single(value) => Some(value.clone()),
			Self::Multi(values) => Some(values.join(",")),
			Self::Unset => None,
		}
	}
}
impl From<&str> for HeaderEntry {
	fn from(value: &str) -> Self {
		Self::Single(value.to_owned())
	}
}
impl From<String> for HeaderEntry {
	fn from(value: String) -> Self {
		Self::Single(value)
	}
}
impl From<Vec<String>> for HeaderEntry {
	fn from(values: Vec<String>) -> Self {
		Self::Multi(values)
	}
}
impl<T> From<Option<T>> for HeaderEntry
where
	T: Into<HeaderEntry>,
{
	fn from(value: Option<T>) -> Self {
		value.map(Into::into).unwrap_or(Self::Unset)
	}
}

/// Case-insensitive header collection; later writes replace earlier ones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, HeaderEntry)>);
impl Headers {
	/// Creates an empty collection.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets `name`, replacing any previous entry regardless of case.
	pub fn set(&mut self, name: impl AsRef<str>, entry: impl Into<HeaderEntry>) {
		let name = name.as_ref().to_ascii_lowercase();
		let entry = entry.into();

		match self.0.iter_mut().find(|(existing, _)| *existing == name) {
			Some(slot) => slot.1 = entry,
			None => self.0.push((name, entry)),
		}
	}

	/// Builder form of [`Headers::set`].
	pub fn with(mut self, name: impl AsRef<str>, entry: impl Into<HeaderEntry>) -> Self {
		self.set(name, entry);

		self
	}

	/// Returns the entry stored for `name`.
	pub fn get(&self, name: &str) -> Option<&HeaderEntry> {
		let name = name.to_ascii_lowercase();

		self.0.iter().find(|(existing, _)| *existing == name).map(|(_, entry)| entry)
	}

	/// Overlays `other` on top of `self`.
	pub fn merge(&mut self, other: &Headers) {
		for (name, entry) in &other.0 {
			self.set(name, entry.clone());
		}
	}

	/// Flattens multi-valued entries and drops unset ones.
	pub fn normalize(&self) -> Vec<(String, String)> {
		self.0
			.iter()
			.filter_map(|(name, entry)| entry.flatten().map(|value| (name.clone(), value)))
			.collect()
	}
}

/// Outbound request payload.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
	/// `application/x-www-form-urlencoded` form.
	Form(BTreeMap<String, String>),
	/// Raw text payload such as XML.
	Text(String),
	/// JSON document.
	Json(Value),
}
impl RequestBody {
	/// Serializes the payload for the wire.
	pub fn encode(&self) -> Result<Vec<u8>> {
		match self {
			Self::Form(fields) => Ok(form_urlencoded::Serializer::new(String::new())
				.extend_pairs(fields.iter())
				.finish()
				.into_bytes()),
			Self::Text(text) => Ok(text.as_bytes().to_vec()),
			Self::Json(value) =>
				serde_json::to_vec(value).map_err(|e| crate::error::ConfigError::from(e).into()),
		}
	}

	/// Content type implied by the payload when the caller does not request one.
	pub fn implied_content_type(&self) -> Option<&'static str> {
		match self {
			Self::Form(_) => Some(FORM_CONTENT_TYPE),
			Self::Json(_) => Some(JSON_CONTENT_TYPE),
			Self::Text(_) => None,
		}
	}
}

/// Per-call options accepted by the dispatcher.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
	/// Explicit method; inferred from the body when absent.
	pub method: Option<Method>,
	/// Query parameters.
	pub query: Query,
	/// Caller headers layered over the client defaults.
	pub headers: Headers,
	/// Optional payload.
	pub body: Option<RequestBody>,
	/// Forces text parsing of the response regardless of its content type.
	pub raw_text: bool,
	/// Explicit content type; wins over the type implied by the body.
	pub content_type: Option<String>,
}
impl RequestOptions {
	/// Options for a plain `GET`.
	pub fn get() -> Self {
		Self { method: Some(Method::GET), ..Default::default() }
	}

	/// Options for a `POST`, with or without body.
	pub fn post() -> Self {
		Self { method: Some(Method::POST), ..Default::default() }
	}

	/// Sets the method.
	pub fn method(mut self, method: Method) -> Self {
		self.method = Some(method);

		self
	}

	/// Parses and sets a method from free-form text; see [`parse_method`].
	pub fn method_str(self, method: &str) -> Result<Self> {
		Ok(self.method(parse_method(method)?))
	}

	/// Sets a query parameter.
	pub fn query(mut self, key: impl Into<String>, value: impl Display) -> Self {
		self.query.set(key, value);

		self
	}

	/// Sets a query parameter when present.
	pub fn query_opt(mut self, key: impl Into<String>, value: Option<impl Display>) -> Self {
		self.query.set_opt(key, value);

		self
	}

	/// Sets a caller header.
	pub fn header(mut self, name: impl AsRef<str>, entry: impl Into<HeaderEntry>) -> Self {
		self.headers.set(name, entry);

		self
	}

	/// Attaches a payload.
	pub fn body(mut self, body: RequestBody) -> Self {
		self.body = Some(body);

		self
	}

	/// Attaches a JSON payload built from any serializable value.
	pub fn json(self, value: &impl Serialize) -> Result<Self> {
		let value = serde_json::to_value(value).map_err(crate::error::ConfigError::from)?;

		Ok(self.body(RequestBody::Json(value)))
	}

	/// Forces text parsing of the response.
	pub fn raw_text(mut self) -> Self {
		self.raw_text = true;

		self
	}

	/// Requests an explicit content type.
	pub fn content_type(mut self, value: impl Into<String>) -> Self {
		self.content_type = Some(value.into());

		self
	}

	/// Method sent on the wire: explicit, else `POST` with a body, else `GET`.
	pub fn resolved_method(&self) -> Method {
		match (&self.method, &self.body) {
			(Some(method), _) => method.clone(),
			(None, Some(_)) => Method::POST,
			(None, None) => Method::GET,
		}
	}
}

/// Parses a method name after upper-casing it with ASCII rules.
pub fn parse_method(raw: &str) -> Result<Method> {
	let normalized = raw.trim().to_ascii_uppercase();

	Method::from_bytes(normalized.as_bytes())
		.map_err(|_| Error::invalid_argument(format!("`{raw}` is not a valid HTTP method")))
}

/// Classified success payload.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseBody {
	/// Body announced as JSON and parsed.
	Json(Value),
	/// Any other body, verbatim.
	Text(String),
}
impl ResponseBody {
	/// Decodes the payload into `T`, reporting the failing field path on mismatch.
	///
	/// Text payloads are parsed as JSON as well, which covers servers that mislabel their
	/// content type.
	pub fn into_json<T>(self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		match self {
			Self::Json(value) => decode_value(value),
			Self::Text(text) => {
				let mut de = serde_json::Deserializer::from_str(&text);

				serde_path_to_error::deserialize(&mut de)
					.map_err(|source| ResponseShapeError::Decode { source }.into())
			},
		}
	}

	/// Returns the payload as text, serializing JSON when needed.
	pub fn into_text(self) -> String {
		match self {
			Self::Json(value) => value.to_string(),
			Self::Text(text) => text,
		}
	}

	/// Borrows the JSON payload.
	pub fn as_json(&self) -> Option<&Value> {
		match self {
			Self::Json(value) => Some(value),
			Self::Text(_) => None,
		}
	}

	/// Borrows the text payload.
	pub fn as_text(&self) -> Option<&str> {
		match self {
			Self::Json(_) => None,
			Self::Text(text) => Some(text),
		}
	}
}

/// Decodes a JSON value into `T` with path-aware errors.
pub fn decode_value<T>(value: Value) -> Result<T>
where
	T: DeserializeOwned,
{
	serde_path_to_error::deserialize(value)
		.map_err(|source| ResponseShapeError::Decode { source }.into())
}
