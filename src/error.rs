//! Crate-level error types shared across the Jenkins client, the Argo CD service, and the
//! dispatcher underneath them.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Placeholder used when an error response body cannot be read.
pub const UNREADABLE_BODY: &str = "<unreadable response body>";

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Upstream answered with a non-2xx status that has no dedicated class.
	#[error(transparent)]
	Upstream(UpstreamError),
	/// Upstream payload did not have the expected shape.
	#[error(transparent)]
	ResponseShape(#[from] ResponseShapeError),

	/// Caller supplied a malformed or missing identifier.
	#[error("Invalid argument: {reason}.")]
	InvalidArgument {
		/// Human-readable reason.
		reason: String,
	},
	/// Named instance is absent from the configuration.
	#[error("Unable to find an instance named `{name}`.")]
	InstanceNotFound {
		/// Requested instance name.
		name: String,
	},
	/// Credentials were rejected or a token could not be issued.
	#[error("{message}")]
	Authentication {
		/// Description of the failure.
		message: String,
	},
	/// Caller is authenticated but not allowed to perform the operation.
	#[error("{message}")]
	NotAllowed {
		/// Description of the failure.
		message: String,
	},
	/// Upstream resource does not exist.
	#[error("{message}")]
	NotFound {
		/// Description of the failure.
		message: String,
	},
	/// Upstream refused to overwrite an existing resource with a different spec.
	#[error("{message}")]
	Conflict {
		/// Description of the failure.
		message: String,
	},
	/// Failure of an unrecognized class, prefixed with the attempted operation.
	#[error("{context}: {source}")]
	Operation {
		/// Operation description (action, instance, key parameters).
		context: String,
		/// Original failure.
		#[source]
		source: Box<Error>,
	},
}
impl Error {
	/// Builds an [`Error::InvalidArgument`].
	pub fn invalid_argument(reason: impl Into<String>) -> Self {
		Self::InvalidArgument { reason: reason.into() }
	}

	/// Returns the classification of this error.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Config(_) => ErrorKind::Config,
			Self::Transport(_) => ErrorKind::Transport,
			Self::Upstream(_) => ErrorKind::Upstream,
			Self::ResponseShape(_) => ErrorKind::ResponseShape,
			Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
			Self::InstanceNotFound { .. } | Self::NotFound { .. } => ErrorKind::NotFound,
			Self::Authentication { .. } => ErrorKind::Authentication,
			Self::NotAllowed { .. } => ErrorKind::NotAllowed,
			Self::Conflict { .. } => ErrorKind::Conflict,
			Self::Operation { source, .. } => match source.kind() {
				ErrorKind::Transport => ErrorKind::Transport,
				_ => ErrorKind::Other,
			},
		}
	}

	/// HTTP status carried by the error, when it came from an upstream response.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Upstream(err) => Some(err.status),
			Self::Operation { source, .. } => source.status(),
			_ => None,
		}
	}

	/// Prefixes the error with an operation description while keeping its class.
	///
	/// Authentication, not-allowed, not-found, and conflict failures are rebuilt as the same
	/// variant with an enriched message (an unknown instance becomes [`Error::NotFound`]). Every
	/// other failure is wrapped in [`Error::Operation`] with the original kept as its source.
	pub fn context(self, context: impl Display) -> Self {
		match self {
			Self::Authentication { message } =>
				Self::Authentication { message: format!("{context}: {message}") },
			Self::NotAllowed { message } =>
				Self::NotAllowed { message: format!("{context}: {message}") },
			Self::NotFound { message } =>
				Self::NotFound { message: format!("{context}: {message}") },
			Self::Conflict { message } =>
				Self::Conflict { message: format!("{context}: {message}") },
			err @ Self::InstanceNotFound { .. } =>
				Self::NotFound { message: format!("{context}: {err}") },
			other => Self::Operation { context: context.to_string(), source: Box::new(other) },
		}
	}
}
impl From<UpstreamError> for Error {
	fn from(err: UpstreamError) -> Self {
		match err.status {
			401 => Self::Authentication { message: err.to_string() },
			403 => Self::NotAllowed { message: err.to_string() },
			404 => Self::NotFound { message: err.to_string() },
			_ => Self::Upstream(err),
		}
	}
}

/// Coarse classification of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// Malformed or missing identifier.
	InvalidArgument,
	/// Unknown instance or missing upstream resource.
	NotFound,
	/// Credential or token failure.
	Authentication,
	/// Authorization failure.
	NotAllowed,
	/// Duplicate resource with a different spec.
	Conflict,
	/// Unclassified non-2xx response.
	Upstream,
	/// Unexpected payload.
	ResponseShape,
	/// Network failure.
	Transport,
	/// Local configuration failure.
	Config,
	/// Wrapped failure of an unrecognized class.
	Other,
}
impl ErrorKind {
	/// Returns a stable snake-case label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::InvalidArgument => "invalid_argument",
			Self::NotFound => "not_found",
			Self::Authentication => "authentication",
			Self::NotAllowed => "not_allowed",
			Self::Conflict => "conflict",
			Self::Upstream => "upstream",
			Self::ResponseShape => "response_shape",
			Self::Transport => "transport",
			Self::Config => "config",
			Self::Other => "other",
		}
	}
}

/// Non-2xx response returned by an external system.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("{method} {url} failed with status {status}: {body}")]
pub struct UpstreamError {
	/// HTTP status code.
	pub status: u16,
	/// Request method.
	pub method: String,
	/// Fully resolved request URL.
	pub url: String,
	/// Best-effort response body text.
	pub body: String,
}

/// Unexpected payloads returned by an external system.
#[derive(Debug, ThisError)]
pub enum ResponseShapeError {
	/// Body could not be decoded into the expected structure.
	#[error(
		"Response body could not be decoded at `{path}`: {message}.",
		path = .source.path(),
		message = .source.inner()
	)]
	Decode {
		/// Structured decoding failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// A required field was absent.
	#[error("No {field} returned by {endpoint}.")]
	MissingField {
		/// Endpoint that produced the payload.
		endpoint: String,
		/// Missing field name.
		field: &'static str,
	},
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] ::http::Error),
	/// A URL could not be parsed or joined.
	#[error("URL `{url}` is invalid.")]
	InvalidUrl {
		/// Offending URL text.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Instance list contains an empty name.
	#[error("Instance names cannot be empty.")]
	EmptyInstanceName,
	/// Instance list contains the same name twice.
	#[error("Instance `{name}` is configured more than once.")]
	DuplicateInstance {
		/// Duplicated instance name.
		name: String,
	},
	/// A request body could not be serialized.
	#[error("Request body could not be serialized.")]
	BodySerialize(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {url}.")]
	Network {
		/// Request URL.
		url: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(url: impl Into<String>, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { url: url.into(), source: Box::new(src) }
	}
}
