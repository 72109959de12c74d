//! Job path normalization (`a/b` → `job/a/job/b`).

// crates.io
use percent_encoding::percent_decode_str;
// self
use crate::{_prelude::*, request::encode_component};

const DELIMITER: &str = "job";

/// Job identifier given either as a slash-delimited name or as ordered segments.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobPath {
	/// Slash-delimited name such as `folder/project`, or an already canonical path.
	Name(String),
	/// Ordered components such as `["folder", "project"]`.
	Segments(Vec<String>),
}
impl JobPath {
	/// Produces the canonical `job/<segment>/job/<segment>` form.
	///
	/// Canonical names are returned as-is apart from stripped leading slashes, which keeps the
	/// operation idempotent.
	pub fn normalize(&self) -> Result<String> {
		match self {
			Self::Name(name) => {
				let trimmed = name.trim_start_matches('/');

				if is_canonical(trimmed) {
					return Ok(trimmed.to_owned());
				}

				encode(&split(name)?)
			},
			Self::Segments(segments) => {
				validate_segments(segments)?;

				encode(segments)
			},
		}
	}

	/// Logical components of the path; canonical names are decoded back into plain names.
	pub fn segments(&self) -> Result<Vec<String>> {
		match self {
			Self::Name(name) => {
				let trimmed = name.trim_start_matches('/');

				if is_canonical(trimmed) { decode(trimmed) } else { split(name) }
			},
			Self::Segments(segments) => {
				validate_segments(segments)?;

				Ok(segments.clone())
			},
		}
	}

	/// Last component (the job itself).
	pub fn leaf(&self) -> Result<String> {
		let mut segments = self.segments()?;

		segments.pop().ok_or_else(|| Error::invalid_argument("job name is required"))
	}

	/// All components but the last (the containing folders).
	pub fn parents(&self) -> Result<Vec<String>> {
		let mut segments = self.segments()?;

		segments.pop();

		Ok(segments)
	}
}
impl From<&str> for JobPath {
	fn from(value: &str) -> Self {
		Self::Name(value.to_owned())
	}
}
impl From<String> for JobPath {
	fn from(value: String) -> Self {
		Self::Name(value)
	}
}
impl From<&String> for JobPath {
	fn from(value: &String) -> Self {
		Self::Name(value.clone())
	}
}
impl From<Vec<String>> for JobPath {
	fn from(value: Vec<String>) -> Self {
		Self::Segments(value)
	}
}
impl From<&[&str]> for JobPath {
	fn from(value: &[&str]) -> Self {
		Self::Segments(value.iter().map(|segment| (*segment).to_owned()).collect())
	}
}
impl<const N: usize> From<[&str; N]> for JobPath {
	fn from(value: [&str; N]) -> Self {
		Self::Segments(value.iter().map(|segment| (*segment).to_owned()).collect())
	}
}
impl Display for JobPath {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Name(name) => f.write_str(name),
			Self::Segments(segments) => f.write_str(&segments.join("/")),
		}
	}
}

fn is_canonical(name: &str) -> bool {
	name.starts_with("job/") || name.contains("/job/")
}

fn split(name: &str) -> Result<Vec<String>> {
	let segments: Vec<String> =
		name.split('/').filter(|segment| !segment.is_empty()).map(str::to_owned).collect();

	if segments.is_empty() {
		return Err(Error::invalid_argument("job name is required"));
	}

	Ok(segments)
}

fn validate_segments(segments: &[String]) -> Result<()> {
	if segments.is_empty() {
		return Err(Error::invalid_argument("job name is required"));
	}
	if segments.iter().any(|segment| segment.is_empty()) {
		return Err(Error::invalid_argument("job path segments cannot be empty"));
	}

	Ok(())
}

fn encode(segments: &[String]) -> Result<String> {
	let parts: Vec<String> = segments
		.iter()
		.map(|segment| format!("{DELIMITER}/{}", encode_component(segment)))
		.collect();

	Ok(parts.join("/"))
}

fn decode(canonical: &str) -> Result<Vec<String>> {
	let parts: Vec<&str> = canonical.split('/').filter(|part| !part.is_empty()).collect();
	let mut segments = Vec::with_capacity(parts.len() / 2);

	for pair in parts.chunks(2) {
		match pair {
			[DELIMITER, segment] =>
				segments.push(percent_decode_str(segment).decode_utf8_lossy().into_owned()),
			_ =>
				return Err(Error::invalid_argument(format!(
					"`{canonical}` is not a well-formed job path"
				))),
		}
	}

	if segments.is_empty() {
		return Err(Error::invalid_argument("job name is required"));
	}

	Ok(segments)
}
