//! Build operations addressed by job path and build number.

// self
use crate::{
	_prelude::*,
	http::HttpTransport,
	jenkins::{JenkinsClient, JobPath},
	obs::{self, Call},
	request::{JSON_CONTENT_TYPE, RequestOptions},
};

/// Build number, accepted as an integer or parsed from a numeric string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildNumber(pub u64);
impl From<u64> for BuildNumber {
	fn from(value: u64) -> Self {
		Self(value)
	}
}
impl From<u32> for BuildNumber {
	fn from(value: u32) -> Self {
		Self(value.into())
	}
}
impl FromStr for BuildNumber {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		s.trim()
			.parse()
			.map(Self)
			.map_err(|_| Error::invalid_argument(format!("`{s}` is not a build number")))
	}
}
impl TryFrom<&str> for BuildNumber {
	type Error = Error;

	fn try_from(value: &str) -> Result<Self> {
		value.parse()
	}
}
impl Display for BuildNumber {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		Display::fmt(&self.0, f)
	}
}

/// Build facade borrowed from a [`JenkinsClient`].
#[derive(Debug)]
pub struct BuildApi<'a, C>
where
	C: ?Sized + HttpTransport,
{
	client: &'a JenkinsClient<C>,
}
impl<'a, C> BuildApi<'a, C>
where
	C: ?Sized + HttpTransport,
{
	pub(crate) fn new(client: &'a JenkinsClient<C>) -> Self {
		Self { client }
	}

	/// `GET <job>/<number>/api/json`.
	pub async fn get(
		&self,
		path: impl Into<JobPath>,
		number: impl Into<BuildNumber>,
		tree: Option<&str>,
	) -> Result<Value> {
		let endpoint = build_path(path.into(), number.into(), "api/json");

		obs::observe(Call::jenkins("build.get"), async move {
			let options =
				RequestOptions::get().header("accept", JSON_CONTENT_TYPE).query_opt("tree", tree);

			self.client.request(&endpoint?, options).await?.into_json()
		})
		.await
	}

	/// `GET <job>/<number>/consoleText`, returned verbatim.
	pub async fn console_text(
		&self,
		path: impl Into<JobPath>,
		number: impl Into<BuildNumber>,
	) -> Result<String> {
		let endpoint = build_path(path.into(), number.into(), "consoleText");

		obs::observe(Call::jenkins("build.console_text"), async move {
			let body = self.client.request(&endpoint?, RequestOptions::get().raw_text()).await?;

			Ok(body.into_text())
		})
		.await
	}

	/// `POST <job>/<number>/stop`.
	pub async fn stop(
		&self,
		path: impl Into<JobPath>,
		number: impl Into<BuildNumber>,
	) -> Result<()> {
		let endpoint = build_path(path.into(), number.into(), "stop");

		obs::observe(Call::jenkins("build.stop"), async move {
			self.client.request(&endpoint?, RequestOptions::post()).await?;

			Ok(())
		})
		.await
	}
}

fn build_path(path: JobPath, number: BuildNumber, action: &str) -> Result<String> {
	Ok(format!("{}/{number}/{action}", path.normalize()?))
}
