use std::time::Duration;

use crate::SharingPolicy;

/// Default quiet window of the debounce stage. Zero disables it.
pub const DEFAULT_DEBOUNCE: Duration = Duration::ZERO;
/// Default period of the sampling stage. Zero disables it.
pub const DEFAULT_THROTTLE: Duration = Duration::ZERO;
/// Default grace period before an unobserved pipeline idles.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_NAME: &str = "refresher";

/// Construction-time settings of a [`Refresher`](crate::Refresher).
///
/// Durations deserialize from milliseconds when the `serde` feature is on:
///
/// ```json
/// { "name": "prices", "debounce_ms": 300, "sharing": { "mode": "eager" } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RefresherConfig {
	#[cfg_attr(feature = "serde", serde(rename = "debounce_ms", with = "millis"))]
	debounce: Duration,
	#[cfg_attr(feature = "serde", serde(rename = "throttle_ms", with = "millis"))]
	throttle: Duration,
	sharing: SharingPolicy,
	name: String,
}

impl Default for RefresherConfig {
	fn default() -> Self {
		Self {
			debounce: DEFAULT_DEBOUNCE,
			throttle: DEFAULT_THROTTLE,
			sharing: SharingPolicy::default(),
			name: DEFAULT_NAME.to_owned(),
		}
	}
}

impl RefresherConfig {
	pub fn new() -> Self {
		Self::default()
	}

	/// Quiet window a trigger must survive before it is executed.
	#[must_use]
	pub fn debounce(mut self, debounce: Duration) -> Self {
		self.debounce = debounce;
		self
	}

	/// Sampling period capping how often triggers reach the producer.
	#[must_use]
	pub fn throttle(mut self, throttle: Duration) -> Self {
		self.throttle = throttle;
		self
	}

	#[must_use]
	pub fn sharing(mut self, sharing: SharingPolicy) -> Self {
		self.sharing = sharing;
		self
	}

	/// Name attached to every log event of the refresher.
	#[must_use]
	pub fn name(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	pub fn debounce_interval(&self) -> Duration {
		self.debounce
	}

	pub fn throttle_period(&self) -> Duration {
		self.throttle
	}

	pub fn sharing_policy(&self) -> SharingPolicy {
		self.sharing
	}

	pub fn label(&self) -> &str {
		&self.name
	}
}

/// `Duration` as whole milliseconds.
#[cfg(feature = "serde")]
pub(crate) mod millis {
	use std::time::Duration;

	use serde::{Deserialize, Deserializer, Serializer};

	pub(crate) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
	}

	pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
		u64::deserialize(deserializer).map(Duration::from_millis)
	}
}
