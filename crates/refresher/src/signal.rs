/// Origin of a refresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TriggerSignal {
	/// Synthesized on activation or requested by code.
	#[default]
	Automatic,
	/// Requested by a user gesture (pull-to-refresh, retry button).
	UserInitiated,
}

impl TriggerSignal {
	pub const fn from_user(from_user: bool) -> Self {
		if from_user { Self::UserInitiated } else { Self::Automatic }
	}

	pub const fn is_user_initiated(self) -> bool {
		matches!(self, Self::UserInitiated)
	}

	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Automatic => "automatic",
			Self::UserInitiated => "user",
		}
	}
}
