//! Typed shapes for the endpoints the client consumes.
//!
//! Only the fields collaborators rely on are modeled; everything else the API returns is
//! kept in the `extra` map of each type so nothing is lost when the raw document is persisted.

// self
use crate::_prelude::*;

/// Loosely typed JSON object used for unmodeled fields.
pub type JsonMap = serde_json::Map<String, Value>;

/// Authenticated user returned by `GET /user`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
	/// Numeric account identifier.
	pub id: u64,
	/// Login handle.
	pub login: String,
	/// Display name.
	#[serde(default)]
	pub name: Option<String>,
	/// Public email, when the user exposes one.
	#[serde(default)]
	pub email: Option<String>,
	/// Avatar image URL.
	#[serde(default)]
	pub avatar_url: Option<String>,
	/// Profile page URL.
	#[serde(default)]
	pub html_url: Option<String>,
	/// Account creation time.
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub created_at: Option<OffsetDateTime>,
	/// Unmodeled fields.
	#[serde(flatten)]
	pub extra: JsonMap,
}

/// Item of `GET /users/{username}/events`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
	/// Event identifier, unique per provider.
	pub id: String,
	/// Provider event type, e.g. `PushEvent`.
	#[serde(rename = "type")]
	pub event_type: String,
	/// Account that triggered the event.
	pub actor: EventActor,
	/// Repository the event belongs to.
	pub repo: EventRepo,
	/// Type-specific body, kept opaque.
	#[serde(default)]
	pub payload: Value,
	/// Whether the event is publicly visible.
	#[serde(default)]
	pub public: bool,
	/// When the event happened.
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
	/// Unmodeled fields.
	#[serde(flatten)]
	pub extra: JsonMap,
}
impl Event {
	/// Coarse activity category, or `None` for event types analytics ignore.
	pub fn kind(&self) -> Option<EventKind> {
		EventKind::from_event_type(&self.event_type)
	}
}

/// Actor block of an [`Event`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventActor {
	/// Numeric account identifier.
	pub id: u64,
	/// Login handle.
	pub login: String,
	/// Unmodeled fields.
	#[serde(flatten)]
	pub extra: JsonMap,
}

/// Repository block of an [`Event`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRepo {
	/// Numeric repository identifier.
	pub id: u64,
	/// `owner/name` slug.
	pub name: String,
	/// API URL of the repository.
	#[serde(default)]
	pub url: Option<String>,
}

/// Activity categories derived from provider event types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
	/// Pushed commits.
	Commit,
	/// Pull request opened, closed, or reviewed.
	PullRequest,
	/// Issue activity.
	Issue,
	/// Comment on an issue, pull request, or commit.
	Comment,
}
impl EventKind {
	/// Maps a provider event type onto a category.
	pub fn from_event_type(event_type: &str) -> Option<Self> {
		match event_type {
			"PushEvent" => Some(Self::Commit),
			"PullRequestEvent" | "PullRequestReviewEvent" => Some(Self::PullRequest),
			"IssuesEvent" => Some(Self::Issue),
			"IssueCommentEvent" | "CommitCommentEvent" | "PullRequestReviewCommentEvent" =>
				Some(Self::Comment),
			_ => None,
		}
	}

	/// Returns a stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			EventKind::Commit => "commit",
			EventKind::PullRequest => "pull_request",
			EventKind::Issue => "issue",
			EventKind::Comment => "comment",
		}
	}
}
impl Display for EventKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
