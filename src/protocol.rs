//! Newline-delimited JSON frames exchanged with the launcher backend.
//!
//! Requests carry an id; the backend answers each with a reply carrying the
//! same id. Events (download progress) arrive unsolicited at any time.

use crate::registry::{Entry, Profile};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const CMD_CLOSE: &str = "close";
pub const CMD_LAUNCH: &str = "launch";
pub const CMD_IMPORT: &str = "import";
pub const CMD_LOAD_PROFILES: &str = "load_profiles";

pub const EVENT_DOWNLOAD_PROGRESS: &str = "downloadProgress";

/// `game` value the backend uses when the user dismissed its file picker.
const IMPORT_CANCELLED_GAME: &str = "error";

#[derive(Debug, Serialize)]
pub struct Request<'a> {
    pub id: u64,
    pub cmd: &'a str,
    pub payload: Value,
}

#[derive(Debug, Deserialize)]
pub struct ReplyFrame {
    pub id: u64,
    #[serde(default)]
    pub ok: Value,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventFrame {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Incoming {
    Reply(ReplyFrame),
    Event(EventFrame),
}

pub fn encode_request(id: u64, cmd: &str, payload: Value) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(&Request { id, cmd, payload })?;
    line.push('\n');
    Ok(line)
}

pub fn decode_incoming(line: &str) -> serde_json::Result<Incoming> {
    serde_json::from_str(line.trim())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported(Profile),
    Cancelled,
}

pub fn import_outcome(value: Value) -> serde_json::Result<ImportOutcome> {
    let profile: Profile = serde_json::from_value(value)?;
    if profile.game == IMPORT_CANCELLED_GAME {
        return Ok(ImportOutcome::Cancelled);
    }
    Ok(ImportOutcome::Imported(profile))
}

/// What the play action asks the backend to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchTarget {
    Profile(Profile),
    Game { id: String },
}

impl LaunchTarget {
    pub fn label(&self) -> &str {
        match self {
            LaunchTarget::Profile(profile) => &profile.name,
            LaunchTarget::Game { id } => id,
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            LaunchTarget::Profile(profile) => json!({ "profile": profile }),
            LaunchTarget::Game { id } => json!({ "game": id }),
        }
    }
}

impl From<&Entry> for LaunchTarget {
    fn from(entry: &Entry) -> Self {
        match entry {
            Entry::Profile(profile) => LaunchTarget::Profile(profile.clone()),
            Entry::Game(game) => LaunchTarget::Game {
                id: game.id.clone(),
            },
        }
    }
}
