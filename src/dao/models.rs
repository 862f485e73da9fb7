use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::SystemTime};
use uuid::Uuid;

/// Stable identity of a chat user (the admin authoring a story).
pub type OwnerId = i64;
/// Identifier of the chat a message arrived on.
pub type ChatId = i64;
/// Transport-level identifier of a single chat message.
pub type MessageId = i64;

/// Maximum number of endings a story may carry once published.
pub const MAX_ENDINGS: usize = 3;

/// Draft field an admin can be asked to fill in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    /// Story title.
    Title,
    /// Opening text shown before the reader picks an ending.
    Intro,
    /// Title of one ending.
    EndingTitle,
    /// Body of one ending.
    EndingText,
    /// Minimum rank required to read the story.
    AccessStory,
    /// Minimum rank required to read one ending.
    AccessEnding,
}

impl FieldKind {
    /// Whether the field is collected as free text (as opposed to a fixed choice).
    pub fn is_freeform(self) -> bool {
        !matches!(self, FieldKind::AccessStory | FieldKind::AccessEnding)
    }

    /// Whether the field addresses one entry of the endings list.
    pub fn targets_ending(self) -> bool {
        matches!(
            self,
            FieldKind::EndingTitle | FieldKind::EndingText | FieldKind::AccessEnding
        )
    }

    /// Wire name used in callback payloads and persisted documents.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::Title => "title",
            FieldKind::Intro => "intro",
            FieldKind::EndingTitle => "endingTitle",
            FieldKind::EndingText => "endingText",
            FieldKind::AccessStory => "accessStory",
            FieldKind::AccessEnding => "accessEnding",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a field name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown field kind `{0}`")]
pub struct UnknownFieldKind(pub String);

impl FromStr for FieldKind {
    type Err = UnknownFieldKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "title" => Ok(FieldKind::Title),
            "intro" => Ok(FieldKind::Intro),
            "endingTitle" => Ok(FieldKind::EndingTitle),
            "endingText" => Ok(FieldKind::EndingText),
            "accessStory" => Ok(FieldKind::AccessStory),
            "accessEnding" => Ok(FieldKind::AccessEnding),
            other => Err(UnknownFieldKind(other.to_owned())),
        }
    }
}

/// How the answer to a pending question is collected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum InputMode {
    /// Any number of messages, closed by an explicit "done" button.
    #[default]
    Wizard,
    /// One logical message, reassembled from platform-split parts and committed on arrival.
    SingleMessage,
}

/// Minimum reader rank required to access a story or an ending.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(into = "u8", try_from = "u8")]
pub enum AccessRank {
    /// Available to every reader.
    #[default]
    Free,
    /// Requires a subscription.
    Premium,
}

impl From<AccessRank> for u8 {
    fn from(value: AccessRank) -> Self {
        match value {
            AccessRank::Free => 0,
            AccessRank::Premium => 1,
        }
    }
}

impl TryFrom<u8> for AccessRank {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AccessRank::Free),
            1 => Ok(AccessRank::Premium),
            other => Err(format!("access rank must be 0 or 1 (got {other})")),
        }
    }
}

/// The single outstanding "what are we collecting right now" marker for an owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingQuestionEntity {
    /// Admin whose answer is awaited.
    pub owner_id: OwnerId,
    /// Draft field the answer will be written to.
    pub field: FieldKind,
    /// Ending slot (0-based) when `field` targets an ending.
    pub index: Option<usize>,
    /// Collection mode chosen when the question was opened.
    pub mode: InputMode,
    /// Time the question was opened.
    pub asked_at: SystemTime,
}

impl PendingQuestionEntity {
    /// Open a question for `field` right now.
    pub fn new(owner_id: OwnerId, field: FieldKind, index: Option<usize>, mode: InputMode) -> Self {
        Self {
            owner_id,
            field,
            index,
            mode,
            asked_at: SystemTime::now(),
        }
    }
}

/// One ending of a draft; every part may still be missing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct EndingEntity {
    /// Ending title.
    pub title: Option<String>,
    /// Ending body.
    pub text: Option<String>,
    /// Minimum rank required to read this ending.
    #[serde(default)]
    pub min_rank: AccessRank,
}

impl EndingEntity {
    /// An ending counts once both its title and text are non-empty.
    pub fn is_complete(&self) -> bool {
        let filled = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
        filled(&self.title) && filled(&self.text)
    }

    /// Whether nothing has been written into this slot yet.
    pub fn is_blank(&self) -> bool {
        self.title.is_none() && self.text.is_none()
    }
}

/// In-progress story record owned by one admin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DraftEntity {
    /// Admin owning the draft (one draft per admin).
    pub owner_id: OwnerId,
    /// Story title.
    pub title: Option<String>,
    /// Story intro.
    pub intro: Option<String>,
    /// Ending slots addressed by index; gaps are blank entries.
    pub endings: Vec<EndingEntity>,
    /// Minimum rank required to read the story.
    #[serde(default)]
    pub min_rank: AccessRank,
    /// Platform file identifier of the cover picture.
    pub cover_file_id: Option<String>,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last time the draft was written.
    pub updated_at: SystemTime,
}

impl DraftEntity {
    /// Fresh, empty draft for `owner_id`.
    pub fn new(owner_id: OwnerId) -> Self {
        let now = SystemTime::now();
        Self {
            owner_id,
            title: None,
            intro: None,
            endings: Vec::new(),
            min_rank: AccessRank::Free,
            cover_file_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Borrow the ending at `index`, growing the list with blank slots when needed.
    pub fn ending_mut(&mut self, index: usize) -> &mut EndingEntity {
        if self.endings.len() <= index {
            self.endings.resize_with(index + 1, EndingEntity::default);
        }
        &mut self.endings[index]
    }
}

/// Ending of a published story.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoryEndingEntity {
    /// Ending title.
    pub title: String,
    /// Ending body.
    pub text: String,
    /// Minimum rank required to read this ending.
    pub min_rank: AccessRank,
}

/// Published story produced from a creatable draft.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoryEntity {
    /// Primary key of the story.
    pub id: Uuid,
    /// Admin who authored the story.
    pub author_id: OwnerId,
    /// Story title.
    pub title: String,
    /// Story intro.
    pub intro: String,
    /// Complete endings in draft order.
    pub endings: Vec<StoryEndingEntity>,
    /// Minimum rank required to read the story.
    pub min_rank: AccessRank,
    /// Platform file identifier of the cover picture.
    pub cover_file_id: Option<String>,
    /// Publication timestamp.
    pub published_at: SystemTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ending_mut_grows_sparse_slots() {
        let mut draft = DraftEntity::new(7);
        draft.ending_mut(2).text = Some("the end".into());

        assert_eq!(draft.endings.len(), 3);
        assert!(draft.endings[0].is_blank());
        assert!(draft.endings[1].is_blank());
        assert_eq!(draft.endings[2].text.as_deref(), Some("the end"));
    }

    #[test]
    fn only_text_fields_are_freeform() {
        assert!(FieldKind::EndingText.is_freeform());
        assert!(!FieldKind::AccessEnding.is_freeform());
        assert!(FieldKind::AccessEnding.targets_ending());
        assert!("cover".parse::<FieldKind>().is_err());
    }

    #[test]
    fn access_rank_rejects_out_of_range_values() {
        assert_eq!(AccessRank::try_from(1), Ok(AccessRank::Premium));
        assert!(AccessRank::try_from(2).is_err());
        assert_eq!(serde_json::to_string(&AccessRank::Premium).unwrap(), "1");
    }
}
