//! Grammar of inline-button payloads used by the authoring form.
//!
//! ```text
//! ask:<field>[:<i>]        open a field, collected until "done"
//! quick:<field>[:<i>]      open a field, answered by one (possibly split) message
//! done | cancel | cover | publish | discard | form
//! access:story:<r>         r in {0, 1}
//! access:ending:<i>:<r>
//! ```

use std::{fmt, str::FromStr};

use thiserror::Error;

use crate::dao::models::{AccessRank, FieldKind, InputMode, MAX_ENDINGS};

/// What an access choice applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessTarget {
    /// The whole story.
    Story,
    /// One ending, by 0-based index.
    Ending(usize),
}

/// Parsed button payload.
///
/// ```
/// use tale_forge_back::dto::callback::CallbackAction;
///
/// let action: CallbackAction = "done".parse().unwrap();
/// assert_eq!(action, CallbackAction::Done);
/// assert!("ask:nope".parse::<CallbackAction>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    /// `ask:` or `quick:`: open a free-text field.
    Ask {
        /// Field to fill.
        field: FieldKind,
        /// Ending slot for ending fields.
        index: Option<usize>,
        /// `Wizard` for `ask`, `SingleMessage` for `quick`.
        mode: InputMode,
    },
    /// Finalize the open buffer.
    Done,
    /// Abandon whatever input is in progress.
    Cancel,
    /// Set a minimum reader rank.
    Access {
        /// Story or ending the rank applies to.
        target: AccessTarget,
        /// Chosen rank.
        rank: AccessRank,
    },
    /// Wait for a cover picture.
    Cover,
    /// Publish the draft.
    Publish,
    /// Delete the draft.
    Discard,
    /// Re-render the form.
    ShowForm,
}

/// Payload that matches no known button.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed callback payload `{0}`")]
pub struct MalformedCallback(pub String);

impl FromStr for CallbackAction {
    type Err = MalformedCallback;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let malformed = || MalformedCallback(raw.to_owned());
        let parts: Vec<&str> = raw.split(':').collect();

        let action = match parts.as_slice() {
            ["done"] => CallbackAction::Done,
            ["cancel"] => CallbackAction::Cancel,
            ["cover"] => CallbackAction::Cover,
            ["publish"] => CallbackAction::Publish,
            ["discard"] => CallbackAction::Discard,
            ["form"] => CallbackAction::ShowForm,
            [verb @ ("ask" | "quick"), field, rest @ ..] => {
                let field: FieldKind = field.parse().map_err(|_| malformed())?;
                if !field.is_freeform() {
                    return Err(malformed());
                }
                let index = match (field.targets_ending(), rest) {
                    (true, [index]) => Some(parse_index(index).ok_or_else(malformed)?),
                    (false, []) => None,
                    _ => return Err(malformed()),
                };
                let mode = if *verb == "ask" {
                    InputMode::Wizard
                } else {
                    InputMode::SingleMessage
                };
                CallbackAction::Ask { field, index, mode }
            }
            ["access", "story", rank] => CallbackAction::Access {
                target: AccessTarget::Story,
                rank: parse_rank(rank).ok_or_else(malformed)?,
            },
            ["access", "ending", index, rank] => CallbackAction::Access {
                target: AccessTarget::Ending(parse_index(index).ok_or_else(malformed)?),
                rank: parse_rank(rank).ok_or_else(malformed)?,
            },
            _ => return Err(malformed()),
        };

        Ok(action)
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackAction::Ask { field, index, mode } => {
                let verb = match mode {
                    InputMode::Wizard => "ask",
                    InputMode::SingleMessage => "quick",
                };
                match index {
                    Some(index) => write!(f, "{verb}:{field}:{index}"),
                    None => write!(f, "{verb}:{field}"),
                }
            }
            CallbackAction::Done => f.write_str("done"),
            CallbackAction::Cancel => f.write_str("cancel"),
            CallbackAction::Access { target, rank } => {
                let rank = u8::from(*rank);
                match target {
                    AccessTarget::Story => write!(f, "access:story:{rank}"),
                    AccessTarget::Ending(index) => write!(f, "access:ending:{index}:{rank}"),
                }
            }
            CallbackAction::Cover => f.write_str("cover"),
            CallbackAction::Publish => f.write_str("publish"),
            CallbackAction::Discard => f.write_str("discard"),
            CallbackAction::ShowForm => f.write_str("form"),
        }
    }
}

/// Ending slots beyond the publishable maximum are never addressable from a button.
fn parse_index(raw: &str) -> Option<usize> {
    raw.parse::<usize>().ok().filter(|index| *index < MAX_ENDINGS)
}

fn parse_rank(raw: &str) -> Option<AccessRank> {
    raw.parse::<u8>().ok().and_then(|rank| AccessRank::try_from(rank).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_field_questions() {
        assert_eq!(
            "ask:title".parse(),
            Ok(CallbackAction::Ask {
                field: FieldKind::Title,
                index: None,
                mode: InputMode::Wizard,
            })
        );
        assert_eq!(
            "quick:endingText:2".parse(),
            Ok(CallbackAction::Ask {
                field: FieldKind::EndingText,
                index: Some(2),
                mode: InputMode::SingleMessage,
            })
        );
    }

    #[test]
    fn rejects_inconsistent_payloads() {
        for raw in [
            "ask:title:1",
            "ask:endingTitle",
            "ask:endingTitle:3",
            "ask:accessStory",
            "access:story:2",
            "access:ending:9:1",
            "quick",
            "",
            "done:now",
        ] {
            assert!(raw.parse::<CallbackAction>().is_err(), "{raw} should fail");
        }
    }

    #[test]
    fn display_is_parseable() {
        let actions = [
            CallbackAction::Ask {
                field: FieldKind::EndingTitle,
                index: Some(1),
                mode: InputMode::Wizard,
            },
            CallbackAction::Access {
                target: AccessTarget::Ending(0),
                rank: AccessRank::Premium,
            },
            CallbackAction::Access {
                target: AccessTarget::Story,
                rank: AccessRank::Free,
            },
            CallbackAction::ShowForm,
        ];
        for action in actions {
            assert_eq!(action.to_string().parse(), Ok(action));
        }
    }
}
