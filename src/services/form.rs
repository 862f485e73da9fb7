//! Text and keyboards of the authoring form and field prompts.

use std::fmt::Write;

use crate::{
    dao::models::{
        AccessRank, DraftEntity, EndingEntity, FieldKind, InputMode, MAX_ENDINGS,
        PendingQuestionEntity,
    },
    dto::{
        callback::{AccessTarget, CallbackAction},
        display_timestamp,
        telegram::{InlineKeyboardButton, InlineKeyboardMarkup},
        validation::{describe, validate_creatable},
    },
};

const PREVIEW_CHARS: usize = 80;

/// Rendered message: text plus inline keyboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormView {
    /// Message text.
    pub text: String,
    /// Buttons under the message.
    pub keyboard: InlineKeyboardMarkup,
}

/// Human label of a field, e.g. "title of ending 2".
pub fn field_label(field: FieldKind, index: Option<usize>) -> String {
    let ending = index.map_or(1, |index| index + 1);
    match field {
        FieldKind::Title => "title".to_owned(),
        FieldKind::Intro => "intro".to_owned(),
        FieldKind::EndingTitle => format!("title of ending {ending}"),
        FieldKind::EndingText => format!("text of ending {ending}"),
        FieldKind::AccessStory => "story access".to_owned(),
        FieldKind::AccessEnding => format!("access of ending {ending}"),
    }
}

/// Authoring form for `draft`. While a question is pending the keyboard only offers
/// to finish or cancel it.
pub fn render(
    draft: &DraftEntity,
    pending: Option<&PendingQuestionEntity>,
    hint: Option<&str>,
) -> FormView {
    let mut text = String::from("Story draft\n\n");
    let _ = writeln!(text, "Title: {}", preview(draft.title.as_deref()));
    let _ = writeln!(text, "Intro: {}", preview(draft.intro.as_deref()));
    let _ = writeln!(text, "Access: {}", rank_label(draft.min_rank));
    let _ = writeln!(
        text,
        "Cover: {}",
        if draft.cover_file_id.is_some() { "set" } else { "none" }
    );
    text.push_str("Endings:\n");
    for index in 0..MAX_ENDINGS.max(draft.endings.len()) {
        let line = match draft.endings.get(index) {
            Some(ending) if !ending.is_blank() => ending_line(ending),
            _ => "(empty)".to_owned(),
        };
        let _ = writeln!(text, "  {}. {line}", index + 1);
    }
    let _ = writeln!(text, "Last saved: {}", display_timestamp(draft.updated_at));
    match validate_creatable(draft) {
        Ok(()) => text.push_str("\nReady to publish."),
        Err(err) => {
            let _ = write!(text, "\nNot ready: {}", describe(&err));
        }
    }

    if let Some(question) = pending {
        let _ = write!(
            text,
            "\n\nWaiting for the {}.",
            field_label(question.field, question.index)
        );
    }
    if let Some(hint) = hint {
        let _ = write!(text, "\n\n{hint}");
    }

    let keyboard = match pending {
        Some(question) => question_keyboard(question.mode),
        None => form_keyboard(draft),
    };

    FormView { text, keyboard }
}

/// Prompt sent when a field is opened.
pub fn prompt(question: &PendingQuestionEntity) -> FormView {
    let label = field_label(question.field, question.index);
    let text = match question.mode {
        InputMode::Wizard => format!(
            "Send the {label}. You can split it over several messages; press Done when finished."
        ),
        InputMode::SingleMessage => format!("Send the {label} as one message."),
    };
    FormView {
        text,
        keyboard: question_keyboard(question.mode),
    }
}

/// Prompt sent when a cover upload starts.
pub fn cover_prompt() -> FormView {
    FormView {
        text: "Send the cover picture.".to_owned(),
        keyboard: InlineKeyboardMarkup::default()
            .row(vec![InlineKeyboardButton::new("Cancel", CallbackAction::Cancel)]),
    }
}

fn question_keyboard(mode: InputMode) -> InlineKeyboardMarkup {
    let mut buttons = Vec::with_capacity(2);
    if mode == InputMode::Wizard {
        buttons.push(InlineKeyboardButton::new("Done", CallbackAction::Done));
    }
    buttons.push(InlineKeyboardButton::new("Cancel", CallbackAction::Cancel));
    InlineKeyboardMarkup::default().row(buttons)
}

fn form_keyboard(draft: &DraftEntity) -> InlineKeyboardMarkup {
    let ask = |field, index, mode| CallbackAction::Ask { field, index, mode };

    let mut keyboard = InlineKeyboardMarkup::default().row(vec![
        InlineKeyboardButton::new(
            "Title",
            ask(FieldKind::Title, None, InputMode::SingleMessage),
        ),
        InlineKeyboardButton::new("Intro", ask(FieldKind::Intro, None, InputMode::Wizard)),
        InlineKeyboardButton::new("Cover", CallbackAction::Cover),
    ]);

    for index in 0..MAX_ENDINGS {
        let number = index + 1;
        let rank = draft
            .endings
            .get(index)
            .map_or(AccessRank::Free, |ending| ending.min_rank);
        keyboard = keyboard.row(vec![
            InlineKeyboardButton::new(
                format!("Ending {number} title"),
                ask(FieldKind::EndingTitle, Some(index), InputMode::SingleMessage),
            ),
            InlineKeyboardButton::new(
                format!("Ending {number} text"),
                ask(FieldKind::EndingText, Some(index), InputMode::Wizard),
            ),
            InlineKeyboardButton::new(
                format!("{number}: {}", rank_label(rank)),
                CallbackAction::Access {
                    target: AccessTarget::Ending(index),
                    rank: toggled(rank),
                },
            ),
        ]);
    }

    keyboard
        .row(vec![InlineKeyboardButton::new(
            format!("Story access: {}", rank_label(draft.min_rank)),
            CallbackAction::Access {
                target: AccessTarget::Story,
                rank: toggled(draft.min_rank),
            },
        )])
        .row(vec![
            InlineKeyboardButton::new("Publish", CallbackAction::Publish),
            InlineKeyboardButton::new("Discard", CallbackAction::Discard),
        ])
}

fn ending_line(ending: &EndingEntity) -> String {
    let text_len = ending.text.as_deref().map_or(0, |text| text.chars().count());
    format!(
        "{} ({text_len} chars, {})",
        preview(ending.title.as_deref()),
        rank_label(ending.min_rank)
    )
}

fn preview(value: Option<&str>) -> String {
    match value {
        None => "(not set)".to_owned(),
        Some(value) if value.chars().count() > PREVIEW_CHARS => {
            let head: String = value.chars().take(PREVIEW_CHARS).collect();
            format!("{head}...")
        }
        Some(value) => value.to_owned(),
    }
}

fn rank_label(rank: AccessRank) -> &'static str {
    match rank {
        AccessRank::Free => "free",
        AccessRank::Premium => "premium",
    }
}

fn toggled(rank: AccessRank) -> AccessRank {
    match rank {
        AccessRank::Free => AccessRank::Premium,
        AccessRank::Premium => AccessRank::Free,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_question_swaps_keyboard_for_done_and_cancel() {
        let draft = DraftEntity::new(1);
        let question =
            PendingQuestionEntity::new(1, FieldKind::Intro, None, InputMode::Wizard);

        let view = render(&draft, Some(&question), Some("Too short."));
        assert!(view.text.contains("Waiting for the intro."));
        assert!(view.text.ends_with("Too short."));
        let callbacks: Vec<_> = view.keyboard.inline_keyboard[0]
            .iter()
            .map(|button| button.callback_data.as_str())
            .collect();
        assert_eq!(callbacks, vec!["done", "cancel"]);
    }

    #[test]
    fn idle_form_offers_every_field() {
        let mut draft = DraftEntity::new(1);
        draft.ending_mut(1).min_rank = AccessRank::Premium;

        let view = render(&draft, None, None);
        let callbacks: Vec<_> = view
            .keyboard
            .inline_keyboard
            .iter()
            .flatten()
            .map(|button| button.callback_data.clone())
            .collect();

        assert!(callbacks.contains(&"quick:title".to_owned()));
        assert!(callbacks.contains(&"ask:endingText:2".to_owned()));
        assert!(callbacks.contains(&"access:ending:1:0".to_owned()));
        assert!(callbacks.contains(&"access:story:1".to_owned()));
        assert!(view.text.contains("Not ready"));
    }

    #[test]
    fn long_values_are_previewed() {
        let mut draft = DraftEntity::new(1);
        draft.intro = Some("x".repeat(500));
        let view = render(&draft, None, None);
        assert!(view.text.contains(&format!("Intro: {}...", "x".repeat(PREVIEW_CHARS))));
    }
}
