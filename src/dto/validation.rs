//! Validation rules applied to authored content before it is written to a draft.

use std::borrow::Cow;

use validator::ValidationError;

use crate::dao::models::{DraftEntity, FieldKind, MAX_ENDINGS};

const TITLE_MIN: usize = 3;
const TITLE_MAX: usize = 200;
const INTRO_MIN: usize = 10;
const ENDING_TEXT_MIN: usize = 5;

/// Validate free text for `field`, returning the trimmed value to store.
///
/// # Examples
///
/// ```ignore
/// validate_field(FieldKind::Title, "  abc ") // Ok("abc")
/// validate_field(FieldKind::Title, "ab")     // Err - too short
/// ```
pub fn validate_field(field: FieldKind, raw: &str) -> Result<String, ValidationError> {
    let value = raw.trim();
    let len = value.chars().count();

    let (min, max) = match field {
        FieldKind::Title | FieldKind::EndingTitle => (TITLE_MIN, Some(TITLE_MAX)),
        FieldKind::Intro => (INTRO_MIN, None),
        FieldKind::EndingText => (ENDING_TEXT_MIN, None),
        FieldKind::AccessStory | FieldKind::AccessEnding => {
            return Err(error(
                "field_not_freeform",
                "This setting is chosen with the buttons, not typed.".to_owned(),
            ));
        }
    };

    if len < min {
        return Err(error(
            "field_too_short",
            format!("Too short: at least {min} characters are needed (got {len})."),
        ));
    }
    if let Some(max) = max.filter(|max| len > *max) {
        return Err(error(
            "field_too_long",
            format!("Too long: at most {max} characters are allowed (got {len})."),
        ));
    }

    Ok(value.to_owned())
}

/// Check that a draft can be turned into a story: title, intro, and at least one
/// complete ending, with no more than [`MAX_ENDINGS`] ending slots.
pub fn validate_creatable(draft: &DraftEntity) -> Result<(), ValidationError> {
    let trimmed_len = |value: &Option<String>| value.as_deref().map_or(0, |v| v.trim().chars().count());

    if trimmed_len(&draft.title) < TITLE_MIN {
        return Err(error(
            "story_title_missing",
            format!("The story needs a title of at least {TITLE_MIN} characters."),
        ));
    }
    if trimmed_len(&draft.intro) < INTRO_MIN {
        return Err(error(
            "story_intro_missing",
            format!("The story needs an intro of at least {INTRO_MIN} characters."),
        ));
    }
    if draft.endings.len() > MAX_ENDINGS {
        return Err(error(
            "story_too_many_endings",
            format!("A story has at most {MAX_ENDINGS} endings."),
        ));
    }
    if !draft.endings.iter().any(|ending| ending.is_complete()) {
        return Err(error(
            "story_ending_missing",
            "At least one ending needs both a title and a text.".to_owned(),
        ));
    }

    Ok(())
}

/// User-facing text carried by a validation error.
pub fn describe(err: &ValidationError) -> String {
    err.message
        .as_ref()
        .map(|message| message.to_string())
        .unwrap_or_else(|| err.code.to_string())
}

fn error(code: &'static str, message: String) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Owned(message));
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::EndingEntity;

    #[test]
    fn title_bounds() {
        assert!(validate_field(FieldKind::Title, "ab").is_err());
        assert_eq!(validate_field(FieldKind::Title, "abc").unwrap(), "abc");
        assert_eq!(validate_field(FieldKind::Title, "  abc  ").unwrap(), "abc");
        assert!(validate_field(FieldKind::Title, "   ab   ").is_err());
        assert!(validate_field(FieldKind::EndingTitle, &"x".repeat(200)).is_ok());
        assert!(validate_field(FieldKind::EndingTitle, &"x".repeat(201)).is_err());
    }

    #[test]
    fn long_text_minimums() {
        assert!(validate_field(FieldKind::Intro, "Once upon").is_err());
        assert!(validate_field(FieldKind::Intro, "Once upon a").is_ok());
        assert!(validate_field(FieldKind::EndingText, "fin.").is_err());
        assert!(validate_field(FieldKind::EndingText, "The end").is_ok());
    }

    #[test]
    fn access_fields_are_not_typed() {
        let err = validate_field(FieldKind::AccessStory, "1").unwrap_err();
        assert_eq!(err.code, "field_not_freeform");
    }

    #[test]
    fn creatable_requires_one_complete_ending() {
        let mut draft = DraftEntity::new(1);
        draft.title = Some("Fog".into());
        draft.intro = Some("A lighthouse keeper hears a knock.".into());
        assert_eq!(
            validate_creatable(&draft).unwrap_err().code,
            "story_ending_missing"
        );

        draft.ending_mut(2).title = Some("Dawn".into());
        assert!(validate_creatable(&draft).is_err());

        draft.ending_mut(2).text = Some("The fog lifts.".into());
        assert!(validate_creatable(&draft).is_ok());

        draft.endings.push(EndingEntity::default());
        assert_eq!(
            validate_creatable(&draft).unwrap_err().code,
            "story_too_many_endings"
        );
    }

    #[test]
    fn describe_prefers_message() {
        let err = validate_field(FieldKind::Title, "a").unwrap_err();
        assert!(describe(&err).starts_with("Too short"));
    }
}
