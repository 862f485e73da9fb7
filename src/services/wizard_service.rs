//! Authoring operations reachable from the admin's buttons.
//!
//! Every operation ends by sending the admin an up-to-date view, so the chat always shows
//! the current draft and what the bot is waiting for.

use std::time::SystemTime;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{
        AccessRank, ChatId, FieldKind, InputMode, MAX_ENDINGS, OwnerId, PendingQuestionEntity,
        StoryEndingEntity, StoryEntity,
    },
    dto::{
        callback::{AccessTarget, CallbackAction},
        telegram::{InlineKeyboardButton, InlineKeyboardMarkup},
        validation::{describe, validate_creatable},
    },
    error::ServiceError,
    services::{
        form::{self, FormView},
        reconciler::{self, CommitOutcome},
    },
    state::{SharedState, long_text::MergedInput, side_flow::CoverUpload},
};

async fn send_view(state: &SharedState, chat: ChatId, view: FormView) -> Result<(), ServiceError> {
    state
        .transport()
        .send_message(chat, view.text, Some(view.keyboard))
        .await?;
    Ok(())
}

/// Render the owner's draft into `chat`, with an optional hint line.
pub async fn show_form(
    state: &SharedState,
    owner: OwnerId,
    chat: ChatId,
    hint: Option<&str>,
) -> Result<(), ServiceError> {
    let store = state.require_draft_store().await?;
    let draft = store.find_or_create_draft(owner).await?;
    let pending = state.pending().get(store.as_ref(), owner).await?;
    send_view(state, chat, form::render(&draft, pending.as_ref(), hint)).await
}

/// Open a free-text field: record the pending question and start a fresh buffer.
///
/// Any earlier question, buffer, merge, or cover upload of the owner is abandoned.
pub async fn open_field(
    state: &SharedState,
    owner: OwnerId,
    chat: ChatId,
    field: FieldKind,
    index: Option<usize>,
    mode: InputMode,
) -> Result<(), ServiceError> {
    if !field.is_freeform() {
        return Err(ServiceError::InvalidInput(format!(
            "field `{field}` is not typed in"
        )));
    }
    match index {
        Some(index) if !field.targets_ending() || index >= MAX_ENDINGS => {
            return Err(ServiceError::InvalidInput(format!(
                "field `{field}` cannot target ending {index}"
            )));
        }
        None if field.targets_ending() => {
            return Err(ServiceError::InvalidInput(format!(
                "field `{field}` needs an ending index"
            )));
        }
        _ => {}
    }

    let store = state.require_draft_store().await?;
    state.merger().discard(owner);
    state.cover_uploads().cancel(owner);
    state.aggregator().start(owner, chat, field);

    let question = PendingQuestionEntity::new(owner, field, index, mode);
    if let Err(err) = state.pending().set(store.as_ref(), question.clone()).await {
        state.aggregator().reset(owner);
        return Err(err.into());
    }
    debug!(owner, chat, kind = %field, ?index, ?mode, "field opened");

    send_view(state, chat, form::prompt(&question)).await
}

/// Finalize the owner's buffer and commit it.
///
/// Returns `None` when there was nothing to finalize, e.g. a second press of "done".
pub async fn finish(
    state: &SharedState,
    owner: OwnerId,
) -> Result<Option<CommitOutcome>, ServiceError> {
    let Some(input) = state.aggregator().finalize(owner) else {
        debug!(owner, "finish without an open buffer; ignoring");
        return Ok(None);
    };
    let chat = input.chat;

    let outcome = reconciler::commit(state, owner, input).await?;
    show_form(state, owner, chat, Some(&outcome.hint())).await?;
    Ok(Some(outcome))
}

/// Commit a completed long-text merge as the answer to the pending question.
pub async fn commit_merged(
    state: &SharedState,
    owner: OwnerId,
    merged: MergedInput,
) -> Result<Option<CommitOutcome>, ServiceError> {
    for fragment in &merged.fragments {
        state
            .aggregator()
            .push(owner, merged.chat, &fragment.text, fragment.message_id);
    }
    finish(state, owner).await
}

/// Drop everything the owner was in the middle of. Nothing is written to the draft.
pub async fn cancel(state: &SharedState, owner: OwnerId, chat: ChatId) -> Result<(), ServiceError> {
    let store = state.require_draft_store().await?;
    let had_buffer = state.aggregator().reset(owner);
    let had_merge = state.merger().discard(owner);
    let had_upload = state.cover_uploads().cancel(owner);
    let had_question = state.pending().clear(store.as_ref(), owner).await?;
    debug!(
        owner,
        had_buffer, had_merge, had_upload, had_question, "authoring input cancelled"
    );

    show_form(state, owner, chat, Some("Cancelled, nothing was saved.")).await
}

/// Apply an access choice and re-render the form.
pub async fn set_access(
    state: &SharedState,
    owner: OwnerId,
    chat: ChatId,
    target: AccessTarget,
    rank: AccessRank,
) -> Result<(), ServiceError> {
    reconciler::apply_access(state, owner, target, rank).await?;
    show_form(state, owner, chat, Some("Access updated.")).await
}

/// Wait for a cover picture from the owner.
pub async fn begin_cover_upload(
    state: &SharedState,
    owner: OwnerId,
    chat: ChatId,
) -> Result<(), ServiceError> {
    state.require_draft_store().await?;
    state.cover_uploads().begin(owner, CoverUpload { chat });
    send_view(state, chat, form::cover_prompt()).await
}

/// Store `file_id` as the draft cover if an upload was awaited. Returns whether it was.
pub async fn receive_cover(
    state: &SharedState,
    owner: OwnerId,
    file_id: &str,
) -> Result<bool, ServiceError> {
    let Some(upload) = state.cover_uploads().find(owner) else {
        return Ok(false);
    };

    let store = state.require_draft_store().await?;
    let mut draft = store.find_or_create_draft(owner).await?;
    draft.cover_file_id = Some(file_id.to_owned());
    draft.updated_at = SystemTime::now();
    store.save_draft(draft).await?;
    state.cover_uploads().take(owner);

    show_form(state, owner, upload.chat, Some("Cover saved.")).await?;
    Ok(true)
}

/// Turn a creatable draft into a story and remove the draft.
///
/// A draft that is not creatable is left untouched and the reason becomes the form hint.
/// Returns the new story id on success.
pub async fn publish(
    state: &SharedState,
    owner: OwnerId,
    chat: ChatId,
) -> Result<Option<Uuid>, ServiceError> {
    let store = state.require_draft_store().await?;
    let draft = store.find_or_create_draft(owner).await?;

    if let Err(err) = validate_creatable(&draft) {
        let hint = format!("Cannot publish yet. {}", describe(&err));
        show_form(state, owner, chat, Some(&hint)).await?;
        return Ok(None);
    }

    let endings = draft
        .endings
        .iter()
        .filter(|ending| ending.is_complete())
        .map(|ending| StoryEndingEntity {
            title: ending.title.as_deref().unwrap_or_default().trim().to_owned(),
            text: ending.text.as_deref().unwrap_or_default().trim().to_owned(),
            min_rank: ending.min_rank,
        })
        .collect();
    let story = StoryEntity {
        id: Uuid::new_v4(),
        author_id: owner,
        title: draft.title.as_deref().unwrap_or_default().trim().to_owned(),
        intro: draft.intro.as_deref().unwrap_or_default().trim().to_owned(),
        endings,
        min_rank: draft.min_rank,
        cover_file_id: draft.cover_file_id.clone(),
        published_at: SystemTime::now(),
    };
    let story_id = story.id;
    let title = story.title.clone();

    store.save_story(story).await?;
    clear_flows(state, owner).await?;
    if !store.delete_draft(owner).await? {
        warn!(owner, %story_id, "published draft was already gone");
    }
    info!(owner, %story_id, "story published");

    state
        .transport()
        .send_message(
            chat,
            format!("Published \"{title}\"."),
            Some(new_draft_keyboard()),
        )
        .await?;
    Ok(Some(story_id))
}

/// Delete the owner's draft together with any in-flight input.
///
/// Fails with [`ServiceError::NotFound`] when there was no draft to delete.
pub async fn discard(state: &SharedState, owner: OwnerId, chat: ChatId) -> Result<(), ServiceError> {
    let store = state.require_draft_store().await?;
    clear_flows(state, owner).await?;
    if !store.delete_draft(owner).await? {
        return Err(ServiceError::NotFound(format!("no draft for owner {owner}")));
    }
    info!(owner, "draft discarded");

    state
        .transport()
        .send_message(chat, "Draft discarded.".to_owned(), Some(new_draft_keyboard()))
        .await?;
    Ok(())
}

async fn clear_flows(state: &SharedState, owner: OwnerId) -> Result<(), ServiceError> {
    let store = state.require_draft_store().await?;
    state.aggregator().reset(owner);
    state.merger().discard(owner);
    state.cover_uploads().cancel(owner);
    state.pending().clear(store.as_ref(), owner).await?;
    Ok(())
}

fn new_draft_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::default().row(vec![InlineKeyboardButton::new(
        "New draft",
        CallbackAction::ShowForm,
    )])
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::draft_store::{DraftStore, MemoryDraftStore},
        services::{
            roles::StaticAdmins,
            transport::{DryRunTransport, OutboundCall},
        },
        state::{AppState, aggregator::BufferKind},
    };

    const OWNER: OwnerId = 9;
    const CHAT: ChatId = 90;

    async fn setup() -> (SharedState, MemoryDraftStore, DryRunTransport) {
        let store = MemoryDraftStore::new();
        let transport = DryRunTransport::new();
        let state = AppState::new(
            AppConfig::default(),
            Arc::new(transport.clone()),
            Arc::new(StaticAdmins::new([OWNER])),
        );
        state.install_draft_store(Arc::new(store.clone())).await;
        (state, store, transport)
    }

    #[tokio::test]
    async fn open_field_keeps_question_and_buffer_in_step() {
        let (state, store, transport) = setup().await;
        open_field(&state, OWNER, CHAT, FieldKind::Intro, None, InputMode::Wizard)
            .await
            .unwrap();

        assert_eq!(store.pending(OWNER).unwrap().field, FieldKind::Intro);
        assert_eq!(
            state.aggregator().kind_of(OWNER),
            Some(BufferKind::Field(FieldKind::Intro))
        );
        assert!(transport.sent_texts()[0].starts_with("Send the intro."));

        open_field(
            &state,
            OWNER,
            CHAT,
            FieldKind::EndingTitle,
            Some(1),
            InputMode::SingleMessage,
        )
        .await
        .unwrap();
        let question = store.pending(OWNER).unwrap();
        assert_eq!(question.field, FieldKind::EndingTitle);
        assert_eq!(question.index, Some(1));
        assert_eq!(
            state.aggregator().kind_of(OWNER),
            Some(BufferKind::Field(FieldKind::EndingTitle))
        );
    }

    #[tokio::test]
    async fn open_field_rejects_bad_targets() {
        let (state, store, _transport) = setup().await;
        for (field, index) in [
            (FieldKind::AccessStory, None),
            (FieldKind::Title, Some(0)),
            (FieldKind::EndingText, None),
            (FieldKind::EndingText, Some(MAX_ENDINGS)),
        ] {
            let err = open_field(&state, OWNER, CHAT, field, index, InputMode::Wizard)
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::InvalidInput(_)));
        }
        assert!(store.pending(OWNER).is_none());
        assert!(!state.aggregator().is_open(OWNER));
    }

    #[tokio::test]
    async fn failed_question_write_closes_buffer() {
        let (state, store, _transport) = setup().await;
        store.set_offline(true);

        let result = open_field(&state, OWNER, CHAT, FieldKind::Title, None, InputMode::Wizard).await;
        assert!(matches!(result, Err(ServiceError::Unavailable(_))));
        assert!(!state.aggregator().is_open(OWNER));
    }

    #[tokio::test]
    async fn second_finish_is_a_no_op() {
        let (state, store, _transport) = setup().await;
        open_field(&state, OWNER, CHAT, FieldKind::Title, None, InputMode::Wizard)
            .await
            .unwrap();
        state.aggregator().push(OWNER, CHAT, "The ", Some(1));
        state.aggregator().push(OWNER, CHAT, "Lighthouse", Some(2));

        let outcome = finish(&state, OWNER).await.unwrap();
        assert_eq!(
            outcome,
            Some(CommitOutcome::Saved {
                field: FieldKind::Title,
                index: None
            })
        );
        assert_eq!(
            store.draft(OWNER).unwrap().title.as_deref(),
            Some("The Lighthouse")
        );

        assert_eq!(finish(&state, OWNER).await.unwrap(), None);
        assert!(store.pending(OWNER).is_none());
    }

    #[tokio::test]
    async fn cancel_clears_everything_without_writing() {
        let (state, store, _transport) = setup().await;
        open_field(&state, OWNER, CHAT, FieldKind::Intro, None, InputMode::Wizard)
            .await
            .unwrap();
        state
            .aggregator()
            .push(OWNER, CHAT, "half an intro", Some(3));

        cancel(&state, OWNER, CHAT).await.unwrap();

        assert!(store.pending(OWNER).is_none());
        assert!(!state.aggregator().is_open(OWNER));
        assert_eq!(store.draft(OWNER).unwrap().intro, None);
        assert_eq!(finish(&state, OWNER).await.unwrap(), None);
    }

    #[tokio::test]
    async fn cover_is_saved_only_while_awaited() {
        let (state, store, _transport) = setup().await;
        assert!(!receive_cover(&state, OWNER, "file-1").await.unwrap());

        begin_cover_upload(&state, OWNER, CHAT).await.unwrap();
        assert!(receive_cover(&state, OWNER, "file-2").await.unwrap());
        assert_eq!(
            store.draft(OWNER).unwrap().cover_file_id.as_deref(),
            Some("file-2")
        );
        assert!(!receive_cover(&state, OWNER, "file-3").await.unwrap());
    }

    #[tokio::test]
    async fn publish_requires_creatable_draft() {
        let (state, store, transport) = setup().await;
        let mut draft = store.find_or_create_draft(OWNER).await.unwrap();
        draft.title = Some("Fog".into());
        store.save_draft(draft.clone()).await.unwrap();

        assert_eq!(publish(&state, OWNER, CHAT).await.unwrap(), None);
        assert!(transport.sent_texts()[0].contains("Cannot publish yet."));
        assert!(store.stories().is_empty());

        draft.intro = Some("A ship drifts into the fog.".into());
        draft.ending_mut(2).title = Some("Home".into());
        draft.ending_mut(2).text = Some("They reach the shore.".into());
        draft.ending_mut(0).title = Some("Half-written".into());
        store.save_draft(draft).await.unwrap();

        let id = publish(&state, OWNER, CHAT).await.unwrap().unwrap();
        let stories = store.stories();
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].id, id);
        assert_eq!(stories[0].endings.len(), 1);
        assert_eq!(stories[0].endings[0].title, "Home");
        assert_eq!(store.draft(OWNER), None);
    }

    #[tokio::test]
    async fn discard_reports_missing_draft() {
        let (state, store, transport) = setup().await;
        show_form(&state, OWNER, CHAT, None).await.unwrap();
        assert!(store.draft(OWNER).is_some());

        discard(&state, OWNER, CHAT).await.unwrap();
        assert_eq!(store.draft(OWNER), None);
        assert!(matches!(
            transport.calls().last(),
            Some(OutboundCall::Send { text, .. }) if text == "Draft discarded."
        ));

        let err = discard(&state, OWNER, CHAT).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
