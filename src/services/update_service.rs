//! Routes incoming chat updates to the authoring operations.

use std::time::Instant;

use tracing::{debug, warn};

use crate::{
    dao::models::InputMode,
    dto::{
        callback::CallbackAction,
        telegram::{CallbackQuery, Message, Update},
    },
    error::ServiceError,
    services::{reconciler::CommitOutcome, sweeper, wizard_service},
    state::{SharedState, long_text::MergeOutcome},
};

/// Handle one update delivered by the platform.
pub async fn handle_update(state: &SharedState, update: Update) -> Result<(), ServiceError> {
    sweeper::sweep_if_due(state, Instant::now()).await;

    if let Some(message) = update.message {
        return handle_message(state, message).await;
    }
    if let Some(query) = update.callback_query {
        return handle_callback(state, query).await;
    }
    debug!(update_id = update.update_id, "update without message or callback; ignoring");
    Ok(())
}

/// Feed a chat message into the owner's pending question, if there is one.
///
/// Messages from non-admins and messages nobody asked for are ignored. A question whose
/// buffer is gone is dropped and the admin is shown the form again.
pub async fn handle_message(state: &SharedState, message: Message) -> Result<(), ServiceError> {
    let Some(owner) = message.from.as_ref().map(|user| user.id) else {
        return Ok(());
    };
    let chat = message.chat.id;
    if !state.roles().is_admin(owner) {
        debug!(owner, chat, "message from non-admin; ignoring");
        return Ok(());
    }

    if let Some(photo) = message.largest_photo() {
        if wizard_service::receive_cover(state, owner, &photo.file_id).await? {
            return Ok(());
        }
    }

    let Some(text) = message.input_text() else {
        return Ok(());
    };

    let store = state.require_draft_store().await?;
    let Some(question) = state.pending().get(store.as_ref(), owner).await? else {
        debug!(owner, chat, "no pending question; message ignored");
        return Ok(());
    };
    if !question.field.is_freeform() {
        return Ok(());
    }
    if !state.aggregator().is_open(owner) {
        // Buffer lost (restart or sweep): never resume into a fresh one.
        state
            .pending()
            .clear_if(store.as_ref(), owner, |current| {
                current == &question && !state.aggregator().is_open(owner)
            })
            .await?;
        debug!(owner, chat, kind = %question.field, "pending question without a buffer; dropped");
        let hint = CommitOutcome::Interrupted.hint();
        return wizard_service::show_form(state, owner, chat, Some(&hint)).await;
    }

    match question.mode {
        InputMode::Wizard => {
            state
                .aggregator()
                .push(owner, chat, text, Some(message.message_id));
        }
        InputMode::SingleMessage => {
            match state
                .merger()
                .feed(owner, chat, text, Some(message.message_id))
            {
                MergeOutcome::Accumulating => {
                    debug!(owner, chat, "waiting for the rest of a split message");
                }
                MergeOutcome::Complete(merged) => {
                    wizard_service::commit_merged(state, owner, merged).await?;
                }
            }
        }
    }
    Ok(())
}

/// Acknowledge a button press and run the action it carries.
pub async fn handle_callback(state: &SharedState, query: CallbackQuery) -> Result<(), ServiceError> {
    let owner = query.from.id;
    let chat = query
        .message
        .as_ref()
        .map_or(owner, |message| message.chat.id);

    if let Err(err) = state.transport().answer_callback(query.id.clone(), None).await {
        warn!(owner, error = %err, "failed to acknowledge button press");
    }

    if !state.roles().is_admin(owner) {
        return Err(ServiceError::Unauthorized(format!(
            "user {owner} is not allowed to author stories"
        )));
    }

    let data = query.data.as_deref().unwrap_or_default();
    let action: CallbackAction = data
        .parse()
        .map_err(|err| ServiceError::InvalidInput(format!("{err}")))?;
    debug!(owner, chat, %action, "button pressed");

    match action {
        CallbackAction::Ask { field, index, mode } => {
            wizard_service::open_field(state, owner, chat, field, index, mode).await
        }
        CallbackAction::Done => {
            if wizard_service::finish(state, owner).await?.is_none() {
                debug!(owner, "done pressed with nothing to save");
            }
            Ok(())
        }
        CallbackAction::Cancel => wizard_service::cancel(state, owner, chat).await,
        CallbackAction::Access { target, rank } => {
            wizard_service::set_access(state, owner, chat, target, rank).await
        }
        CallbackAction::Cover => wizard_service::begin_cover_upload(state, owner, chat).await,
        CallbackAction::Publish => wizard_service::publish(state, owner, chat)
            .await
            .map(|_| ()),
        CallbackAction::Discard => match wizard_service::discard(state, owner, chat).await {
            Err(ServiceError::NotFound(_)) => {
                state
                    .transport()
                    .send_message(chat, "There is no draft to discard.".to_owned(), None)
                    .await?;
                Ok(())
            }
            other => other,
        },
        CallbackAction::ShowForm => wizard_service::show_form(state, owner, chat, None).await,
    }
}
