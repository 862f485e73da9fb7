//! Legalizes finalized input into the owner's draft.
//!
//! A value is written only after it validates against the field it was collected for
//! and against the question that is still pending. Nothing in here surfaces validation
//! or consistency problems as errors; they come back as a [`CommitOutcome`].

use std::time::SystemTime;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::{
    dao::models::{AccessRank, ChatId, DraftEntity, FieldKind, MessageId, OwnerId},
    dto::{
        callback::AccessTarget,
        validation::{describe, validate_field},
    },
    error::ServiceError,
    services::{form::field_label, transport::Transport},
    state::{
        SharedState,
        aggregator::{BufferKind, FinalizedInput},
    },
};

/// What happened to a finalized input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Value written to the draft; the pending question is closed.
    Saved {
        /// Field written.
        field: FieldKind,
        /// Ending slot for ending fields.
        index: Option<usize>,
    },
    /// Value failed validation; the question stays open with a fresh, empty buffer.
    Rejected {
        /// Field the value was meant for.
        field: FieldKind,
        /// Rule that failed, phrased for the admin.
        reason: String,
    },
    /// Input could not be matched to a pending question; nothing was written.
    Interrupted,
}

impl CommitOutcome {
    /// Hint appended to the re-rendered authoring form.
    pub fn hint(&self) -> String {
        match self {
            CommitOutcome::Saved { field, index } => {
                format!("Saved the {}.", field_label(*field, *index))
            }
            CommitOutcome::Rejected { field, reason } => format!(
                "The {} was not saved. {reason} Please send it again from the beginning.",
                field_label(*field, None)
            ),
            CommitOutcome::Interrupted => "Input was interrupted, nothing was saved.".to_owned(),
        }
    }
}

/// Validate `input` against the owner's pending question and write it to the draft.
///
/// Storage failures propagate. Raw input messages are deleted only after a successful
/// write, and deletion failures are logged and ignored.
pub async fn commit(
    state: &SharedState,
    owner: OwnerId,
    input: FinalizedInput,
) -> Result<CommitOutcome, ServiceError> {
    let store = state.require_draft_store().await?;
    let pending = state.pending().get(store.as_ref(), owner).await?;

    let field = match input.kind {
        BufferKind::Field(field) => field,
        BufferKind::Unknown => {
            warn!(
                owner,
                fragments = input.message_ids.len(),
                "finalized a buffer of unknown kind; discarding input"
            );
            if let Some(question) = &pending {
                state
                    .pending()
                    .clear_if_current(store.as_ref(), question)
                    .await?;
            }
            return Ok(CommitOutcome::Interrupted);
        }
    };

    let Some(question) = pending else {
        warn!(owner, kind = %field, "finalized a buffer without a pending question");
        return Ok(CommitOutcome::Interrupted);
    };

    if question.field != field || question.field.targets_ending() != question.index.is_some() {
        warn!(
            owner,
            buffer_kind = %field,
            pending_kind = %question.field,
            index = ?question.index,
            "pending question does not match finalized buffer"
        );
        state
            .pending()
            .clear_if_current(store.as_ref(), &question)
            .await?;
        return Ok(CommitOutcome::Interrupted);
    }

    let value = match validate_field(field, &input.text) {
        Ok(value) => value,
        Err(err) => {
            let reason = describe(&err);
            debug!(owner, kind = %field, code = %err.code, "input rejected");
            if !state.aggregator().is_open(owner) {
                state.aggregator().start(owner, input.chat, field);
            }
            return Ok(CommitOutcome::Rejected { field, reason });
        }
    };

    let mut draft = store.find_or_create_draft(owner).await?;
    apply_field(&mut draft, field, question.index, value);
    draft.updated_at = SystemTime::now();
    store.save_draft(draft).await?;
    state
        .pending()
        .clear_if_current(store.as_ref(), &question)
        .await?;

    delete_fragments(state.transport(), input.chat, &input.message_ids).await;
    debug!(owner, kind = %field, index = ?question.index, "field committed");

    Ok(CommitOutcome::Saved {
        field,
        index: question.index,
    })
}

/// Write an already validated text value into `draft`.
pub fn apply_field(draft: &mut DraftEntity, field: FieldKind, index: Option<usize>, value: String) {
    match (field, index) {
        (FieldKind::Title, _) => draft.title = Some(value),
        (FieldKind::Intro, _) => draft.intro = Some(value),
        (FieldKind::EndingTitle, Some(index)) => draft.ending_mut(index).title = Some(value),
        (FieldKind::EndingText, Some(index)) => draft.ending_mut(index).text = Some(value),
        (field, index) => {
            warn!(kind = %field, ?index, "field cannot be set from text; ignoring");
        }
    }
}

/// Set the access rank of the story or of one ending, creating the ending slot if needed.
pub async fn apply_access(
    state: &SharedState,
    owner: OwnerId,
    target: AccessTarget,
    rank: AccessRank,
) -> Result<(), ServiceError> {
    let store = state.require_draft_store().await?;
    let mut draft = store.find_or_create_draft(owner).await?;
    match target {
        AccessTarget::Story => draft.min_rank = rank,
        AccessTarget::Ending(index) => draft.ending_mut(index).min_rank = rank,
    }
    draft.updated_at = SystemTime::now();
    store.save_draft(draft).await?;
    Ok(())
}

/// Delete raw input messages, ignoring individual failures.
pub async fn delete_fragments(transport: &dyn Transport, chat: ChatId, messages: &[MessageId]) {
    let results = join_all(
        messages
            .iter()
            .map(|message| transport.delete_message(chat, *message)),
    )
    .await;

    for (message, result) in messages.iter().zip(results) {
        if let Err(err) = result {
            warn!(chat, message, error = %err, "failed to delete input message");
        }
    }
}
