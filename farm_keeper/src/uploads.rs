//! Moderation of player image uploads.
//!
//! A submission immediately replaces the player's live image and records the
//! previous one. Accepting keeps the new image; rejecting restores the old.
//! Both run the status check and the write under the upload's row lock.
//!
//! Writes to a player's image happen under the player's row lock, and a
//! player has at most one upload awaiting moderation. A second submission
//! waits for the first to commit and is then refused.

use anyhow::Context;
use serde::Serialize;
use shared::orm::uploads::{UploadDb, UploadInsertDb};
use shared::player::PlayerAddress;
use shared::upload::{InvalidTransition, ModerationAction, UploadStatus};
use thiserror::Error;

use crate::balances;
use crate::config::Settings;
use crate::signature::{SignatureVerifier, VerificationError};
use crate::store::{now, BalanceStore, PlayerStore, UploadStore};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Low Access Token Balance: {held} held, {required} required")]
    InsufficientAccess { held: u64, required: u64 },
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error("Player {0} does not exist")]
    PlayerNotFound(PlayerAddress),
    #[error("Upload {0} does not exist")]
    UploadNotFound(i32),
    #[error("Upload {0} is still awaiting moderation")]
    UploadPending(i32),
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct UploadSubmission {
    pub address: PlayerAddress,
    pub new_image_url: String,
    pub signature: String,
    pub timestamp: String,
}

/// Records a signed image change request and applies it to the live profile.
///
/// The access gate runs before signature verification. Nothing is written
/// unless both pass.
pub fn submit<S>(
    store: &mut S,
    settings: &Settings,
    verifier: &SignatureVerifier,
    submission: UploadSubmission,
) -> Result<UploadDb, UploadError>
where
    S: PlayerStore + BalanceStore + UploadStore + ?Sized,
{
    let UploadSubmission {
        address,
        new_image_url,
        signature,
        timestamp,
    } = submission;

    let player = store
        .lock_player_by_address(&address.0)?
        .ok_or_else(|| UploadError::PlayerNotFound(address.clone()))?;

    let held = balances::access_quantity(store, &player, settings)?;
    if held < settings.min_access_upload {
        tracing::info!(%address, held, "Upload refused for low access balance");
        return Err(UploadError::InsufficientAccess {
            held,
            required: settings.min_access_upload,
        });
    }

    verifier.verify(&player.address, &signature, &timestamp)?;

    if let Some(pending) = store.pending_upload_of_player(player.id)? {
        tracing::info!(
            %address,
            upload_id = pending.id,
            "Upload refused while another is pending"
        );
        return Err(UploadError::UploadPending(pending.id));
    }

    let upload = store.insert_upload(UploadInsertDb {
        player_id: player.id,
        new_image_url: new_image_url.clone(),
        old_image_url: player.image_url,
    })?;
    store.set_player_image(player.id, &new_image_url)?;

    tracing::info!(%address, upload_id = upload.id, "Upload submitted");
    Ok(upload)
}

pub fn accept<S>(store: &mut S, upload_id: i32) -> Result<UploadDb, UploadError>
where
    S: PlayerStore + UploadStore + ?Sized,
{
    moderate(store, upload_id, ModerationAction::Accept)
}

pub fn reject<S>(store: &mut S, upload_id: i32) -> Result<UploadDb, UploadError>
where
    S: PlayerStore + UploadStore + ?Sized,
{
    moderate(store, upload_id, ModerationAction::Reject)
}

pub fn moderate<S>(
    store: &mut S,
    upload_id: i32,
    action: ModerationAction,
) -> Result<UploadDb, UploadError>
where
    S: PlayerStore + UploadStore + ?Sized,
{
    let upload = store
        .lock_upload(upload_id)?
        .ok_or(UploadError::UploadNotFound(upload_id))?;

    let next = UploadStatus::from(upload.status)
        .apply(action)
        .map_err(|err| {
            tracing::warn!(upload_id, %action, "Refusing to moderate a resolved upload");
            err
        })?;

    let upload = store.set_upload_status(upload_id, next.into(), now())?;
    if action == ModerationAction::Reject {
        store
            .lock_player(upload.player_id)?
            .with_context(|| {
                format!("Player {} of upload {upload_id} vanished", upload.player_id)
            })?;
        store.set_player_image(upload.player_id, &upload.old_image_url)?;
    }

    tracing::info!(upload_id, %action, "Upload moderated");
    Ok(upload)
}

#[derive(Debug, Serialize)]
pub struct UploadView {
    pub id: i32,
    pub player_id: i32,
    pub status: UploadStatus,
    pub new_image_url: String,
    pub old_image_url: String,
    pub created_at: chrono::NaiveDateTime,
    pub moderated_at: Option<chrono::NaiveDateTime>,
}

impl From<UploadDb> for UploadView {
    fn from(upload: UploadDb) -> Self {
        Self {
            id: upload.id,
            player_id: upload.player_id,
            status: upload.status.into(),
            new_image_url: upload.new_image_url,
            old_image_url: upload.old_image_url,
            created_at: upload.created_at,
            moderated_at: upload.moderated_at,
        }
    }
}

/// The moderation queue, oldest first.
pub fn pending<S: UploadStore + ?Sized>(store: &mut S) -> anyhow::Result<Vec<UploadView>> {
    Ok(store
        .pending_uploads()?
        .into_iter()
        .map(UploadView::from)
        .collect())
}
