//! Storage operations used by the reconciler, the balance accessors and the
//! moderation workflow.
//!
//! Every operation works on whatever connection it is handed. Callers that
//! need several operations to land together run them inside one transaction
//! (see [`crate::db::Pool::transaction`]).

use std::collections::HashMap;

use chrono::NaiveDateTime;
use shared::balance::Balance;
use shared::orm::players::{PlayerDb, PlayerInsertDb, PlayerProfileUpdateDb};
use shared::orm::tokens::{TokenDb, TokenInsertDb, TokenKindDb};
use shared::orm::uploads::{UploadDb, UploadInsertDb, UploadStatusDb};

pub trait PlayerStore {
    /// Inserts `player` unless its address is already known. Returns the
    /// stored row and whether it was created by this call.
    fn find_or_create_player(&mut self, player: PlayerInsertDb)
        -> anyhow::Result<(PlayerDb, bool)>;

    fn player_by_address(&mut self, address: &str) -> anyhow::Result<Option<PlayerDb>>;

    /// Like [`PlayerStore::player_by_address`], holding a row lock until the
    /// enclosing transaction ends.
    fn lock_player_by_address(&mut self, address: &str) -> anyhow::Result<Option<PlayerDb>>;

    fn lock_player(&mut self, player_id: i32) -> anyhow::Result<Option<PlayerDb>>;

    fn processed_players(&mut self) -> anyhow::Result<Vec<PlayerDb>>;

    fn mark_processed(&mut self, player_id: i32, at: NaiveDateTime) -> anyhow::Result<()>;

    fn update_profile(
        &mut self,
        player_id: i32,
        changes: PlayerProfileUpdateDb,
    ) -> anyhow::Result<PlayerDb>;

    fn set_player_image(&mut self, player_id: i32, image_url: &str) -> anyhow::Result<()>;
}

pub trait TokenStore {
    fn token_by_name(&mut self, name: &str) -> anyhow::Result<Option<TokenDb>>;

    fn token_kind_exists(&mut self, kind: TokenKindDb) -> anyhow::Result<bool>;

    fn insert_token(&mut self, token: TokenInsertDb) -> anyhow::Result<TokenDb>;
}

pub trait BalanceStore {
    /// The balance row of `player_id` for the token named `token_name`.
    fn balance(&mut self, player_id: i32, token_name: &str) -> anyhow::Result<Option<Balance>>;

    fn balances_of_player(&mut self, player_id: i32) -> anyhow::Result<Vec<Balance>>;

    /// Raw quantities of the token named `token_name`, keyed by player id.
    fn quantities_of_token(&mut self, token_name: &str) -> anyhow::Result<HashMap<i32, u64>>;

    fn upsert_balance(&mut self, player_id: i32, token_id: i32, quantity: u64)
        -> anyhow::Result<()>;

    /// Sets every non-zero balance of `token_id` to zero, except those owned
    /// by `holders`. Returns the number of rows changed.
    fn zero_balances_except(&mut self, token_id: i32, holders: &[i32]) -> anyhow::Result<usize>;
}

pub trait UploadStore {
    fn insert_upload(&mut self, upload: UploadInsertDb) -> anyhow::Result<UploadDb>;

    /// Reads an upload, holding a row lock until the enclosing transaction ends.
    fn lock_upload(&mut self, upload_id: i32) -> anyhow::Result<Option<UploadDb>>;

    fn set_upload_status(
        &mut self,
        upload_id: i32,
        status: UploadStatusDb,
        at: NaiveDateTime,
    ) -> anyhow::Result<UploadDb>;

    fn pending_uploads(&mut self) -> anyhow::Result<Vec<UploadDb>>;

    fn pending_upload_of_player(&mut self, player_id: i32) -> anyhow::Result<Option<UploadDb>>;
}

pub(crate) fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

pub(crate) fn balance_from_rows(
    player_id: i32,
    quantity: i64,
    token: TokenDb,
) -> anyhow::Result<Balance> {
    let quantity = u64::try_from(quantity).map_err(|_| {
        anyhow::anyhow!(
            "Negative quantity {quantity} stored for player {player_id} and token {}",
            token.name
        )
    })?;
    Ok(Balance {
        player_id,
        token,
        quantity,
    })
}

pub(crate) fn quantity_to_db(quantity: u64) -> anyhow::Result<i64> {
    i64::try_from(quantity)
        .map_err(|_| anyhow::anyhow!("Quantity {quantity} does not fit in the database"))
}
