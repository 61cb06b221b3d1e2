//! In-memory store mirroring the Postgres constraints, for tests.

use std::collections::HashMap;

use anyhow::{anyhow, bail};
use chrono::NaiveDateTime;
use shared::balance::Balance;
use shared::orm::balances::BalanceDb;
use shared::orm::players::{PlayerDb, PlayerInsertDb, PlayerProfileUpdateDb};
use shared::orm::tokens::{TokenDb, TokenInsertDb, TokenKindDb};
use shared::orm::uploads::{UploadDb, UploadInsertDb, UploadStatusDb};

use crate::store::{
    balance_from_rows, now, quantity_to_db, BalanceStore, PlayerStore, TokenStore, UploadStore,
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    pub players: Vec<PlayerDb>,
    pub tokens: Vec<TokenDb>,
    pub balances: Vec<BalanceDb>,
    pub uploads: Vec<UploadDb>,
    /// Player ids in the order their rows were locked.
    pub player_locks: Vec<i32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn player_mut(&mut self, player_id: i32) -> anyhow::Result<&mut PlayerDb> {
        self.players
            .iter_mut()
            .find(|player| player.id == player_id)
            .ok_or_else(|| anyhow!("Player {player_id} does not exist"))
    }

    fn token(&self, token_id: i32) -> anyhow::Result<&TokenDb> {
        self.tokens
            .iter()
            .find(|token| token.id == token_id)
            .ok_or_else(|| anyhow!("Token {token_id} does not exist"))
    }

    pub fn player(&self, address: &str) -> Option<&PlayerDb> {
        self.players.iter().find(|player| player.address == address)
    }

    pub fn upload(&self, upload_id: i32) -> Option<&UploadDb> {
        self.uploads.iter().find(|upload| upload.id == upload_id)
    }
}

fn next_id(len: usize) -> i32 {
    len as i32 + 1
}

impl PlayerStore for MemoryStore {
    fn find_or_create_player(
        &mut self,
        player: PlayerInsertDb,
    ) -> anyhow::Result<(PlayerDb, bool)> {
        if let Some(existing) = self.player(&player.address) {
            return Ok((existing.clone(), false));
        }
        let at = now();
        let created = PlayerDb {
            id: next_id(self.players.len()),
            address: player.address,
            name: player.name,
            description: player.description,
            image_url: player.image_url,
            rewards_total: 0,
            latitude: None,
            longitude: None,
            processed_at: None,
            created_at: at,
            updated_at: at,
        };
        self.players.push(created.clone());
        Ok((created, true))
    }

    fn player_by_address(&mut self, address: &str) -> anyhow::Result<Option<PlayerDb>> {
        Ok(self.player(address).cloned())
    }

    fn lock_player_by_address(&mut self, address: &str) -> anyhow::Result<Option<PlayerDb>> {
        let player = self.player(address).cloned();
        if let Some(player) = &player {
            self.player_locks.push(player.id);
        }
        Ok(player)
    }

    fn lock_player(&mut self, player_id: i32) -> anyhow::Result<Option<PlayerDb>> {
        let player = self.players.iter().find(|player| player.id == player_id).cloned();
        if player.is_some() {
            self.player_locks.push(player_id);
        }
        Ok(player)
    }

    fn processed_players(&mut self) -> anyhow::Result<Vec<PlayerDb>> {
        Ok(self
            .players
            .iter()
            .filter(|player| player.processed_at.is_some())
            .cloned()
            .collect())
    }

    fn mark_processed(&mut self, player_id: i32, at: NaiveDateTime) -> anyhow::Result<()> {
        let player = self.player_mut(player_id)?;
        player.processed_at = Some(at);
        player.updated_at = at;
        Ok(())
    }

    fn update_profile(
        &mut self,
        player_id: i32,
        changes: PlayerProfileUpdateDb,
    ) -> anyhow::Result<PlayerDb> {
        let player = self.player_mut(player_id)?;
        if let Some(name) = changes.name {
            player.name = name;
        }
        if let Some(description) = changes.description {
            player.description = description;
        }
        if changes.latitude.is_some() {
            player.latitude = changes.latitude;
        }
        if changes.longitude.is_some() {
            player.longitude = changes.longitude;
        }
        player.updated_at = now();
        Ok(player.clone())
    }

    fn set_player_image(&mut self, player_id: i32, image_url: &str) -> anyhow::Result<()> {
        let player = self.player_mut(player_id)?;
        player.image_url = image_url.to_owned();
        player.updated_at = now();
        Ok(())
    }
}

impl TokenStore for MemoryStore {
    fn token_by_name(&mut self, name: &str) -> anyhow::Result<Option<TokenDb>> {
        Ok(self.tokens.iter().find(|token| token.name == name).cloned())
    }

    fn token_kind_exists(&mut self, kind: TokenKindDb) -> anyhow::Result<bool> {
        Ok(self.tokens.iter().any(|token| token.kind == Some(kind)))
    }

    fn insert_token(&mut self, token: TokenInsertDb) -> anyhow::Result<TokenDb> {
        if self.tokens.iter().any(|stored| stored.name == token.name) {
            bail!("duplicate key value violates unique constraint \"tokens_name_key\"");
        }
        if token.kind.is_some() && self.tokens.iter().any(|stored| stored.kind == token.kind) {
            bail!("duplicate key value violates unique constraint \"tokens_special_kind\"");
        }
        let created = TokenDb {
            id: next_id(self.tokens.len()),
            name: token.name,
            kind: token.kind,
            long_name: token.long_name,
            issuer: token.issuer,
            description: token.description,
            image_url: token.image_url,
            thumb_url: token.thumb_url,
            total_issued: token.total_issued,
            divisible: token.divisible,
            locked: token.locked,
            created_at: now(),
        };
        self.tokens.push(created.clone());
        Ok(created)
    }
}

impl BalanceStore for MemoryStore {
    fn balance(&mut self, player_id: i32, token_name: &str) -> anyhow::Result<Option<Balance>> {
        let Some(token) = self.tokens.iter().find(|token| token.name == token_name) else {
            return Ok(None);
        };
        let Some(row) = self
            .balances
            .iter()
            .find(|row| row.player_id == player_id && row.token_id == token.id)
        else {
            return Ok(None);
        };
        balance_from_rows(player_id, row.quantity, token.clone()).map(Some)
    }

    fn balances_of_player(&mut self, player_id: i32) -> anyhow::Result<Vec<Balance>> {
        let mut balances = self
            .balances
            .iter()
            .filter(|row| row.player_id == player_id)
            .map(|row| balance_from_rows(player_id, row.quantity, self.token(row.token_id)?.clone()))
            .collect::<anyhow::Result<Vec<_>>>()?;
        balances.sort_by(|a, b| a.token.name.cmp(&b.token.name));
        Ok(balances)
    }

    fn quantities_of_token(&mut self, token_name: &str) -> anyhow::Result<HashMap<i32, u64>> {
        let Some(token) = self.tokens.iter().find(|token| token.name == token_name) else {
            return Ok(HashMap::new());
        };
        self.balances
            .iter()
            .filter(|row| row.token_id == token.id)
            .map(|row| -> anyhow::Result<(i32, u64)> {
                Ok((row.player_id, u64::try_from(row.quantity)?))
            })
            .collect()
    }

    fn upsert_balance(
        &mut self,
        player_id: i32,
        token_id: i32,
        quantity: u64,
    ) -> anyhow::Result<()> {
        let quantity = quantity_to_db(quantity)?;
        let at = now();
        match self
            .balances
            .iter_mut()
            .find(|row| row.player_id == player_id && row.token_id == token_id)
        {
            Some(row) => {
                row.quantity = quantity;
                row.updated_at = at;
            }
            None => {
                let id = next_id(self.balances.len());
                self.balances.push(BalanceDb {
                    id,
                    player_id,
                    token_id,
                    quantity,
                    created_at: at,
                    updated_at: at,
                });
            }
        }
        Ok(())
    }

    fn zero_balances_except(&mut self, token_id: i32, holders: &[i32]) -> anyhow::Result<usize> {
        let at = now();
        let mut changed = 0;
        for row in self.balances.iter_mut().filter(|row| {
            row.token_id == token_id && row.quantity != 0 && !holders.contains(&row.player_id)
        }) {
            row.quantity = 0;
            row.updated_at = at;
            changed += 1;
        }
        Ok(changed)
    }
}

impl UploadStore for MemoryStore {
    fn insert_upload(&mut self, upload: UploadInsertDb) -> anyhow::Result<UploadDb> {
        self.player_mut(upload.player_id)?;
        if self.pending_upload_of_player(upload.player_id)?.is_some() {
            bail!("duplicate key value violates unique constraint \"uploads_one_pending\"");
        }
        let created = UploadDb {
            id: next_id(self.uploads.len()),
            player_id: upload.player_id,
            new_image_url: upload.new_image_url,
            old_image_url: upload.old_image_url,
            status: UploadStatusDb::Pending,
            created_at: now(),
            moderated_at: None,
        };
        self.uploads.push(created.clone());
        Ok(created)
    }

    fn lock_upload(&mut self, upload_id: i32) -> anyhow::Result<Option<UploadDb>> {
        Ok(self.upload(upload_id).cloned())
    }

    fn set_upload_status(
        &mut self,
        upload_id: i32,
        status: UploadStatusDb,
        at: NaiveDateTime,
    ) -> anyhow::Result<UploadDb> {
        let upload = self
            .uploads
            .iter_mut()
            .find(|upload| upload.id == upload_id)
            .ok_or_else(|| anyhow!("Upload {upload_id} does not exist"))?;
        upload.status = status;
        upload.moderated_at = Some(at);
        Ok(upload.clone())
    }

    fn pending_uploads(&mut self) -> anyhow::Result<Vec<UploadDb>> {
        Ok(self
            .uploads
            .iter()
            .filter(|upload| upload.status == UploadStatusDb::Pending)
            .cloned()
            .collect())
    }

    fn pending_upload_of_player(&mut self, player_id: i32) -> anyhow::Result<Option<UploadDb>> {
        Ok(self
            .uploads
            .iter()
            .find(|upload| {
                upload.player_id == player_id && upload.status == UploadStatusDb::Pending
            })
            .cloned())
    }
}
