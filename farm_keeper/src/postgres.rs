use std::collections::HashMap;

use anyhow::Context;
use chrono::NaiveDateTime;
use shared::balance::Balance;
use shared::orm::balances::BalanceInsertDb;
use shared::orm::players::{PlayerDb, PlayerInsertDb, PlayerProfileUpdateDb};
use shared::orm::schema;
use shared::orm::tokens::{TokenDb, TokenInsertDb, TokenKindDb};
use shared::orm::uploads::{UploadDb, UploadInsertDb, UploadStatusDb};

use crate::db;
use crate::store::{
    balance_from_rows, now, quantity_to_db, BalanceStore, PlayerStore, TokenStore, UploadStore,
};

impl PlayerStore for db::Connection {
    fn find_or_create_player(
        &mut self,
        player: PlayerInsertDb,
    ) -> anyhow::Result<(PlayerDb, bool)> {
        use diesel::prelude::*;
        use schema::players;

        let inserted = diesel::insert_into(players::table)
            .values(&player)
            .on_conflict(players::dsl::address)
            .do_nothing()
            .execute(self)
            .with_context(|| format!("Failed to insert player {}", player.address))?;

        let stored = players::table
            .filter(players::dsl::address.eq(&player.address))
            .select(PlayerDb::as_select())
            .first(self)
            .with_context(|| format!("Failed to query player {}", player.address))?;

        Ok((stored, inserted == 1))
    }

    fn player_by_address(&mut self, player_address: &str) -> anyhow::Result<Option<PlayerDb>> {
        use diesel::prelude::*;
        use schema::players::dsl::*;

        players
            .filter(address.eq(player_address))
            .select(PlayerDb::as_select())
            .first(self)
            .optional()
            .with_context(|| format!("Failed to query player {player_address}"))
    }

    fn lock_player_by_address(
        &mut self,
        player_address: &str,
    ) -> anyhow::Result<Option<PlayerDb>> {
        use diesel::prelude::*;
        use schema::players::dsl::*;

        players
            .filter(address.eq(player_address))
            .select(PlayerDb::as_select())
            .for_update()
            .first(self)
            .optional()
            .with_context(|| format!("Failed to lock player {player_address}"))
    }

    fn lock_player(&mut self, player_id: i32) -> anyhow::Result<Option<PlayerDb>> {
        use diesel::prelude::*;
        use schema::players::dsl::*;

        players
            .find(player_id)
            .select(PlayerDb::as_select())
            .for_update()
            .first(self)
            .optional()
            .with_context(|| format!("Failed to lock player {player_id}"))
    }

    fn processed_players(&mut self) -> anyhow::Result<Vec<PlayerDb>> {
        use diesel::prelude::*;
        use schema::players::dsl::*;

        players
            .filter(processed_at.is_not_null())
            .select(PlayerDb::as_select())
            .load(self)
            .context("Failed to fetch processed players from database")
    }

    fn mark_processed(&mut self, player_id: i32, at: NaiveDateTime) -> anyhow::Result<()> {
        use diesel::prelude::*;
        use schema::players::dsl::*;

        diesel::update(players.find(player_id))
            .set((processed_at.eq(Some(at)), updated_at.eq(at)))
            .execute(self)
            .with_context(|| format!("Failed to mark player {player_id} as processed"))?;
        Ok(())
    }

    fn update_profile(
        &mut self,
        player_id: i32,
        changes: PlayerProfileUpdateDb,
    ) -> anyhow::Result<PlayerDb> {
        use diesel::prelude::*;
        use schema::players::dsl::*;

        diesel::update(players.find(player_id))
            .set((&changes, updated_at.eq(now())))
            .returning(PlayerDb::as_returning())
            .get_result(self)
            .with_context(|| format!("Failed to update profile of player {player_id}"))
    }

    fn set_player_image(&mut self, player_id: i32, new_image_url: &str) -> anyhow::Result<()> {
        use diesel::prelude::*;
        use schema::players::dsl::*;

        diesel::update(players.find(player_id))
            .set((image_url.eq(new_image_url), updated_at.eq(now())))
            .execute(self)
            .with_context(|| format!("Failed to set image of player {player_id}"))?;
        Ok(())
    }
}

impl TokenStore for db::Connection {
    fn token_by_name(&mut self, token_name: &str) -> anyhow::Result<Option<TokenDb>> {
        use diesel::prelude::*;
        use schema::tokens::dsl::*;

        tokens
            .filter(name.eq(token_name))
            .select(TokenDb::as_select())
            .first(self)
            .optional()
            .with_context(|| format!("Failed to query token {token_name}"))
    }

    fn token_kind_exists(&mut self, token_kind: TokenKindDb) -> anyhow::Result<bool> {
        use diesel::dsl::exists;
        use diesel::prelude::*;
        use schema::tokens::dsl::*;

        diesel::select(exists(tokens.filter(kind.eq(token_kind))))
            .get_result::<bool>(self)
            .with_context(|| format!("Failed to check if a {token_kind} token exists"))
    }

    fn insert_token(&mut self, token: TokenInsertDb) -> anyhow::Result<TokenDb> {
        use diesel::prelude::*;
        use schema::tokens;

        diesel::insert_into(tokens::table)
            .values(&token)
            .returning(TokenDb::as_returning())
            .get_result(self)
            .with_context(|| format!("Failed to insert token {}", token.name))
    }
}

impl BalanceStore for db::Connection {
    fn balance(&mut self, player_id: i32, token_name: &str) -> anyhow::Result<Option<Balance>> {
        use diesel::prelude::*;
        use schema::{balances, tokens};

        let Some((quantity, token)) = balances::table
            .inner_join(tokens::table)
            .filter(
                balances::dsl::player_id
                    .eq(player_id)
                    .and(tokens::dsl::name.eq(token_name)),
            )
            .select((balances::dsl::quantity, TokenDb::as_select()))
            .first::<(i64, TokenDb)>(self)
            .optional()
            .with_context(|| {
                format!("Failed to query {token_name} balance of player {player_id}")
            })?
        else {
            return Ok(None);
        };

        balance_from_rows(player_id, quantity, token).map(Some)
    }

    fn balances_of_player(&mut self, player_id: i32) -> anyhow::Result<Vec<Balance>> {
        use diesel::prelude::*;
        use schema::{balances, tokens};

        balances::table
            .inner_join(tokens::table)
            .filter(balances::dsl::player_id.eq(player_id))
            .order(tokens::dsl::name.asc())
            .select((balances::dsl::quantity, TokenDb::as_select()))
            .load::<(i64, TokenDb)>(self)
            .with_context(|| format!("Failed to fetch balances of player {player_id}"))?
            .into_iter()
            .map(|(quantity, token)| balance_from_rows(player_id, quantity, token))
            .collect()
    }

    fn quantities_of_token(&mut self, token_name: &str) -> anyhow::Result<HashMap<i32, u64>> {
        use diesel::prelude::*;
        use schema::{balances, tokens};

        balances::table
            .inner_join(tokens::table)
            .filter(tokens::dsl::name.eq(token_name))
            .select((balances::dsl::player_id, balances::dsl::quantity))
            .load::<(i32, i64)>(self)
            .with_context(|| format!("Failed to fetch {token_name} balances"))?
            .into_iter()
            .map(|(player_id, quantity)| -> anyhow::Result<(i32, u64)> {
                let quantity = u64::try_from(quantity).with_context(|| {
                    format!("Negative {token_name} quantity stored for player {player_id}")
                })?;
                Ok((player_id, quantity))
            })
            .collect()
    }

    fn upsert_balance(
        &mut self,
        player_id: i32,
        token_id: i32,
        quantity: u64,
    ) -> anyhow::Result<()> {
        use diesel::prelude::*;
        use diesel::upsert::excluded;
        use schema::balances;

        diesel::insert_into(balances::table)
            .values(&BalanceInsertDb {
                player_id,
                token_id,
                quantity: quantity_to_db(quantity)?,
            })
            .on_conflict((balances::dsl::player_id, balances::dsl::token_id))
            .do_update()
            .set((
                balances::dsl::quantity.eq(excluded(balances::dsl::quantity)),
                balances::dsl::updated_at.eq(now()),
            ))
            .execute(self)
            .with_context(|| {
                format!("Failed to upsert balance of player {player_id} for token {token_id}")
            })?;
        Ok(())
    }

    fn zero_balances_except(&mut self, token: i32, holders: &[i32]) -> anyhow::Result<usize> {
        use diesel::dsl::not;
        use diesel::prelude::*;
        use schema::balances::dsl::*;

        diesel::update(
            balances.filter(
                token_id
                    .eq(token)
                    .and(quantity.ne(0_i64))
                    .and(not(player_id.eq_any(holders.to_vec()))),
            ),
        )
        .set((quantity.eq(0_i64), updated_at.eq(now())))
        .execute(self)
        .with_context(|| format!("Failed to zero balances of token {token} for former holders"))
    }
}

impl UploadStore for db::Connection {
    fn insert_upload(&mut self, upload: UploadInsertDb) -> anyhow::Result<UploadDb> {
        use diesel::prelude::*;
        use schema::uploads;

        diesel::insert_into(uploads::table)
            .values(&upload)
            .returning(UploadDb::as_returning())
            .get_result(self)
            .with_context(|| format!("Failed to insert upload for player {}", upload.player_id))
    }

    fn lock_upload(&mut self, upload_id: i32) -> anyhow::Result<Option<UploadDb>> {
        use diesel::prelude::*;
        use schema::uploads::dsl::*;

        uploads
            .find(upload_id)
            .select(UploadDb::as_select())
            .for_update()
            .first(self)
            .optional()
            .with_context(|| format!("Failed to lock upload {upload_id}"))
    }

    fn set_upload_status(
        &mut self,
        upload_id: i32,
        new_status: UploadStatusDb,
        at: NaiveDateTime,
    ) -> anyhow::Result<UploadDb> {
        use diesel::prelude::*;
        use schema::uploads::dsl::*;

        diesel::update(uploads.find(upload_id))
            .set((status.eq(new_status), moderated_at.eq(Some(at))))
            .returning(UploadDb::as_returning())
            .get_result(self)
            .with_context(|| format!("Failed to set status of upload {upload_id} to {new_status}"))
    }

    fn pending_uploads(&mut self) -> anyhow::Result<Vec<UploadDb>> {
        use diesel::prelude::*;
        use schema::uploads::dsl::*;

        uploads
            .filter(status.eq(UploadStatusDb::Pending))
            .order((created_at.asc(), id.asc()))
            .select(UploadDb::as_select())
            .load(self)
            .context("Failed to fetch pending uploads from database")
    }

    fn pending_upload_of_player(&mut self, player: i32) -> anyhow::Result<Option<UploadDb>> {
        use diesel::prelude::*;
        use schema::uploads::dsl::*;

        uploads
            .filter(player_id.eq(player).and(status.eq(UploadStatusDb::Pending)))
            .select(UploadDb::as_select())
            .first(self)
            .optional()
            .with_context(|| format!("Failed to query pending upload of player {player}"))
    }
}
