use shared::balance::Balance;
use shared::orm::players::PlayerDb;
use thiserror::Error;

use crate::config::Settings;
use crate::store::BalanceStore;

#[derive(Debug, Error)]
pub enum BalanceError {
    /// No row exists for the pair; distinct from a row holding zero.
    #[error("No {token} balance record found for player {player}")]
    NotFound { player: String, token: String },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// The balance of `player` in the token named `token_name`.
pub fn get_balance<S: BalanceStore + ?Sized>(
    store: &mut S,
    player: &PlayerDb,
    token_name: &str,
) -> Result<Balance, BalanceError> {
    store
        .balance(player.id, token_name)?
        .ok_or_else(|| BalanceError::NotFound {
            player: player.address.clone(),
            token: token_name.to_owned(),
        })
}

pub fn access_balance<S: BalanceStore + ?Sized>(
    store: &mut S,
    player: &PlayerDb,
    settings: &Settings,
) -> Result<Balance, BalanceError> {
    get_balance(store, player, &settings.access_token_name)
}

pub fn reward_balance<S: BalanceStore + ?Sized>(
    store: &mut S,
    player: &PlayerDb,
    settings: &Settings,
) -> Result<Balance, BalanceError> {
    get_balance(store, player, &settings.reward_token_name)
}

/// Turns a missing balance into `None`, leaving other failures as errors.
pub fn optional(result: Result<Balance, BalanceError>) -> anyhow::Result<Option<Balance>> {
    match result {
        Ok(balance) => Ok(Some(balance)),
        Err(BalanceError::NotFound { .. }) => Ok(None),
        Err(BalanceError::Store(err)) => Err(err),
    }
}

/// Raw access quantity for gating. A missing balance grants no access.
pub fn access_quantity<S: BalanceStore + ?Sized>(
    store: &mut S,
    player: &PlayerDb,
    settings: &Settings,
) -> anyhow::Result<u64> {
    Ok(optional(access_balance(store, player, settings))?
        .map(|balance| balance.quantity)
        .unwrap_or(0))
}
