use std::collections::{HashMap, HashSet};

use anyhow::Context;
use serde::Serialize;
use shared::balance::Balance;
use shared::orm::players::PlayerDb;
use shared::orm::tokens::TokenDb;
use shared::player::{is_pending_enrichment, HolderRecord, PlayerAddress, ProfileChanges};
use thiserror::Error;

use crate::balances;
use crate::config::Settings;
use crate::enrichment::EnrichmentTask;
use crate::farms;
use crate::signature::{SignatureVerifier, VerificationError};
use crate::store::{BalanceStore, PlayerStore, TokenStore};

pub const NO_ACCESS_NAME: &str = "NO CROPPER";

const ACRES_PER_ACCESS_TOKEN: f64 = 1.0 / 0.0000381;
const SQUARE_METERS_PER_ACRE: f64 = 4046.85642;

#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub created: Vec<PlayerAddress>,
    pub to_enrich: Vec<EnrichmentTask>,
    pub balances_updated: usize,
    pub balances_zeroed: usize,
}

/// Brings local players in line with the ledger's holder list.
///
/// Unknown addresses get a player with a placeholder profile. Every player
/// still pending enrichment yields one task, at most once per address. When
/// the tracked asset is a known token, holder quantities are written to the
/// balance ledger and former holders drop to zero.
pub fn reconcile<S>(
    store: &mut S,
    settings: &Settings,
    holders: &[HolderRecord],
) -> anyhow::Result<ReconcileReport>
where
    S: PlayerStore + TokenStore + BalanceStore + ?Sized,
{
    let asset = settings.tracked_asset();
    let tracked_token = store
        .token_by_name(asset)
        .context("Failed to look up the tracked asset")?;
    if tracked_token.is_none() {
        tracing::warn!(asset, "Tracked asset is not a known token, skipping balances");
    }

    let mut report = ReconcileReport::default();
    let mut scheduled: HashSet<PlayerAddress> = HashSet::new();
    let mut holder_ids = Vec::with_capacity(holders.len());

    for holder in holders {
        let placeholder = farms::placeholder_player(&holder.address, &settings.farm_image_base_url);
        let (player, created) = store
            .find_or_create_player(placeholder)
            .with_context(|| format!("Failed to reconcile holder {}", holder.address))?;

        if created {
            tracing::info!(address = %holder.address, name = %player.name, "Created player");
            report.created.push(holder.address.clone());
        }

        if let (Some(token), Some(quantity)) = (&tracked_token, holder.quantity) {
            store.upsert_balance(player.id, token.id, quantity)?;
            report.balances_updated += 1;
        }
        holder_ids.push(player.id);

        if is_pending_enrichment(&player) && scheduled.insert(holder.address.clone()) {
            report.to_enrich.push(EnrichmentTask::from(&player));
        }
    }

    if let Some(token) = &tracked_token {
        report.balances_zeroed = store.zero_balances_except(token.id, &holder_ids)?;
    }

    tracing::info!(
        asset,
        no_of_holders = holders.len(),
        no_of_created = report.created.len(),
        no_of_pending = report.to_enrich.len(),
        balances_updated = report.balances_updated,
        balances_zeroed = report.balances_zeroed,
        "Reconciled players with the ledger"
    );

    Ok(report)
}

pub fn display_name<'a>(player: &'a PlayerDb, access: Option<&Balance>) -> &'a str {
    if has_access(access) {
        &player.name
    } else {
        NO_ACCESS_NAME
    }
}

pub fn display_image_url<'a>(
    player: &'a PlayerDb,
    access: Option<&Balance>,
    settings: &'a Settings,
) -> &'a str {
    if has_access(access) {
        &player.image_url
    } else {
        &settings.no_access_image_url
    }
}

/// Radius in meters of a circle whose area is the acreage of the holding.
pub fn map_radius(access: Option<&Balance>) -> f64 {
    let Some(access) = access else {
        return 0.0;
    };
    let acres = access.whole_units() * ACRES_PER_ACCESS_TOKEN;
    let area = acres * SQUARE_METERS_PER_ACRE;
    (area / std::f64::consts::PI).sqrt()
}

fn has_access(access: Option<&Balance>) -> bool {
    access.is_some_and(|balance| balance.quantity > 0)
}

#[derive(Debug, Serialize)]
pub struct BalanceView {
    pub token: String,
    pub quantity: u64,
    pub display_quantity: String,
}

impl From<&Balance> for BalanceView {
    fn from(balance: &Balance) -> Self {
        Self {
            token: balance.token.name.clone(),
            quantity: balance.quantity,
            display_quantity: balance.display_quantity(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlayerView {
    pub address: String,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub image_url: String,
    pub display_image_url: String,
    pub rewards_total: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub map_radius: f64,
    pub access: Option<BalanceView>,
    pub reward: Option<BalanceView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub balances: Vec<BalanceView>,
    pub processed_at: Option<chrono::NaiveDateTime>,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

impl PlayerView {
    pub fn new(
        player: &PlayerDb,
        access: Option<&Balance>,
        reward: Option<&Balance>,
        settings: &Settings,
    ) -> Self {
        Self {
            address: player.address.clone(),
            name: player.name.clone(),
            display_name: display_name(player, access).to_owned(),
            description: player.description.clone(),
            image_url: player.image_url.clone(),
            display_image_url: display_image_url(player, access, settings).to_owned(),
            rewards_total: player.rewards_total,
            latitude: player.latitude,
            longitude: player.longitude,
            map_radius: map_radius(access),
            access: access.map(BalanceView::from),
            reward: reward.map(BalanceView::from),
            balances: Vec::new(),
            processed_at: player.processed_at,
            created_at: player.created_at,
            updated_at: player.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PlayerSort {
    /// Most access tokens
    Access,
    /// Most recently created farms
    Newest,
    /// Most recently updated farms
    Updated,
    /// Most reward tokens
    Reward,
    /// Largest cumulative harvest
    RewardsTotal,
    /// Farms whose access balance dropped to zero
    NoAccess,
}

/// Filters and orders processed players for a listing.
///
/// `NoAccess` keeps players whose access balance row holds exactly zero;
/// every other sort keeps players holding some access. Ties keep id order.
pub fn rank_players(
    mut players: Vec<PlayerDb>,
    access: &HashMap<i32, u64>,
    reward: &HashMap<i32, u64>,
    sort: PlayerSort,
) -> Vec<PlayerDb> {
    players.retain(|player| {
        let held = access.get(&player.id).copied();
        match sort {
            PlayerSort::NoAccess => held == Some(0),
            _ => held.is_some_and(|quantity| quantity > 0),
        }
    });
    players.sort_by_key(|player| player.id);

    let quantity = |map: &HashMap<i32, u64>, id: i32| map.get(&id).copied().unwrap_or(0);
    match sort {
        PlayerSort::Access => {
            players.sort_by(|a, b| quantity(access, b.id).cmp(&quantity(access, a.id)))
        }
        PlayerSort::Newest | PlayerSort::NoAccess => {
            players.sort_by(|a, b| b.created_at.cmp(&a.created_at))
        }
        PlayerSort::Updated => players.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
        PlayerSort::Reward => {
            players.sort_by(|a, b| quantity(reward, b.id).cmp(&quantity(reward, a.id)))
        }
        PlayerSort::RewardsTotal => {
            players.sort_by(|a, b| b.rewards_total.cmp(&a.rewards_total))
        }
    }
    players
}

pub fn list_players<S>(
    store: &mut S,
    settings: &Settings,
    sort: PlayerSort,
) -> anyhow::Result<Vec<PlayerView>>
where
    S: PlayerStore + TokenStore + BalanceStore + ?Sized,
{
    let players = store.processed_players()?;
    let access = store.quantities_of_token(&settings.access_token_name)?;
    let reward = store.quantities_of_token(&settings.reward_token_name)?;
    let access_token = store.token_by_name(&settings.access_token_name)?;
    let reward_token = store.token_by_name(&settings.reward_token_name)?;

    let joined = |player: &PlayerDb, quantities: &HashMap<i32, u64>, token: &Option<TokenDb>| {
        let quantity = quantities.get(&player.id).copied()?;
        token.as_ref().map(|token| Balance {
            player_id: player.id,
            token: token.clone(),
            quantity,
        })
    };

    Ok(rank_players(players, &access, &reward, sort)
        .iter()
        .map(|player| {
            let access = joined(player, &access, &access_token);
            let reward = joined(player, &reward, &reward_token);
            PlayerView::new(player, access.as_ref(), reward.as_ref(), settings)
        })
        .collect())
}

pub fn show_player<S>(
    store: &mut S,
    settings: &Settings,
    address: &str,
) -> anyhow::Result<Option<PlayerView>>
where
    S: PlayerStore + BalanceStore + ?Sized,
{
    let Some(player) = store.player_by_address(address)? else {
        return Ok(None);
    };
    let access = balances::optional(balances::access_balance(store, &player, settings))?;
    let reward = balances::optional(balances::reward_balance(store, &player, settings))?;

    let mut view = PlayerView::new(&player, access.as_ref(), reward.as_ref(), settings);
    view.balances = store
        .balances_of_player(player.id)?
        .iter()
        .map(BalanceView::from)
        .collect();
    Ok(Some(view))
}

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("Player {0} does not exist")]
    PlayerNotFound(String),
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Applies profile changes signed by the player's address key.
pub fn update_profile<S: PlayerStore + ?Sized>(
    store: &mut S,
    verifier: &SignatureVerifier,
    address: &str,
    changes: ProfileChanges,
    signature: &str,
    timestamp: &str,
) -> Result<PlayerDb, ProfileError> {
    let player = store
        .player_by_address(address)?
        .ok_or_else(|| ProfileError::PlayerNotFound(address.to_owned()))?;

    verifier.verify(&player.address, signature, timestamp)?;

    if changes.is_empty() {
        return Ok(player);
    }
    let updated = store.update_profile(player.id, changes.into())?;
    tracing::info!(address, "Updated player profile");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use shared::orm::players::PlayerInsertDb;
    use shared::token::NewToken;

    use super::*;
    use crate::config::test_settings;
    use crate::enrichment::test_helpers::RecordingSink;
    use crate::enrichment::{dispatch, enrich_player};
    use crate::memory::MemoryStore;
    use crate::signature::test_helpers::{signed_now, signing_key};
    use crate::store::now;

    fn holder(address: &str, quantity: Option<u64>) -> HolderRecord {
        HolderRecord {
            address: PlayerAddress(address.to_owned()),
            quantity,
        }
    }

    fn store_with_tokens(settings: &Settings) -> MemoryStore {
        let mut store = MemoryStore::new();
        for (name, divisible) in [
            (&settings.access_token_name, false),
            (&settings.reward_token_name, true),
        ] {
            crate::tokens::create_token(
                &mut store,
                NewToken {
                    name: name.clone(),
                    divisible,
                    ..Default::default()
                },
            )
            .unwrap();
        }
        store
    }

    fn run_pass(store: &mut MemoryStore, settings: &Settings, holders: &[HolderRecord]) -> usize {
        let sink = RecordingSink::default();
        let report = reconcile(store, settings, holders).unwrap();
        dispatch(&sink, report.to_enrich).unwrap()
    }

    #[test]
    fn new_address_creates_one_pending_player_and_one_task() {
        let settings = test_settings();
        let mut store = store_with_tokens(&settings);
        let sink = RecordingSink::default();

        let report = reconcile(&mut store, &settings, &[holder("1New", Some(3))]).unwrap();
        dispatch(&sink, report.to_enrich).unwrap();

        assert_eq!(store.players.len(), 1);
        assert!(store.players[0].processed_at.is_none());
        assert_eq!(report.created, vec![PlayerAddress("1New".to_owned())]);
        let tasks = sink.tasks.borrow();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].address.0, "1New");
    }

    #[test]
    fn duplicate_holder_entries_yield_one_task() {
        let settings = test_settings();
        let mut store = store_with_tokens(&settings);

        let report = reconcile(
            &mut store,
            &settings,
            &[holder("1Dup", Some(1)), holder("1Dup", Some(1))],
        )
        .unwrap();

        assert_eq!(store.players.len(), 1);
        assert_eq!(report.to_enrich.len(), 1);
    }

    #[test]
    fn unchanged_resubmission_creates_nothing_for_processed_players() {
        let settings = test_settings();
        let mut store = store_with_tokens(&settings);
        let holders = [holder("1A", Some(5)), holder("1B", Some(7))];

        let report = reconcile(&mut store, &settings, &holders).unwrap();
        for task in &report.to_enrich {
            enrich_player(&mut store, task).unwrap();
        }

        let again = reconcile(&mut store, &settings, &holders).unwrap();
        assert!(again.created.is_empty());
        assert!(again.to_enrich.is_empty());
        assert_eq!(store.players.len(), 2);
    }

    #[test]
    fn still_pending_players_are_rescheduled_on_the_next_pass() {
        let settings = test_settings();
        let mut store = store_with_tokens(&settings);
        let holders = [holder("1Slow", None)];

        assert_eq!(run_pass(&mut store, &settings, &holders), 1);
        assert_eq!(run_pass(&mut store, &settings, &holders), 1);
        assert_eq!(store.players.len(), 1);
    }

    #[test]
    fn holder_quantities_land_in_the_balance_ledger() {
        let settings = test_settings();
        let mut store = store_with_tokens(&settings);

        reconcile(
            &mut store,
            &settings,
            &[holder("1A", Some(5)), holder("1B", Some(7))],
        )
        .unwrap();
        let report = reconcile(&mut store, &settings, &[holder("1B", Some(9))]).unwrap();
        assert_eq!(report.balances_zeroed, 1);

        let access = store.quantities_of_token(&settings.access_token_name).unwrap();
        let a = store.player("1A").unwrap().id;
        let b = store.player("1B").unwrap().id;
        assert_eq!(access.get(&a), Some(&0));
        assert_eq!(access.get(&b), Some(&9));
    }

    #[test]
    fn unknown_tracked_asset_leaves_balances_alone() {
        let settings = test_settings();
        let mut store = MemoryStore::new();

        let report = reconcile(&mut store, &settings, &[holder("1A", Some(5))]).unwrap();
        assert_eq!(report.created.len(), 1);
        assert_eq!(report.balances_updated, 0);
        assert!(store.balances.is_empty());
    }

    #[test]
    fn display_fields_follow_access() {
        let settings = test_settings();
        let mut store = store_with_tokens(&settings);
        reconcile(
            &mut store,
            &settings,
            &[holder("1Has", Some(1)), holder("1Zero", Some(0))],
        )
        .unwrap();

        let has = show_player(&mut store, &settings, "1Has").unwrap().unwrap();
        assert_eq!(has.display_name, has.name);
        assert_eq!(has.display_image_url, has.image_url);
        assert_eq!(has.access.unwrap().display_quantity, "1");

        let zero = show_player(&mut store, &settings, "1Zero").unwrap().unwrap();
        assert_eq!(zero.display_name, NO_ACCESS_NAME);
        assert_eq!(zero.display_image_url, settings.no_access_image_url);
        assert_eq!(zero.map_radius, 0.0);
        assert!(zero.reward.is_none());

        assert!(show_player(&mut store, &settings, "1Nobody").unwrap().is_none());
    }

    #[test]
    fn map_radius_matches_acreage() {
        let settings = test_settings();
        let mut store = store_with_tokens(&settings);
        reconcile(&mut store, &settings, &[holder("1A", Some(1))]).unwrap();
        let player = store.player("1A").unwrap().clone();
        let access = balances::access_balance(&mut store, &player, &settings).unwrap();

        let expected = ((1.0 / 0.0000381) * 4046.85642 / std::f64::consts::PI).sqrt();
        assert!((map_radius(Some(&access)) - expected).abs() < 1e-6);
        assert_eq!(map_radius(None), 0.0);
    }

    fn processed(id: i32, minutes: i64, rewards_total: i64) -> PlayerDb {
        let at = now() - chrono::Duration::minutes(minutes);
        PlayerDb {
            id,
            address: format!("1P{id}"),
            name: format!("Farm {id}"),
            description: String::new(),
            image_url: String::new(),
            rewards_total,
            latitude: None,
            longitude: None,
            processed_at: Some(at),
            created_at: at,
            updated_at: now() - chrono::Duration::minutes(100 - minutes),
        }
    }

    #[test]
    fn ranking_filters_and_orders_players() {
        let players = vec![processed(1, 30, 5), processed(2, 20, 50), processed(3, 10, 0)];
        let access = HashMap::from([(1, 10), (2, 3), (3, 0)]);
        let reward = HashMap::from([(2, 100)]);

        let ids = |sort| -> Vec<i32> {
            rank_players(players.clone(), &access, &reward, sort)
                .iter()
                .map(|player| player.id)
                .collect()
        };

        assert_eq!(ids(PlayerSort::Access), vec![1, 2]);
        assert_eq!(ids(PlayerSort::Newest), vec![2, 1]);
        assert_eq!(ids(PlayerSort::Updated), vec![1, 2]);
        assert_eq!(ids(PlayerSort::Reward), vec![2, 1]);
        assert_eq!(ids(PlayerSort::RewardsTotal), vec![2, 1]);
        assert_eq!(ids(PlayerSort::NoAccess), vec![3]);
    }

    #[test]
    fn listing_only_shows_processed_players() {
        let settings = test_settings();
        let mut store = store_with_tokens(&settings);
        let report = reconcile(
            &mut store,
            &settings,
            &[holder("1Done", Some(4)), holder("1Waiting", Some(9))],
        )
        .unwrap();
        let done = report
            .to_enrich
            .iter()
            .find(|task| task.address.0 == "1Done")
            .unwrap();
        enrich_player(&mut store, done).unwrap();

        let listed = list_players(&mut store, &settings, PlayerSort::Access).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].address, "1Done");
        assert_eq!(listed[0].access.as_ref().unwrap().quantity, 4);
    }

    #[test]
    fn signed_profile_update_applies_changes() {
        let key = signing_key(3);
        let (address, signature, timestamp) = signed_now(&key);
        let mut store = MemoryStore::new();
        store
            .find_or_create_player(PlayerInsertDb {
                address: address.clone(),
                name: "Old Farm".to_owned(),
                description: "old".to_owned(),
                image_url: "1.jpg".to_owned(),
            })
            .unwrap();

        let changes = ProfileChanges {
            name: Some("Kernel Acres".to_owned()),
            latitude: Some(41.5),
            ..Default::default()
        };
        let updated = update_profile(
            &mut store,
            &SignatureVerifier::new(),
            &address,
            changes,
            &signature,
            &timestamp,
        )
        .unwrap();
        assert_eq!(updated.name, "Kernel Acres");
        assert_eq!(updated.latitude, Some(41.5));
        assert_eq!(updated.description, "old");
    }

    #[test]
    fn unsigned_profile_update_changes_nothing() {
        let key = signing_key(3);
        let (address, _, timestamp) = signed_now(&key);
        let (_, foreign_signature, _) = signed_now(&signing_key(4));
        let mut store = MemoryStore::new();
        store
            .find_or_create_player(PlayerInsertDb {
                address: address.clone(),
                name: "Old Farm".to_owned(),
                description: "old".to_owned(),
                image_url: "1.jpg".to_owned(),
            })
            .unwrap();

        let result = update_profile(
            &mut store,
            &SignatureVerifier::new(),
            &address,
            ProfileChanges {
                name: Some("Hijacked".to_owned()),
                ..Default::default()
            },
            &foreign_signature,
            &timestamp,
        );
        assert!(matches!(result, Err(ProfileError::Verification(_))));
        assert_eq!(store.player(&address).unwrap().name, "Old Farm");
    }
}
