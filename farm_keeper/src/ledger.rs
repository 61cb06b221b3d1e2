//! Ledger client adapter.
//!
//! Talks JSON-RPC 2.0 to a Counterparty node to list the holders of an asset.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use shared::player::{HolderRecord, PlayerAddress};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// Source of truth for token ownership.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Current holders of `asset`, in the order the ledger reports them.
    async fn get_holders(&self, asset: &str) -> Result<Vec<HolderRecord>, LedgerError>;
}

#[derive(clap::Args, Clone, Debug)]
pub struct LedgerArgs {
    /// URL of the Counterparty JSON-RPC endpoint
    #[clap(long, env)]
    pub ledger_url: String,
    /// Counterparty RPC user
    #[clap(long, env)]
    pub ledger_user: String,
    /// Counterparty RPC password
    #[clap(long, env)]
    pub ledger_password: String,
    /// Timeout of a single ledger request
    #[clap(long, env, default_value = "30s", value_parser = crate::parse_dur)]
    pub ledger_timeout: Duration,
}

pub struct CounterpartyClient {
    client: reqwest::Client,
    url: String,
    auth_header: String,
    request_id: AtomicU64,
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Serialize)]
struct HoldersParams<'a> {
    asset: &'a str,
}

#[derive(Debug, Deserialize)]
struct Holder {
    address: String,
    #[serde(default, alias = "quantity")]
    address_quantity: Option<u64>,
}

impl CounterpartyClient {
    pub fn new(args: LedgerArgs) -> anyhow::Result<Self> {
        use anyhow::Context;

        let client = reqwest::Client::builder()
            .timeout(args.ledger_timeout)
            .build()
            .context("Failed to build ledger HTTP client")?;
        let credentials = format!("{}:{}", args.ledger_user, args.ledger_password);
        let auth_header = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(credentials)
        );

        Ok(Self {
            client,
            url: args.ledger_url,
            auth_header,
            request_id: AtomicU64::new(0),
        })
    }

    async fn call<P, T>(&self, method: &str, params: P) -> Result<T, LedgerError>
    where
        P: Serialize + Send,
        T: for<'de> Deserialize<'de>,
    {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        tracing::debug!(method, id, url = %self.url, "Ledger RPC call");

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", &self.auth_header)
            .json(&request)
            .send()
            .await
            .map_err(|err| LedgerError::Unavailable(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::Unavailable(format!("HTTP {status} - {body}")));
        }

        let rpc_response: RpcResponse<T> = response
            .json()
            .await
            .map_err(|err| LedgerError::Unavailable(err.to_string()))?;

        if let Some(RpcError { code, message }) = rpc_response.error {
            return Err(LedgerError::Unavailable(format!(
                "RPC error {code}: {message}"
            )));
        }

        rpc_response
            .result
            .ok_or_else(|| LedgerError::Unavailable(format!("Empty response to {method}")))
    }
}

#[async_trait]
impl LedgerClient for CounterpartyClient {
    async fn get_holders(&self, asset: &str) -> Result<Vec<HolderRecord>, LedgerError> {
        let holders: Vec<Holder> = self
            .call("get_holders", HoldersParams { asset })
            .await?;
        tracing::debug!(asset, no_of_entries = holders.len(), "Fetched asset holders");
        Ok(merge_holders(holders))
    }
}

/// Collapses repeated addresses (escrowed and free amounts are reported as
/// separate entries) into one record, keeping first-seen order.
fn merge_holders(holders: Vec<Holder>) -> Vec<HolderRecord> {
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut records: Vec<HolderRecord> = Vec::with_capacity(holders.len());

    for Holder {
        address,
        address_quantity,
    } in holders
    {
        match position.get(&address) {
            Some(&index) => {
                let record = &mut records[index];
                record.quantity = match (record.quantity, address_quantity) {
                    (Some(held), Some(more)) => Some(held.saturating_add(more)),
                    (held, more) => held.or(more),
                };
            }
            None => {
                position.insert(address.clone(), records.len());
                records.push(HolderRecord {
                    address: PlayerAddress(address),
                    quantity: address_quantity,
                });
            }
        }
    }

    records
}
