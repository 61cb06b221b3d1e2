use std::fmt;
use std::str::FromStr;

use orm::tokens::{TokenDb, TokenInsertDb, TokenKindDb};
use serde::{Deserialize, Serialize};

use crate::quantity;

/// Special token roles. At most one token may exist per kind.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Reward,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Access => write!(f, "access"),
            Self::Reward => write!(f, "reward"),
        }
    }
}

impl FromStr for TokenKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(Self::Access),
            "reward" => Ok(Self::Reward),
            other => Err(anyhow::anyhow!("Unknown token kind {other:?}")),
        }
    }
}

impl From<TokenKind> for TokenKindDb {
    fn from(value: TokenKind) -> Self {
        match value {
            TokenKind::Access => Self::Access,
            TokenKind::Reward => Self::Reward,
        }
    }
}

impl From<TokenKindDb> for TokenKind {
    fn from(value: TokenKindDb) -> Self {
        match value {
            TokenKindDb::Access => Self::Access,
            TokenKindDb::Reward => Self::Reward,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewToken {
    pub name: String,
    pub kind: Option<TokenKind>,
    pub long_name: Option<String>,
    pub issuer: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub thumb_url: Option<String>,
    pub total_issued: u64,
    pub divisible: bool,
    pub locked: bool,
}

impl TryFrom<NewToken> for TokenInsertDb {
    type Error = anyhow::Error;

    fn try_from(token: NewToken) -> Result<Self, Self::Error> {
        Ok(Self {
            total_issued: i64::try_from(token.total_issued)
                .map_err(|_| anyhow::anyhow!("Total issued of {} overflows", token.name))?,
            name: token.name,
            kind: token.kind.map(TokenKindDb::from),
            long_name: token.long_name,
            issuer: token.issuer,
            description: token.description,
            image_url: token.image_url,
            thumb_url: token.thumb_url,
            divisible: token.divisible,
            locked: token.locked,
        })
    }
}

const EXPLORER_ASSET_URL: &str = "https://xchain.io/asset/";

pub fn display_name(token: &TokenDb) -> &str {
    token.long_name.as_deref().unwrap_or(&token.name)
}

pub fn display_total(token: &TokenDb) -> String {
    quantity::display_quantity(token.total_issued.max(0) as u64, token.divisible)
}

pub fn display_image_url<'a>(token: &'a TokenDb, default_image: &'a str) -> &'a str {
    token.image_url.as_deref().unwrap_or(default_image)
}

pub fn display_thumb_url<'a>(token: &'a TokenDb, default_thumb: &'a str) -> &'a str {
    token.thumb_url.as_deref().unwrap_or(default_thumb)
}

pub fn explorer_url(token: &TokenDb) -> String {
    format!("{EXPLORER_ASSET_URL}{}", token.name)
}
