use serde::Serialize;
use shared::orm::tokens::TokenDb;
use shared::token::{self, NewToken, TokenKind};
use thiserror::Error;

use crate::config::Settings;
use crate::store::TokenStore;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token Limit Exceeded: a {0} token already exists")]
    LimitExceeded(TokenKind),
    #[error(transparent)]
    Database(#[from] diesel::result::Error),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Creates a token, refusing a second token of an already present special kind.
pub fn create_token<S: TokenStore + ?Sized>(
    store: &mut S,
    new_token: NewToken,
) -> Result<TokenDb, TokenError> {
    if let Some(kind) = new_token.kind {
        if store.token_kind_exists(kind.into())? {
            tracing::warn!(
                name = %new_token.name,
                %kind,
                "Refusing to create another special token"
            );
            return Err(TokenError::LimitExceeded(kind));
        }
    }

    let token = store.insert_token(new_token.try_into()?)?;
    tracing::info!(name = %token.name, kind = ?token.kind, "Created token");
    Ok(token)
}

#[derive(Debug, Serialize)]
pub struct TokenView {
    pub name: String,
    pub kind: Option<TokenKind>,
    pub display_name: String,
    pub display_total: String,
    pub display_image_url: String,
    pub display_thumb_url: String,
    pub explorer_url: String,
    pub issuer: Option<String>,
    pub description: Option<String>,
    pub divisible: bool,
    pub locked: bool,
}

impl TokenView {
    pub fn new(token: &TokenDb, settings: &Settings) -> Self {
        Self {
            name: token.name.clone(),
            kind: token.kind.map(TokenKind::from),
            display_name: token::display_name(token).to_owned(),
            display_total: token::display_total(token),
            display_image_url: token::display_image_url(token, &settings.default_token_image)
                .to_owned(),
            display_thumb_url: token::display_thumb_url(token, &settings.default_token_thumb)
                .to_owned(),
            explorer_url: token::explorer_url(token),
            issuer: token.issuer.clone(),
            description: token.description.clone(),
            divisible: token.divisible,
            locked: token.locked,
        }
    }
}
