/// Application settings shared by every component.
///
/// Each value may come from the command line or from the environment.
#[derive(clap::Args, Clone, Debug)]
pub struct Settings {
    /// Name of the token whose balance gates uploads and listings
    #[clap(long, env)]
    pub access_token_name: String,
    /// Name of the in-game reward token
    #[clap(long, env)]
    pub reward_token_name: String,
    /// Asset whose holder list is reconciled (defaults to the access token)
    #[clap(long, env)]
    pub ledger_asset: Option<String>,
    /// Minimum raw access token quantity required to submit an upload
    #[clap(long, env, default_value_t = 1)]
    pub min_access_upload: u64,
    /// Image shown for players without access tokens
    #[clap(long, env)]
    pub no_access_image_url: String,
    /// Image shown for tokens without one of their own
    #[clap(long, env, default_value = "")]
    pub default_token_image: String,
    /// Thumbnail shown for tokens without one of their own
    #[clap(long, env, default_value = "")]
    pub default_token_thumb: String,
    /// Base URL of the stock farm images handed to new players
    #[clap(long, env, default_value = "/img/farms")]
    pub farm_image_base_url: String,
}

impl Settings {
    pub fn tracked_asset(&self) -> &str {
        self.ledger_asset
            .as_deref()
            .unwrap_or(&self.access_token_name)
    }
}

#[cfg(test)]
pub(crate) fn test_settings() -> Settings {
    Settings {
        access_token_name: "CROPS".to_owned(),
        reward_token_name: "BITCORN".to_owned(),
        ledger_asset: None,
        min_access_upload: 1,
        no_access_image_url: "https://farms.test/img/no-access.jpg".to_owned(),
        default_token_image: "https://farms.test/img/token.png".to_owned(),
        default_token_thumb: "https://farms.test/img/token-thumb.png".to_owned(),
        farm_image_base_url: "https://farms.test/img/farms".to_owned(),
    }
}
