use std::sync::Arc;
use anyhow::{Context, Result};
use chrono::TimeDelta;

use crate::banlist::BanlistService;
use crate::config::Config;
use crate::rulesets::RulesetDocument;
use crate::smogon::{HttpSource, ResponseCache, SmogonClient};

pub mod routes;
pub mod handlers;

pub async fn start(config: Arc<Config>) -> Result<()> {
    let state = State::new(Arc::clone(&config)).await?;

    tracing::info!(
        "Serving formats [{}] at {}",
        state.banlist.formats().join(", "),
        config.web.host
    );
    warp::serve(routes::router(state)).run(config.web.host).await;
    Ok(())
}

pub struct State {
    pub banlist: BanlistService,
}

impl State {
    pub async fn new(config: Arc<Config>) -> Result<Arc<Self>> {
        let rulesets = RulesetDocument::load(&config.rulesets.path)
            .await
            .context("could not load custom rulesets")?;

        anyhow::ensure!(
            config.smogon.cache_hours > 0,
            "smogon.cache_hours must be positive"
        );
        let ttl = TimeDelta::try_hours(config.smogon.cache_hours)
            .context("smogon.cache_hours is out of range")?;

        let smogon = SmogonClient::new(
            config.smogon.base_url.clone(),
            Arc::new(HttpSource::new()),
            ResponseCache::new(ttl),
        );

        Ok(Self::with_service(BanlistService::new(Arc::new(rulesets), smogon)))
    }

    pub fn with_service(banlist: BanlistService) -> Arc<Self> {
        Arc::new(Self { banlist })
    }
}
