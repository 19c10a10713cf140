use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use anistream_core::clock::SystemClock;
use anistream_core::config::Config;
use anistream_core::extractor::{
    BerkasdriveExtractor, BloggerExtractor, DirectLinkExtractor, ExtractorRegistry,
    FiledonExtractor, Mp4uploadExtractor, PackedScriptExtractor, VaultClient, VaultExtractor,
    WibufileExtractor,
};
use anistream_core::logging;
use anistream_core::matcher::{IdentityResolver, ListingMemo};
use anistream_core::service::{DetailService, StreamingService};
use anistream_core::store::{MemoryCacheStore, MemorySlugMappingStore, MemoryStorageLedger};
use anistream_core::traits::{
    CacheStore, NullCatalogClient, NullDispatcher, ScraperAdapter, SlugMappingStore, StorageLedger,
};
use anistream_api::http::{self, AppState};
use anistream_proxy::UpstreamPolicy;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}");
        eprintln!("Using default configuration");
        Config::default()
    });

    // Initialize logging
    logging::init_logging(&config.logging)?;

    info!("anistream server starting...");
    info!("HTTP address: {}", config.http_address());

    let state = build_state(&config, Vec::new());

    let listener = tokio::net::TcpListener::bind(config.http_address()).await?;
    info!("Listening on {}", config.http_address());

    axum::serve(listener, http::create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Wire the full pipeline from configuration. Scraper adapters and the
/// catalog client are injected by the deployment; an empty adapter list
/// still serves the proxy and delivery routes.
fn build_state(config: &Config, adapters: Vec<Arc<dyn ScraperAdapter>>) -> AppState {
    let upstream_timeout = Duration::from_secs(config.proxy.upstream_timeout_secs);

    let cache: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());
    let mappings: Arc<dyn SlugMappingStore> = Arc::new(MemorySlugMappingStore::new());
    let ledger: Arc<dyn StorageLedger> = Arc::new(MemoryStorageLedger::new());

    let vault = (!config.providers.vault_host.is_empty()
        && !config.providers.vault_api_url.is_empty())
    .then(|| {
        Arc::new(VaultClient::new(
            config.providers.vault_api_url.clone(),
            config.providers.vault_host.clone(),
            upstream_timeout,
        ))
    });

    let mut registry = ExtractorRegistry::new(
        Arc::clone(&cache),
        Duration::from_secs(config.cache.resolved_url_ttl_secs),
    );
    registry.register(Arc::new(BloggerExtractor::new(upstream_timeout)));
    registry.register(Arc::new(WibufileExtractor::new(upstream_timeout)));
    registry.register(Arc::new(FiledonExtractor::new(upstream_timeout)));
    registry.register(Arc::new(BerkasdriveExtractor::new(upstream_timeout)));
    registry.register(Arc::new(Mp4uploadExtractor::new(upstream_timeout)));
    registry.register(Arc::new(PackedScriptExtractor::new(upstream_timeout)));
    if let Some(vault) = &vault {
        registry.register(Arc::new(VaultExtractor::new(Arc::clone(vault))));
    }
    registry.register(Arc::new(DirectLinkExtractor));
    let registry = Arc::new(registry);

    let listing_memo = Arc::new(ListingMemo::new(
        Arc::new(SystemClock),
        Duration::from_secs(config.cache.listing_memo_ttl_secs),
    ));
    let resolver = Arc::new(IdentityResolver::new(
        adapters.clone(),
        Arc::clone(&mappings),
        listing_memo,
    ));

    let streaming_service = Arc::new(StreamingService::new(
        adapters.clone(),
        Arc::clone(&mappings),
        Arc::clone(&cache),
        Arc::clone(&registry),
        ledger,
        Arc::new(NullDispatcher),
        config.providers.deny_list.clone(),
        (!config.providers.vault_host.is_empty()).then(|| config.providers.vault_host.clone()),
        Duration::from_secs(config.cache.streaming_ttl_secs),
        Duration::from_secs(config.cache.delivery_code_ttl_secs),
        config.server.public_base_url.clone(),
    ));

    let detail_service = Arc::new(DetailService::new(
        Arc::new(NullCatalogClient),
        adapters,
        mappings,
        resolver,
    ));

    let upstream_policy = Arc::new(UpstreamPolicy {
        allowed_host_suffixes: config.proxy.allowed_host_suffixes.clone(),
        user_agent_hostile_hosts: config.proxy.user_agent_hostile_hosts.clone(),
        referer_rules: config
            .proxy
            .referer_rules
            .iter()
            .map(|r| (r.host_contains.clone(), r.referer.clone()))
            .collect(),
        timeout: upstream_timeout,
    });

    AppState {
        detail_service,
        streaming_service,
        upstream_policy,
        vault,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
