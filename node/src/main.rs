// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::Arc;

use telemq_core::SharedStore;
use telemq_kv::FileStore;
use telemq_node::agent::Agent;
use telemq_node::config::NodeConfig;
use telemq_node::errors::NodeError;
use telemq_node::server::build_router;
use telemq_node::telemetry::init_telemetry;
use telemq_node::transport::{HttpTransport, OfflineTransport, Transport};
use telemq_node::watermark::{HttpShadowSync, OfflineSync, WatermarkSync};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), NodeError> {
    init_telemetry();

    let cfg = NodeConfig::from_env()?;
    tracing::info!("Initializing telemq node with config: {:?}", cfg);

    let store: SharedStore = Arc::new(FileStore::open(&cfg.data_dir, &cfg.partition)?);

    let transport: Arc<dyn Transport> = match &cfg.broker_url {
        Some(url) => Arc::new(HttpTransport::new(url.clone(), cfg.ack_timeout)?),
        None => {
            tracing::warn!("No broker configured; events will be queued but not published");
            Arc::new(OfflineTransport)
        }
    };

    let shadow = cfg.shadow_url.clone().map(HttpShadowSync::new);
    let sync: Arc<dyn WatermarkSync> = match &shadow {
        Some(shadow) => Arc::new(shadow.clone()),
        None => Arc::new(OfflineSync),
    };

    let agent = Arc::new(Agent::open(&cfg, store, transport, sync)?);

    if let Some(shadow) = &shadow {
        match shadow.fetch(&cfg.watermark_field).await {
            Ok(Some(remote)) => {
                if agent.reconcile_remote(remote)? {
                    tracing::info!("Resuming after remote watermark {}", remote);
                }
            }
            Ok(None) => tracing::info!("Remote document has no {} yet", cfg.watermark_field),
            Err(e) => {
                tracing::warn!("Failed to read remote watermark: {}. Using local state", e)
            }
        }
    }

    tokio::spawn(agent.clone().run());

    let app = build_router(agent, cfg.auth_token.clone());

    let addr = cfg.bind_addr;
    tracing::info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
