//! services/widget/src/bin/widget.rs

use chatlite_core::domain::{EmbedMode, PageContext};
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use widget_lib::{
    adapters::{backend::HttpBackend, channel, host::HeadlessHost, storage::SqliteVisitorStore},
    config::Config,
    error::WidgetError,
    loader::{EmbedOptions, Loader},
    runtime::{run_widget, WidgetController},
};

#[tokio::main]
async fn main() -> Result<(), WidgetError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting widget harness...");

    // The harness mirrors the loader script's auto-init: with no widget id
    // configured it stays dormant.
    let Some(widget_id) = config.widget_id.clone() else {
        info!("No CHATLITE_WIDGET_ID configured; nothing to embed.");
        return Ok(());
    };

    // --- 2. Initialize Service Adapters ---
    let backend = Arc::new(HttpBackend::new(
        config.api_base.as_str(),
        config.request_timeout,
    )?);
    let store = Arc::new(SqliteVisitorStore::new(&config.state_db).await?);
    let host = Arc::new(HeadlessHost::new());

    // --- 3. Wire the Two Documents Together ---
    let host_page = PageContext {
        origin: "http://localhost:8080".to_string(),
        url: "http://localhost:8080/demo".to_string(),
        title: "ChatLite Harness".to_string(),
        user_agent: format!("chatlite-harness/{}", env!("CARGO_PKG_VERSION")),
        referrer: String::new(),
    };
    let frontend_origin = config.frontend_base.trim_end_matches('/').to_string();
    let widget_page = PageContext {
        origin: frontend_origin.clone(),
        url: format!("{}/widget?id={}&mode=embedded", frontend_origin, widget_id),
        title: "ChatLite Widget".to_string(),
        user_agent: host_page.user_agent.clone(),
        referrer: host_page.url.clone(),
    };
    let (host_end, widget_end) = channel::pair(&host_page.origin, &frontend_origin);

    // --- 4. Start the Embedded Runtime ---
    let controller = Arc::new(Mutex::new(WidgetController::new(
        widget_id.as_str(),
        EmbedMode::Embedded,
        widget_end.sender,
        backend.clone(),
        store,
        widget_page,
        config.api_base.as_str(),
    )));
    let cancel = CancellationToken::new();
    tokio::spawn(run_widget(
        controller.clone(),
        widget_end.receiver,
        cancel.clone(),
    ));

    // --- 5. Run the Loader Bootstrap ---
    let loader = Loader::new(
        EmbedOptions::from_config(&config, widget_id.as_str()),
        backend,
        host,
        host_end,
        host_page,
    );
    loader.init().await;
    controller.lock().await.init().await;

    // --- 6. Drive the Chat from Stdin ---
    println!("Type a message and press enter ('/toggle' opens or closes the chat, '/quit' exits).");
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        match line.as_str() {
            "/quit" => break,
            "/toggle" => {
                let mut controller = controller.lock().await;
                controller.toggle();
                let open = controller.state().is_open;
                println!("chat is now {}", if open { "open" } else { "closed" });
            }
            "" => {}
            _ => {
                let mut controller = controller.lock().await;
                controller.send(&line).await;
                if let Some(reply) = controller.messages().last() {
                    println!("[{:?}] {}", reply.status, reply.content);
                }
            }
        }
    }

    cancel.cancel();
    loader.destroy().await;
    info!("Harness stopped.");
    Ok(())
}
