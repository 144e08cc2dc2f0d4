use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};

use ftoken::config;
use ftoken::{Controller, ControllerHandle, Document, HttpTokenFetcher};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Load configuration
    let config = config::Config::from_env().map_err(|e| {
        log::error!("Configuration error: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let layout = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("FTOKEN_LAYOUT").map(PathBuf::from))
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "usage: ftoken-watch <layout.json> (or set FTOKEN_LAYOUT)",
            )
        })?;

    let document = Document::from_json_file(&layout).map_err(|e| {
        log::error!("Failed to load layout {}: {}", layout.display(), e);
        std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
    })?;

    let fetcher = HttpTokenFetcher::new(config.fetch_timeout).map_err(|e| {
        log::error!("HTTP client error: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    log::info!(
        "Watching {} form(s), tokens renewed every {:?}",
        document.forms.len(),
        config.renewal_delay()
    );

    let controller = Controller::new(&config, document, fetcher);
    let handle = controller.handle();
    let runner = tokio::spawn(controller.run());

    handle.page_ready().map_err(std::io::Error::other)?;

    // Key edits arrive on stdin as `<key_field>=<value>` lines
    let input = handle.clone();
    tokio::spawn(async move {
        read_edits(input).await;
    });

    shutdown_signal().await;
    log::info!("Shutdown signal received, stopping...");
    handle.shutdown().map_err(std::io::Error::other)?;

    let document = runner.await.map_err(std::io::Error::other)?;
    for form in &document.forms {
        log::info!(
            "Form {}: submission {}",
            form.id,
            if form.is_submittable() { "enabled" } else { "disabled" }
        );
    }

    Ok(())
}

async fn read_edits(handle: ControllerHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let Some((key_field, value)) = line.split_once('=') else {
                    log::warn!("Expected <key_field>=<value>, got {:?}", line);
                    continue;
                };
                if handle.value_changed(key_field.trim(), value).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                log::error!("Failed to read stdin: {}", e);
                break;
            }
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                log::error!("Failed to install Ctrl+C handler: {}", e);
                // Wait forever if signal handler fails
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
