use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use pixvault_backend::{
    backfill::{run_backfill, BackfillOptions},
    build_app,
    cli::{CliOpts, Command},
    import::import_dir,
    AppState,
};
use pixvault_shared::AddrInfo;

use tokio::sync::RwLock;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {:?}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn serve(appstate: AppState) -> ExitCode {
    let shared_state = Arc::new(RwLock::new(appstate));
    let addrinfo = AddrInfo::from_env();
    let app: axum::Router = build_app(&shared_state);

    let listener = match tokio::net::TcpListener::bind(&addrinfo.as_addr()).await {
        Ok(val) => {
            info!("Listening on {}", addrinfo.as_url());
            val
        }
        Err(err) => {
            error!("Failed to bind to {}: {:?}", addrinfo.as_url(), err);
            return ExitCode::FAILURE;
        }
    };

    let res = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    let code = match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("Server failed: {:?}", err);
            ExitCode::FAILURE
        }
    };

    match Arc::try_unwrap(shared_state) {
        Ok(state) => close(state.into_inner()).await,
        Err(_) => warn!("Application state still in use at shutdown, not closing the store"),
    }
    code
}

async fn close(appstate: AppState) {
    if let Err(err) = appstate.store.close().await {
        warn!("Failed to close the store cleanly: {}", err);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliOpts::parse();

    let my_filter = match cli.debug {
        true => "pixvault=debug,pixvault_backend=debug,tower_http=debug",
        false => "pixvault=info,pixvault_backend=info,tower_http=info",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| my_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let appstate = match AppState::new(&cli).await {
        Ok(state) => state,
        Err(err) => {
            error!("Failed to initialize application state: {}", err);
            return ExitCode::FAILURE;
        }
    };

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(appstate).await,
        Command::Backfill(args) => {
            let res = run_backfill(&appstate.store, BackfillOptions::from(&args)).await;
            close(appstate).await;
            match res {
                Ok(summary) => {
                    info!("Backfill complete: {}", summary);
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    error!("Backfill aborted: {}", err);
                    ExitCode::FAILURE
                }
            }
        }
        Command::Import(args) => {
            let res = import_dir(&appstate.store, &args.dir, args.status).await;
            close(appstate).await;
            match res {
                Ok(summary) => {
                    info!(
                        "Imported {} files, {} failed",
                        summary.imported, summary.failed
                    );
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    error!("Import failed: {}", err);
                    ExitCode::FAILURE
                }
            }
        }
    }
}
