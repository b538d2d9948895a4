mod args;

use std::sync::Arc;

use tokio::sync::watch;

use cr_core::models::RotationConfig;
use cr_core::services::config_loader;
use cr_core::services::directory::LdapOwnershipStore;
use cr_core::services::handoff::HandoffExecutor;
use cr_core::services::platform::KubePlatform;
use cr_core::services::reconcile::ReconcileLoop;

use crate::args::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse(std::env::args().skip(1))?;
    if args.help {
        print!("{}", args::USAGE);
        return Ok(());
    }

    let _guard = setup_logging(&args);

    let config_path = args.config_path();
    let config = config_loader::load(config_path.as_deref())?;

    let platform = Arc::new(KubePlatform::try_default(config.call_timeout()).await?);
    let store = Arc::new(LdapOwnershipStore::new(&config));
    tracing::info!(
        ldap = store.url(),
        inum = %config.appliance_inum,
        tls_verify = !config.ldap_skip_tls_verify,
        "directory record configured"
    );
    if let Some(notice) = tls_notice(&config) {
        tracing::info!("{notice}");
    }

    let executor = HandoffExecutor::new(platform.clone(), store.clone(), &config);
    let mut reconciler = ReconcileLoop::new(platform, store, executor, &config);

    if args.once {
        match reconciler.run_cycle().await {
            Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
            Err(e) => tracing::error!(error = %e, "reconciliation cycle failed"),
        }
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        tracing::warn!("canceled by user; finishing current cycle");
        let _ = shutdown_tx.send(true);
    });

    reconciler.run(shutdown_rx).await;
    Ok(())
}

/// Startup hint shown while the directory certificate is being verified.
fn tls_notice(config: &RotationConfig) -> Option<&'static str> {
    if config.ldap_skip_tls_verify {
        None
    } else {
        Some(
            "verifying the directory's TLS certificate; set GLUU_LDAP_SKIP_TLS_VERIFY=true \
             if it is self-signed",
        )
    }
}

/// Configure tracing to stderr, or to a file when `--log-file` is given.
/// Returns the guard that must be held alive for the duration of the program.
fn setup_logging(args: &Args) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let default_level = if args.debug { "debug" } else { "info" };
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level))
    };

    match &args.log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .map(|f| f.to_os_string())
                .unwrap_or_else(|| "cr-rotate.log".into());
            let file_appender = tracing_appender::rolling::never(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .with_writer(non_blocking)
                .with_env_filter(filter())
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter())
                .init();
            None
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
