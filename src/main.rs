//! shell-relay binary entry point.

use std::process::ExitCode;
use std::sync::Arc;

use shell_relay::{
    api,
    cli::{self, parse_args},
    config::Config,
    logging::{self, NullSink, RecordSink},
    JsonlSink, ShellEngine,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Run with --help for usage");
            return ExitCode::FAILURE;
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }

    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(Some(config.log_filter()));
    info!("shell-relay v{}", env!("CARGO_PKG_VERSION"));

    let server_config = match config.to_server_config() {
        Ok(server_config) => server_config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let sink: Arc<dyn RecordSink> = match config.logging.dir {
        Some(ref dir) => match JsonlSink::open(dir) {
            Ok(sink) => {
                info!(path = %sink.path().display(), "Request log enabled");
                Arc::new(sink)
            }
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Cannot open request log, continuing without it");
                Arc::new(NullSink)
            }
        },
        None => Arc::new(NullSink),
    };

    let engine = Arc::new(ShellEngine::with_sink(config.to_engine_config(), sink));
    info!(
        shell = %config.shell.path,
        cwd = %engine.cwd().unwrap_or_default(),
        "Engine ready, interpreter starts on first command"
    );

    if !server_config.auth.is_enabled() && !server_config.host.is_loopback() {
        warn!(
            "Authentication is disabled on non-loopback address {}; anyone who can reach it can run commands",
            server_config.host
        );
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received");
    };

    let outcome = api::serve(server_config, Arc::clone(&engine), shutdown).await;
    engine.shutdown().await;

    match outcome {
        Ok(()) => {
            info!("shell-relay stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
