use std::{
    fs::OpenOptions,
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{
    EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt,
};

use receipt_ledger::{
    AppState, CommandExtractor, PaginationConfig, ReceiptStorage, UploadPolicy, build_router,
    graceful_shutdown, logging_middleware,
};

/// The REST API server for receipt_ledger.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long, env = "RECEIPT_LEDGER_DB")]
    db_path: PathBuf,

    /// The port to serve the API from.
    #[arg(short, long, env = "RECEIPT_LEDGER_PORT", default_value_t = 3000)]
    port: u16,

    /// The directory uploaded receipts are stored in.
    #[arg(long, env = "RECEIPT_LEDGER_UPLOAD_DIR", default_value = "uploads/receipts")]
    upload_dir: PathBuf,

    /// The largest receipt file accepted, in bytes.
    #[arg(long, env = "RECEIPT_LEDGER_MAX_UPLOAD_BYTES", default_value_t = 10 * 1024 * 1024)]
    max_upload_bytes: u64,

    /// The program that extracts purchase data from a receipt file.
    ///
    /// It is called with the absolute path of the receipt as its last
    /// argument and must print a JSON object to stdout.
    #[arg(long, env = "RECEIPT_LEDGER_EXTRACTOR", default_value = "receipt-extractor")]
    extractor: PathBuf,

    /// An argument passed to the extractor before the receipt path. May be repeated.
    #[arg(long = "extractor-arg", allow_hyphen_values = true)]
    extractor_args: Vec<String>,

    /// How long the extractor may run before it is killed, in seconds.
    #[arg(long, env = "RECEIPT_LEDGER_EXTRACTION_TIMEOUT", default_value_t = 60)]
    extraction_timeout_secs: u64,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let conn = Connection::open(&args.db_path).expect("Could not open the database.");
    let storage =
        ReceiptStorage::initialize(&args.upload_dir).expect("Could not create the upload directory.");
    let extractor = CommandExtractor::new(args.extractor.clone())
        .with_args(args.extractor_args)
        .with_timeout(Duration::from_secs(args.extraction_timeout_secs));

    tracing::info!(
        "Storing receipts in {} and extracting them with {}",
        storage.dir().display(),
        args.extractor.display()
    );

    let app_state = AppState::new(
        conn,
        storage,
        Arc::new(extractor),
        UploadPolicy::receipts(args.max_upload_bytes),
        PaginationConfig::default(),
    )
    .expect("Could not initialize the database.");

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = build_router(app_state).layer(middleware::from_fn(logging_middleware));
    let router = add_tracing_layer(router);

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .expect("The server stopped unexpectedly.");
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file))
        .with_filter(filter::LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(debug_log)
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
