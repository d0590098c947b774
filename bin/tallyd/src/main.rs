use std::{io::Write as _, sync::Arc, time::Duration};

use clap::Parser as _;
use tally_aggregate::{time::get_unix_timestamp, AggregatorConfiguration};
use tally_error::{generic_error, ErrorContext as _, GenericError};
use tally_event::Point;
use tokio::{
    net::UdpSocket,
    select,
    sync::{mpsc, Mutex},
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, error, info, trace};

mod cli;
use self::cli::Cli;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = initialize_logging(&cli.log_level) {
        eprintln!("failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    match run(cli) {
        Ok(()) => info!("tallyd stopped."),
        Err(e) => {
            error!("{:?}", e);
            std::process::exit(1);
        }
    }
}

fn initialize_logging(log_level: &str) -> Result<(), GenericError> {
    let filter = tracing_subscriber::EnvFilter::try_new(log_level)
        .map_err(|e| generic_error!("invalid log level filter '{}': {}", log_level, e))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| generic_error!("failed to install subscriber: {}", e))
}

fn run(cli: Cli) -> Result<(), GenericError> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .error_context("failed to build runtime")?
        .block_on(run_inner(cli))
}

async fn run_inner(cli: Cli) -> Result<(), GenericError> {
    let flush_interval = Duration::from_secs_f64(cli.interval);

    let mut config = AggregatorConfiguration::with_hostname(cli.hostname.clone())
        .with_interval(cli.interval)
        .with_expiry_seconds(cli.expiry_seconds);
    if let Some(namespace) = cli.metric_namespace.clone() {
        config = config.with_metric_namespace(namespace);
    }
    let aggregator = Arc::new(Mutex::new(config.build()?));

    let socket = UdpSocket::bind(&cli.listen)
        .await
        .with_error_context(|| format!("failed to bind UDP listener on {}", cli.listen))?;

    info!(listen = %cli.listen, interval = cli.interval, "tallyd started.");

    // Emitted points leave the flush path through an unbounded channel, so a slow stdout consumer never blocks a
    // flush or an inbound packet.
    let (points_tx, points_rx) = mpsc::unbounded_channel::<Vec<Point>>();
    let emitter = tokio::spawn(emit_points(points_rx));

    let ingest_aggregator = Arc::clone(&aggregator);
    let ingest = tokio::spawn(async move {
        let mut buffer = vec![0u8; 8192];
        loop {
            match socket.recv_from(&mut buffer).await {
                Ok((len, peer)) => {
                    let packet = String::from_utf8_lossy(&buffer[..len]);
                    ingest_aggregator
                        .lock()
                        .await
                        .submit_packets(&packet, get_unix_timestamp());
                    trace!(%peer, len, "Processed packet.");
                }
                Err(e) => {
                    error!(error = %e, "UDP receive failed.");
                }
            }
        }
    });

    let mut flush = interval(flush_interval);
    flush.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; consume it so the first real flush happens a full interval in.
    flush.tick().await;

    loop {
        select! {
            _ = flush.tick() => {
                flush_once(&aggregator, &points_tx).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal. Performing final flush...");
                flush_once(&aggregator, &points_tx).await;
                break;
            }
        }
    }

    ingest.abort();
    drop(points_tx);
    let _ = emitter.await;

    Ok(())
}

async fn flush_once(
    aggregator: &Arc<Mutex<tally_aggregate::Aggregator>>, points_tx: &mpsc::UnboundedSender<Vec<Point>>,
) {
    // Keep the lock only for the flush-and-drain step; serialization happens on the emitter task.
    let (points, num_events, num_service_checks) = {
        let mut aggregator = aggregator.lock().await;
        let points = aggregator.flush(get_unix_timestamp());
        let num_events = aggregator.flush_events().len();
        let num_service_checks = aggregator.flush_service_checks().len();
        (points, num_events, num_service_checks)
    };

    if num_events > 0 || num_service_checks > 0 {
        // Events and service checks have no transport here; drain them so they cannot accumulate.
        debug!(events = num_events, service_checks = num_service_checks, "Drained non-metric records.");
    }

    if !points.is_empty() {
        debug!(points = points.len(), "Flushed points.");
        let _ = points_tx.send(points);
    }
}

async fn emit_points(mut points_rx: mpsc::UnboundedReceiver<Vec<Point>>) {
    while let Some(points) = points_rx.recv().await {
        let mut stdout = std::io::stdout().lock();
        for point in points {
            match serde_json::to_string(&point) {
                Ok(line) => {
                    if let Err(e) = writeln!(stdout, "{}", line) {
                        error!(error = %e, "Failed to write point.");
                    }
                }
                Err(e) => error!(error = %e, "Failed to serialize point."),
            }
        }
    }
}
