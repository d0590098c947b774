use clap::Parser;

/// Line-protocol metrics aggregation daemon.
///
/// Listens for statsd-style packets over UDP, aggregates them per context, and emits rolled-up points as JSON lines
/// on stdout at every flush interval. Logs go to stderr.
#[derive(Parser)]
#[command(name = "tallyd")]
pub struct Cli {
    /// Address to bind the UDP listener to.
    #[arg(long, default_value = "127.0.0.1:8125")]
    pub listen: String,

    /// Hostname attributed to samples that do not carry one of their own.
    #[arg(long, default_value = "localhost")]
    pub hostname: String,

    /// Aggregation and flush interval, in seconds.
    #[arg(long, default_value_t = 10.0)]
    pub interval: f64,

    /// How long a context may go without samples before it is dropped, in seconds.
    #[arg(long, default_value_t = 300)]
    pub expiry_seconds: u64,

    /// Namespace prefix applied to every emitted metric name.
    #[arg(long)]
    pub metric_namespace: Option<String>,

    /// Log level filter (tracing EnvFilter syntax).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
