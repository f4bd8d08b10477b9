use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "apm-collector",
    about = "APM collector: merges stream records and persists them to the configured backend"
)]
pub(crate) struct Args {
    #[arg(long, short = 'c', help = "Path to the collector YAML config file")]
    pub(crate) config_file: PathBuf,

    #[arg(long, help = "Table namespace, overrides `namespace` from the config file")]
    pub(crate) namespace: Option<String>,

    #[arg(
        long,
        help = "Prometheus exporter address, e.g. 0.0.0.0:9464 (overrides `prometheus`)"
    )]
    pub(crate) prom_exporter: Option<String>,

    #[arg(long, help = "Database file for the redb backend (overrides `storage.redb.path`)")]
    pub(crate) redb_path: Option<PathBuf>,

    #[arg(
        long,
        help = "Newline-delimited JSON stream records to ingest after start-up"
    )]
    pub(crate) replay: Option<PathBuf>,
}
