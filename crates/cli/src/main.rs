use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use clap::{ArgAction, Parser};
use kubeflat_core::Kind;
use kubeflat_kubehub::KubeLister;
use kubeflat_server::Exporter;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "kubeflat", version, about = "Export Kubernetes workload fields as Prometheus gauges")]
struct Cli {
    /// Port to serve the HTTP scrape endpoint on
    #[arg(long, env = "KUBEFLAT_PORT", default_value_t = 80)]
    port: u16,

    /// Address to bind
    #[arg(long, env = "KUBEFLAT_BIND", default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Watched kinds in collection order (deployment, pod, job, rc, ds)
    #[arg(long, env = "KUBEFLAT_KINDS", value_delimiter = ',', default_value = "deployment,pod,job,rc,ds")]
    kinds: Vec<Kind>,

    /// Keep metadata.managedFields in listed documents
    #[arg(long, env = "KUBEFLAT_KEEP_MANAGED_FIELDS", action = ArgAction::SetTrue)]
    keep_managed_fields: bool,

    /// host:port for the exporter's own metrics (disabled when unset)
    #[arg(long, env = "KUBEFLAT_TELEMETRY_ADDR")]
    telemetry_addr: Option<String>,

    /// Log filter directives, e.g. `info` or `kubeflat_core=debug`
    #[arg(long = "log", env = "KUBEFLAT_LOG", default_value = "info")]
    log: String,
}

fn log_filter(directives: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::from_str(directives).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

fn init_tracing(directives: &str) {
    let filter = log_filter(directives);
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

fn init_metrics(addr: Option<&str>) {
    let Some(addr) = addr else { return };
    if let Ok(sock) = addr.parse::<SocketAddr>() {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        match builder.with_http_listener(sock).install() {
            Ok(_) => tracing::info!(addr = %addr, "telemetry exporter listening"),
            Err(e) => tracing::warn!(error = %e, "failed to install telemetry exporter"),
        }
    } else {
        tracing::warn!(addr = %addr, "invalid KUBEFLAT_TELEMETRY_ADDR; expected host:port");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log);
    init_metrics(cli.telemetry_addr.as_deref());

    let lister = KubeLister::try_default(!cli.keep_managed_fields).await?;
    let exporter = Arc::new(Exporter::new(Arc::new(lister), cli.kinds));
    let addr = SocketAddr::new(cli.bind, cli.port);
    info!(addr = %addr, "kubeflat starting");
    kubeflat_server::serve(exporter, addr).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_watch_all_kinds() {
        let cli = Cli::try_parse_from(["kubeflat"]).unwrap();
        assert_eq!(cli.port, 80);
        assert_eq!(cli.kinds, Kind::ALL.to_vec());
        assert!(!cli.keep_managed_fields);
        assert_eq!(cli.log, "info");
    }

    #[test]
    fn log_filter_comes_from_flag() {
        let cli = Cli::try_parse_from(["kubeflat", "--log", "kubeflat_core=debug"]).unwrap();
        assert_eq!(cli.log, "kubeflat_core=debug");
        let _filter = log_filter(&cli.log);
    }

    #[test]
    fn kinds_parse_comma_list() {
        let cli = Cli::try_parse_from(["kubeflat", "--kinds", "pod,rc", "--port", "9102"]).unwrap();
        assert_eq!(cli.kinds, vec![Kind::Pod, Kind::ReplicationController]);
        assert_eq!(cli.port, 9102);
        assert!(Cli::try_parse_from(["kubeflat", "--kinds", "statefulset"]).is_err());
    }
}
