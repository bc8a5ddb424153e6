//! Mimic stub server CLI.
//!
//! Startup is strictly sequential: flags, logging, templates, route table,
//! listener. Any failure aborts before the listener opens.

use anyhow::Context;
use clap::Parser;
use mimic_server::config::Configuration;
use mimic_server::logging;
use mimic_server::routes::RouteTable;
use mimic_server::server::{StubServer, TlsPaths};
use mimic_server::template::TemplateRegistry;
use std::path::PathBuf;
use tracing::info;

/// Substring a file path must contain to be loaded as a template.
const TEMPLATE_EXTENSION: &str = ".template";

#[derive(Parser, Debug)]
#[command(name = "mimic-server")]
#[command(
    author,
    version,
    about = "Configuration-driven HTTP stub server that renders response templates from request data"
)]
struct Args {
    /// Path to the templates folder
    #[arg(long, default_value = "./templates")]
    templates: PathBuf,

    /// Port to listen on
    #[arg(long)]
    port: u16,

    /// Path to the server TLS private key (PEM); TLS is enabled only when
    /// --server-crt is also given
    #[arg(long)]
    server_key: Option<PathBuf>,

    /// Path to the server TLS certificate (PEM); TLS is enabled only when
    /// --server-key is also given
    #[arg(long)]
    server_crt: Option<PathBuf>,

    /// Path to the JSON route-table configuration
    #[arg(long)]
    configuration: PathBuf,

    /// Path to the JSON logging configuration
    #[arg(long)]
    log_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    logging::init(args.log_config.as_deref())?;
    info!("Starting server listening on port {}", args.port);

    let templates = TemplateRegistry::load(&args.templates, TEMPLATE_EXTENSION)
        .with_context(|| format!("failed to load templates from '{}'", args.templates.display()))?;
    info!(
        "Compiled {} templates from {}",
        templates.len(),
        args.templates.display()
    );

    let configuration = Configuration::from_file(&args.configuration).with_context(|| {
        format!(
            "failed to load route configuration '{}'",
            args.configuration.display()
        )
    })?;
    let routes = RouteTable::compile(&configuration);

    let tls = match (args.server_crt, args.server_key) {
        (Some(cert_path), Some(key_path)) => Some(TlsPaths {
            cert_path,
            key_path,
        }),
        _ => None,
    };

    StubServer::new(routes, templates, args.port, tls).run().await
}
