use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;
mod catalog;
mod cli;
mod config;
mod format;
mod mcp;
mod recommend;
mod semantic;
mod storage;
#[cfg(test)]
mod tests;
mod web;

use app::{AppFactory, AppService};

fn init_logging() {
    // stdout carries the stdio transport, so logs go to stderr
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_service() -> anyhow::Result<(config::Config, Arc<AppService>)> {
    let config = AppFactory::create_config()?;
    let service = Arc::new(AppFactory::create_app_service(&config)?);
    Ok((config, service))
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = cli::Args::parse();

    match args.command {
        cli::Command::Serve { bind } => {
            let (config, service) = load_service()?;
            let count = service.ensure_loaded()?;
            log::info!("catalog cache loaded with {count} MCPs");

            let bind = bind.unwrap_or_else(|| config.server.bind_addr());
            web::start_daemon(service, &bind)?;
        }

        cli::Command::Stdio {} => {
            let (_, service) = load_service()?;
            let count = service.ensure_loaded()?;
            log::info!("catalog cache loaded with {count} MCPs");

            let server = Arc::new(mcp::McpServer::new(service.clone()));
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?
                .block_on(mcp::run_stdio(server))?;
            service.shutdown();
        }

        cli::Command::Find { query, json } => {
            let (_, service) = load_service()?;
            service.ensure_loaded()?;

            let result = service.find_mcp(&query.join(" "));
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", format::format_ranking(&result));
            }

            if !result.success {
                std::process::exit(1);
            }
        }

        cli::Command::Add { id, json } => {
            let (_, service) = load_service()?;
            service.ensure_loaded()?;

            let guide = service.add_mcp(&id);
            if json {
                println!("{}", serde_json::to_string_pretty(&guide)?);
            } else {
                println!("{}", format::format_install_guide(&guide));
            }

            if !guide.success {
                std::process::exit(1);
            }
        }

        cli::Command::Refresh {} => {
            let (config, service) = load_service()?;
            let count = service.refresh()?;
            println!(
                "cached {count} MCPs in {}/{}",
                config.base_path(),
                config.cache.file
            );
        }
    }

    Ok(())
}
