//! modelgraph - serve a synthesized GraphQL schema over the example models
//!
//! Prints the schema SDL or executes a GraphQL document from a file against
//! the configured SQLite database.

mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use async_graphql::{Request, Variables};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use modelgraph::config::{Config, LogFormat};
use modelgraph::db::{Database, sync_catalog};
use modelgraph::entities::{self, DefaultUserName};
use modelgraph::graphql::{SchemaSynthesizer, TypeRegistry};

use crate::cli::{CliOptions, USAGE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let options = CliOptions::from_args();
    if options.help {
        println!("{USAGE}");
        return Ok(());
    }
    let config = Config::from_env()?;

    // Logs go to stderr; stdout carries the schema or the response
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "modelgraph=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }

    tracing::info!("Starting modelgraph");

    let db = Database::connect(&config.database_url, config.max_connections).await?;
    tracing::info!("Database connected");

    let catalog = Arc::new(entities::catalog().context("Invalid model catalog")?);
    if config.sync_schema {
        let result = sync_catalog(db.pool(), &catalog).await;
        tracing::info!(
            tables_created = result.tables_created.len(),
            columns_added = result.columns_added.len(),
            "Schema sync complete"
        );
    }

    let registry = Arc::new(TypeRegistry::new());
    let mut synthesizer = SchemaSynthesizer::new(Arc::clone(&catalog), registry)
        .max_assign_depth(config.max_assign_depth)
        .hooks("User", Arc::new(DefaultUserName));
    for model in &config.read_only_models {
        synthesizer = synthesizer.exclude_mutations(model.clone());
    }
    let schema = synthesizer
        .build(db.clone())
        .context("Failed to build GraphQL schema")?;

    if options.print_schema {
        println!("{}", schema.sdl());
    }

    if let Some(query_path) = &options.query {
        let query = read_file(query_path).await?;
        let mut request = Request::new(query);
        if let Some(variables_path) = &options.variables {
            let variables: serde_json::Value = serde_json::from_str(&read_file(variables_path).await?)
                .with_context(|| format!("Invalid JSON in {}", variables_path.display()))?;
            request = request.variables(Variables::from_json(variables));
        }

        let response = schema.execute(request).await;
        if response.is_err() {
            tracing::warn!(errors = response.errors.len(), "Query returned errors");
        }
        println!("{}", serde_json::to_string_pretty(&response)?);
    }

    if !options.has_action() {
        eprintln!("{USAGE}");
    }

    Ok(())
}

async fn read_file(path: &Path) -> anyhow::Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}
