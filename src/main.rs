use anyhow::{Context, Result};
use std::env;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use chat_orders::segmenter::split_export;
use chat_orders::{
    CompanyAliasTable, ForwarderConfig, LineOutcome, OrderBatch, OrderParser,
    QuantityPatternConfig,
};

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut args: Vec<String> = env::args().skip(1).collect();
    let live = match args.iter().position(|a| a == "--live") {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    };
    let input = read_input(args.first().map(String::as_str))?;

    let parser = build_parser()?;
    let lines = parse_lines(&input);

    let batch = if live {
        let forwarders = load_forwarders(env::var("CHAT_ORDERS_FORWARDERS").ok())?;
        info!(lines = lines.len(), "Replaying chat input through forwarder session");
        resolve_live(parser, forwarders, lines)?
    } else {
        info!(lines = lines.len(), "Resolving chat input");
        parser.resolve_batch(lines)
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&batch).context("Failed to serialize orders")?
    );

    Ok(())
}

/// Build the parser from env-configured files, falling back to the bundled config
fn build_parser() -> Result<OrderParser> {
    let aliases = match env::var("CHAT_ORDERS_ALIASES") {
        Ok(path) => {
            info!("Loading company aliases from: {}", path);
            CompanyAliasTable::from_file(&path)
                .with_context(|| format!("Failed to load company aliases from {path}"))?
        }
        Err(_) => CompanyAliasTable::bundled().context("Bundled company aliases are invalid")?,
    };

    let patterns = match env::var("CHAT_ORDERS_PATTERNS") {
        Ok(path) => {
            info!("Loading quantity patterns from: {}", path);
            QuantityPatternConfig::from_file(&path)
                .with_context(|| format!("Failed to load quantity patterns from {path}"))?
        }
        Err(_) => QuantityPatternConfig::bundled().context("Bundled quantity patterns are invalid")?,
    };

    OrderParser::from_config(aliases, &patterns).context("Failed to compile order parser")
}

/// Forwarder allowlist from `path`, or the bundled one
fn load_forwarders(path: Option<String>) -> Result<ForwarderConfig> {
    match path {
        Some(path) => {
            info!("Loading forwarders from: {}", path);
            ForwarderConfig::from_file(&path)
                .with_context(|| format!("Failed to load forwarders from {path}"))
        }
        None => ForwarderConfig::bundled().context("Bundled forwarders are invalid"),
    }
}

/// Feed lines one at a time through a forwarder session, in arrival order
fn resolve_live(
    parser: OrderParser,
    forwarders: ForwarderConfig,
    lines: Vec<Option<String>>,
) -> Result<OrderBatch> {
    let parser = Arc::new(parser);
    let mut session = parser
        .incremental_session(forwarders)
        .context("Failed to start forwarder session")?;

    for (i, line) in lines.into_iter().enumerate() {
        let Some(line) = line else {
            debug!(index = i, "Skipping missing chat line");
            continue;
        };
        match session.ingest(&line) {
            LineOutcome::Ignored => debug!(index = i, "Line ignored"),
            outcome => debug!(index = i, ?outcome, "Line ingested"),
        }
    }

    if !session.pending().is_empty() {
        info!(pending = session.pending().len(), "Unattributed fragments left at end of input");
    }

    Ok(OrderBatch {
        orders: session.orders().to_vec(),
    })
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) if path != "-" => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))
        }
        _ => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read stdin")?;
            Ok(input)
        }
    }
}

/// A JSON array of strings (nulls allowed) or a plain-text chat export
fn parse_lines(input: &str) -> Vec<Option<String>> {
    if let Ok(lines) = serde_json::from_str::<Vec<Option<String>>>(input) {
        return lines;
    }

    split_export(input).into_iter().map(Some).collect()
}
