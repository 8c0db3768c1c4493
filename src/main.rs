use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};

use case_router::cache::MemoryCache;
use case_router::config::RouterConfig;
use case_router::routing::CaseRouter;
use case_router::store::LibSqlBackend;

/// Route support cases by their first message's recipients.
#[derive(Parser)]
#[command(name = "case-router")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Database file path
    #[arg(long, env = "CASE_ROUTER_DB_PATH", default_value = "./data/case-router.db")]
    db: PathBuf,

    /// Print outcomes as JSON lines
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Route each case, sharing one rule cache across the run
    Route {
        #[arg(required = true)]
        case_ids: Vec<i64>,
    },
    /// List the active routing rules
    Rules,
    /// Add a routing rule
    AddRule {
        email: String,
        routing: i64,
        /// Allow routing when the address is only on CC
        #[arg(long)]
        allow_cc: bool,
    },
    /// Create an unassigned case
    AddCase {
        #[arg(long)]
        subject: Option<String>,
    },
    /// Attach a message to a case, sent now
    AddMessage {
        case_id: i64,
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        cc: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = RouterConfig::from_env()?;
    let db = Arc::new(
        LibSqlBackend::new_local(&cli.db)
            .await
            .with_context(|| format!("Failed to open database at {}", cli.db.display()))?,
    );

    match cli.command {
        Command::Route { case_ids } => {
            let cache = MemoryCache::new(&config.cache_name);
            let router = CaseRouter::new(db.clone(), db, Arc::new(cache), config);
            for case_id in case_ids {
                let outcome = router
                    .route(case_id)
                    .await
                    .with_context(|| format!("Failed to route case {case_id}"))?;
                if cli.json {
                    let mut line = serde_json::to_value(outcome)?;
                    line["case_id"] = case_id.into();
                    println!("{line}");
                } else {
                    println!("case {case_id}: {outcome}");
                }
            }
        }
        Command::Rules => {
            let cache = MemoryCache::new(&config.cache_name);
            let router = CaseRouter::new(db.clone(), db, Arc::new(cache), config);
            let rules = router.load_rules().await?;
            if cli.json {
                println!("{}", serde_json::to_string(&rules)?);
            } else if rules.is_empty() {
                println!("no active routing rules");
            } else {
                for rule in rules {
                    let cc = if rule.allow_when_cc { "TO/CC" } else { "TO" };
                    println!("{:<40} -> {:<8} {cc}", rule.target_email, rule.routing);
                }
            }
        }
        Command::AddRule {
            email,
            routing,
            allow_cc,
        } => {
            let flag = if allow_cc { "T" } else { "F" };
            let id = db.insert_rule(&email, routing, Some(flag)).await?;
            println!("rule {id} added");
        }
        Command::AddCase { subject } => {
            let id = db.insert_case(subject.as_deref()).await?;
            println!("case {id} added");
        }
        Command::AddMessage { case_id, to, cc } => {
            let id = db
                .insert_message(case_id, to.as_deref(), cc.as_deref(), Utc::now())
                .await?;
            println!("message {id} added to case {case_id}");
        }
    }

    Ok(())
}
