//! # stockroom
//!
//! Operator CLI over the sale engine and the reporting and inventory
//! services.
//!
//! ## Usage
//! ```bash
//! stockroom sell <user-id> <product-id>:<qty> [<product-id>:<qty> ...]
//! stockroom stats
//! stockroom summary --from 2024-06-01 --to 2024-06-30
//! stockroom low-stock
//! stockroom reconcile <product-id>
//! stockroom deactivate product|user <id>
//! stockroom status
//! ```
//!
//! Configuration comes from `STOCKROOM_*` environment variables (see
//! `ServiceConfig`); output is JSON on stdout, logs go to stderr.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  config ──► Database ──► AuditDispatcher::spawn                         │
//! │                 │                 │                                     │
//! │                 ▼                 ▼                                     │
//! │   SaleEngine  ReportService  InventoryService                           │
//! │        └────────────┬──────────────┘                                    │
//! │                        ▼                                                │
//! │              command  (or Ctrl+C)                                       │
//! │                        ▼                                                │
//! │        worker.shutdown() ──► db.close()                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::env;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stockroom_core::Role;
use stockroom_db::{migrations, Database};
use stockroom_service::{
    AuditDispatcher, AuditSink, CreateSaleRequest, InventoryService, ReportService, SaleEngine,
    SaleLine, SalesFilter, ServiceConfig,
};

/// Identity recorded for CLI report queries.
const OPERATOR: &str = "cli";

const USAGE: &str = "\
Usage: stockroom <COMMAND>

Commands:
  sell <USER_ID> <PRODUCT_ID>:<QTY>...    Ring up a sale at catalog prices with the configured tax
  stats                                   Sales totals (all time, today, this month, per user)
  summary [--from YYYY-MM-DD] [--to YYYY-MM-DD]
                                          Daily sales summaries, newest day first
  low-stock                               Products at or below their minimum stock
  reconcile <PRODUCT_ID>                  Compare cached stock with the movement ledger
  deactivate product|user <ID>            Stop selling a product or disable a user
  status                                  Database health and applied migrations";

enum Command {
    Sell {
        user_id: String,
        lines: Vec<(String, i64)>,
    },
    Stats,
    Summary {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
    LowStock,
    Reconcile {
        product_id: String,
    },
    Deactivate {
        target: Target,
        id: String,
    },
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Product,
    User,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,stockroom=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = parse_args(&args)? else {
        println!("{USAGE}");
        return Ok(());
    };

    let config = ServiceConfig::load()?;
    info!(db = %config.db_path, "Configuration loaded");

    let db = Database::new(config.db_config())
        .await
        .context("opening database")?;

    let (audit, worker) = AuditDispatcher::spawn(&db, config.audit_queue_capacity);
    let audit: Arc<dyn AuditSink> = Arc::new(audit);
    let services = Services {
        engine: SaleEngine::new(db.clone(), audit.clone())
            .with_tax_defaults(config.tax_defaults()),
        reports: ReportService::new(db.clone()),
        inventory: InventoryService::new(db.clone(), audit),
        db: db.clone(),
    };

    let result = tokio::select! {
        result = run(command, &services) => result,
        _ = interrupted() => {
            warn!("Interrupted, shutting down");
            Ok(())
        }
    };

    worker.shutdown().await;
    db.close().await;

    result
}

struct Services {
    db: Database,
    engine: SaleEngine,
    reports: ReportService,
    inventory: InventoryService,
}

async fn run(command: Command, services: &Services) -> anyhow::Result<()> {
    let Services {
        db,
        engine,
        reports,
        inventory,
    } = services;

    match command {
        Command::Sell { user_id, lines } => {
            let mut items = Vec::with_capacity(lines.len());
            for (product_id, quantity) in lines {
                let product = db
                    .products()
                    .get_by_id(&product_id)
                    .await?
                    .with_context(|| format!("unknown product: {product_id}"))?;
                items.push(SaleLine {
                    product_id,
                    quantity,
                    unit_price_cents: product.price_cents,
                    discount_bps: None,
                });
            }

            let detail = engine
                .create_sale(CreateSaleRequest {
                    items,
                    tax_included: None,
                    tax_rate: None,
                    acting_user_id: user_id,
                })
                .await?;
            info!(sale_id = %detail.sale.id, total = %detail.sale.total(), "Sale recorded");
            print_json(&detail)
        }
        Command::Stats => print_json(&reports.get_sales_stats(Role::Admin).await?),
        Command::Summary { from, to } => {
            let mut filter = SalesFilter::new(Role::Admin, OPERATOR);
            if let Some(from) = from {
                filter = filter.since(from);
            }
            if let Some(to) = to {
                filter = filter.until(to);
            }
            print_json(&reports.summarize_sales(&filter).await?)
        }
        Command::LowStock => print_json(&inventory.low_stock().await?),
        Command::Reconcile { product_id } => print_json(&inventory.reconcile(&product_id).await?),
        Command::Deactivate { target, id } => {
            match target {
                Target::Product => db.products().deactivate(&id).await?,
                Target::User => {
                    if !db.users().deactivate(&id).await? {
                        bail!("unknown user: {id}");
                    }
                }
            }
            info!(?target, %id, "Deactivated");
            Ok(())
        }
        Command::Status => {
            let (total, applied) = migrations::migration_status(db.pool()).await?;
            print_json(&json!({
                "healthy": db.health_check().await,
                "migrations": { "total": total, "applied": applied },
            }))
        }
    }
}

fn parse_args(args: &[String]) -> anyhow::Result<Option<Command>> {
    let Some((name, rest)) = args.split_first() else {
        return Ok(None);
    };

    let command = match name.as_str() {
        "sell" => match rest {
            [user_id, lines @ ..] if !lines.is_empty() => Command::Sell {
                user_id: user_id.clone(),
                lines: lines
                    .iter()
                    .map(|line| parse_sale_line(line))
                    .collect::<anyhow::Result<_>>()?,
            },
            _ => bail!("sell takes a user id and at least one <PRODUCT_ID>:<QTY>"),
        },
        "stats" => Command::Stats,
        "low-stock" => Command::LowStock,
        "reconcile" => match rest {
            [product_id] => Command::Reconcile {
                product_id: product_id.clone(),
            },
            _ => bail!("reconcile takes exactly one product id"),
        },
        "summary" => {
            let (mut from, mut to) = (None, None);
            let mut flags = rest.iter();
            while let Some(flag) = flags.next() {
                let value = flags
                    .next()
                    .with_context(|| format!("{flag} needs a date"))?;
                let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
                    .with_context(|| format!("invalid date for {flag}: {value}"))?;
                match flag.as_str() {
                    "--from" => from = Some(date),
                    "--to" => to = Some(date),
                    other => bail!("unknown summary option: {other}"),
                }
            }
            Command::Summary { from, to }
        }
        "deactivate" => match rest {
            [target, id] => Command::Deactivate {
                target: match target.as_str() {
                    "product" => Target::Product,
                    "user" => Target::User,
                    other => bail!("cannot deactivate a {other}"),
                },
                id: id.clone(),
            },
            _ => bail!("deactivate takes product|user and an id"),
        },
        "status" => Command::Status,
        "help" | "--help" | "-h" => return Ok(None),
        other => bail!("unknown command: {other}\n\n{USAGE}"),
    };

    Ok(Some(command))
}

/// `<PRODUCT_ID>:<QTY>`; the quantity itself is checked by the engine.
fn parse_sale_line(raw: &str) -> anyhow::Result<(String, i64)> {
    let (product_id, quantity) = raw
        .rsplit_once(':')
        .with_context(|| format!("expected <PRODUCT_ID>:<QTY>, got {raw}"))?;
    let quantity = quantity
        .parse()
        .with_context(|| format!("invalid quantity in {raw}"))?;
    Ok((product_id.to_string(), quantity))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(?e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}
