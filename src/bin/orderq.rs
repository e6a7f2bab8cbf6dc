//! orderq CLI: operator interface to the fulfillment pipeline.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use orderq::broker::QueueBroker;
use orderq::config::Config;
use orderq::config::secrets::ExposeSecret;
use orderq::db::{Db, PgOrderStore, PgmqBroker};
use orderq::engine::{
    CommandFulfillment, Fulfillment, Producer, SimulatedFulfillment, SubmitResult, Worker,
    WorkerConfig, reconcile,
};
use orderq::model::{NewOrder, Order, OrderId};
use orderq::store::OrderStore;
use orderq::telemetry::{TelemetryConfig, init_telemetry};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "orderq", about = "Order fulfillment pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile the queue, then process orders until Ctrl-C
    Worker {
        /// Seconds one blocking dequeue waits (overrides ORDERQ_DEQUEUE_TIMEOUT_SECS)
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Name for logs and spans
        #[arg(long)]
        worker_id: Option<String>,
    },
    /// Order operations
    Order {
        #[command(subcommand)]
        action: OrderAction,
    },
    /// Run one reconciliation sweep and exit
    Reconcile,
    /// Queue operations
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// Record a new order and queue it
    Create {
        /// Owner identity
        #[arg(long)]
        owner: String,
        /// Target URL
        #[arg(long)]
        url: String,
        /// Quantity
        #[arg(long)]
        count: i32,
    },
    /// Show one order
    Show {
        /// Order identity
        identity: String,
    },
    /// List an owner's orders
    List {
        /// Owner identity
        #[arg(long)]
        owner: String,
    },
    /// Logically delete an order
    Delete {
        /// Order identity
        identity: String,
    },
}

#[derive(Subcommand)]
enum QueueAction {
    /// List queued identities, head first
    Show,
    /// Drop every queued identity (reconciliation restores pending ones)
    Purge,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Worker {
            timeout_secs,
            worker_id,
        } => cmd_worker(config, timeout_secs, worker_id).await,
        Command::Order { action } => {
            let (store, broker) = connect(&config).await?;
            cmd_order(store, broker, action).await
        }
        Command::Reconcile => {
            let (store, broker) = connect(&config).await?;
            cmd_reconcile(&*store, &*broker).await
        }
        Command::Queue { action } => {
            let (_, broker) = connect(&config).await?;
            cmd_queue(&broker, action).await
        }
    }
}

async fn connect(config: &Config) -> anyhow::Result<(Arc<PgOrderStore>, Arc<PgmqBroker>)> {
    let db = Db::connect(config.database_url.expose_secret()).await?;
    db.migrate().await?;
    let broker = db.broker(&config.queue_name).await?;
    Ok((Arc::new(db.order_store()), Arc::new(broker)))
}

async fn cmd_worker(
    config: Config,
    timeout_secs: Option<u64>,
    worker_id: Option<String>,
) -> anyhow::Result<()> {
    let mut worker_config = WorkerConfig {
        dequeue_timeout: timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(config.dequeue_timeout),
        retry_delay: config.retry_delay,
        ..WorkerConfig::default()
    };
    if let Some(id) = worker_id {
        worker_config.worker_id = id;
    }

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "orderq-worker".to_string(),
        instance_id: Some(worker_config.worker_id.clone()),
        default_level: config.log_level.clone(),
    })?;

    let (store, broker) = connect(&config).await?;

    match config.work_command {
        Some(ref command) => {
            let fulfillment = Arc::new(CommandFulfillment::new(command)?);
            serve(store, broker, fulfillment, worker_config).await
        }
        None => {
            let fulfillment = Arc::new(SimulatedFulfillment::new(config.work_delay));
            serve(store, broker, fulfillment, worker_config).await
        }
    }
}

async fn serve<F: Fulfillment + 'static>(
    store: Arc<PgOrderStore>,
    broker: Arc<PgmqBroker>,
    fulfillment: Arc<F>,
    worker_config: WorkerConfig,
) -> anyhow::Result<()> {
    let worker = Worker::new(store, broker, fulfillment, worker_config);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("shutdown requested");
        signal.cancel();
    });

    let summary = worker.run(shutdown).await?;
    tracing::info!(?summary, "worker exited");
    Ok(())
}

async fn cmd_order(
    store: Arc<PgOrderStore>,
    broker: Arc<PgmqBroker>,
    action: OrderAction,
) -> anyhow::Result<()> {
    let producer = Producer::new(Arc::clone(&store), broker);

    match action {
        OrderAction::Create { owner, url, count } => {
            match producer.submit(NewOrder::new(owner, url, count)).await? {
                SubmitResult::Queued(order) => {
                    println!("Created: {} (status: {})", order.identity, order.status);
                }
                SubmitResult::Unqueued { order, error } => {
                    println!(
                        "Created: {} (status: {}), not queued: {error}",
                        order.identity, order.status
                    );
                }
            }
        }
        OrderAction::Show { identity } => {
            let order = store.get(&OrderId::new(identity)).await?;
            print_order(&order);
        }
        OrderAction::List { owner } => {
            let orders = store.list_by_owner(&owner).await?;
            if orders.is_empty() {
                println!("No orders found.");
                return Ok(());
            }
            println!(
                "{:<8}  {:<10}  {:<5}  {:<40}  CREATED",
                "ID", "STATUS", "COUNT", "URL"
            );
            println!("{}", "-".repeat(90));
            for order in &orders {
                let url: String = order.url.chars().take(40).collect();
                println!(
                    "{:<8}  {:<10}  {:<5}  {:<40}  {}",
                    order.identity.short(),
                    order.status,
                    order.count,
                    url,
                    order.created_at.format("%Y-%m-%d %H:%M")
                );
            }
            println!("\n{} order(s)", orders.len());
        }
        OrderAction::Delete { identity } => {
            if producer.delete(&OrderId::new(identity.clone())).await? {
                println!("Deleted: {identity}");
            } else {
                anyhow::bail!("order {identity} is already deleted");
            }
        }
    }
    Ok(())
}

async fn cmd_reconcile(store: &PgOrderStore, broker: &PgmqBroker) -> anyhow::Result<()> {
    let report = reconcile(store, broker).await?;
    println!(
        "pending: {}  queued: {}  restored: {}",
        report.pending,
        report.queued,
        report.restored.len()
    );
    for id in &report.restored {
        println!("  {id}");
    }
    Ok(())
}

async fn cmd_queue(broker: &PgmqBroker, action: QueueAction) -> anyhow::Result<()> {
    match action {
        QueueAction::Show => {
            let queued = broker.snapshot().await?;
            for id in &queued {
                println!("{id}");
            }
            println!("\n{} queued in {}", queued.len(), broker.queue_name());
        }
        QueueAction::Purge => {
            let removed = broker.purge().await?;
            println!("Purged {removed} entr(ies) from {}", broker.queue_name());
        }
    }
    Ok(())
}

fn print_order(order: &Order) {
    println!("Identity:   {}", order.identity);
    println!("Owner:      {}", order.owner_identity);
    println!("URL:        {}", order.url);
    println!("Count:      {}", order.count);
    println!("Status:     {}", order.status);
    println!("Deleted:    {}", order.deleted);
    println!("Created:    {}", order.created_at);
    println!("Updated:    {}", order.updated_at);
}
