//! Grid Simulator
//!
//! Builds a container grid, registers nodes from concurrent writers (every
//! writer races to register every node, so first-writer-wins is visible in
//! the logs), requests a target size for every group, applies the resulting
//! rebalance plan and prints the plan and registry statistics as JSON.

use clap::Parser;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use container_grid::{
    BroadcastListener, ContainerGroup, ContainerNode, Error, GridConfig, GridEvent,
    GroupsEvent, ManagedContainerGridGroups, Result, TargetSizeStrategy,
};

type Grid = ManagedContainerGridGroups<ContainerNode, ContainerGroup, TargetSizeStrategy>;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Grid Simulator - exercise the container grid registry
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML file with the registry configuration
    #[arg(long, env = "GRID_CONFIG")]
    config: Option<String>,

    /// Number of nodes to register
    #[arg(long, env = "GRID_NODES", default_value = "12")]
    nodes: usize,

    /// Number of groups to create
    #[arg(long, env = "GRID_GROUPS", default_value = "3")]
    groups: usize,

    /// Target size requested for every group
    #[arg(long, env = "GRID_GROUP_SIZE", default_value = "4")]
    group_size: usize,

    /// Number of concurrent writers registering nodes
    #[arg(long, env = "GRID_WRITERS", default_value = "4")]
    writers: usize,

    /// Refuse adding a node to a second group
    #[arg(long, env = "GRID_EXCLUSIVE")]
    exclusive: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    info!("Starting grid simulator");
    info!("  Version: {}", container_grid::VERSION);
    info!("  Nodes: {}", args.nodes);
    info!("  Groups: {}", args.groups);
    info!("  Target group size: {}", args.group_size);
    info!("  Writers: {}", args.writers);

    let mut config = match &args.config {
        Some(path) => GridConfig::from_file(path)?,
        None => GridConfig::default(),
    };
    if args.exclusive {
        config.exclusive_membership = true;
    }
    config.validate()?;

    let grid: Arc<Grid> = Arc::new(ManagedContainerGridGroups::with_config(
        &config,
        TargetSizeStrategy::new(),
    ));

    // Log every event
    grid.add_grid_listener(Arc::new(|event: &GridEvent<ContainerNode>| -> Result<()> {
        info!(event = event.kind(), "{}", serde_json::to_string(event)?);
        Ok(())
    }));
    grid.add_groups_listener(Arc::new(
        |event: &GroupsEvent<ContainerNode, ContainerGroup>| -> Result<()> {
            info!(event = event.kind(), "{}", serde_json::to_string(event)?);
            Ok(())
        },
    ));

    // Count membership events asynchronously
    let broadcast = Arc::new(BroadcastListener::<GroupsEvent<ContainerNode, ContainerGroup>>::new(1024));
    let mut events = broadcast.subscribe();
    grid.add_groups_listener(broadcast.clone());
    let counter = tokio::spawn(async move {
        let mut membership_events = 0usize;
        loop {
            match events.recv().await {
                Ok(event) if event.is_membership_event() => membership_events += 1,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!("Event counter lagged by {} events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
        membership_events
    });

    for g in 0..args.groups {
        grid.add_group(ContainerGroup::new(format!("group-{g}")))?;
    }

    // Every writer races to register every node
    let mut handles = Vec::with_capacity(args.writers);
    for writer in 0..args.writers {
        let grid = grid.clone();
        let nodes = args.nodes;
        handles.push(tokio::spawn(async move {
            let mut won = 0usize;
            for n in 0..nodes {
                let node = ContainerNode::new(format!("node-{n:03}"))
                    .with_hostname(format!("host-{n:03}.local"))
                    .with_label("writer", writer.to_string());
                if grid.add_node(node)? {
                    won += 1;
                }
            }
            Ok::<_, Error>(won)
        }));
    }
    let mut registered = 0;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| Error::Internal(format!("Writer task failed: {}", e)))??;
        registered += won;
    }
    info!("Registered {} nodes from {} writers", registered, args.writers);

    for group_id in grid.group_ids() {
        if !grid.set_group_size(&group_id, args.group_size) {
            error!("Resize of {} was rejected", group_id);
        }
    }

    let Some(plan) = grid.groups_rebalance_data() else {
        return Err(Error::Internal("No rebalance data available".into()));
    };
    println!("{}", serde_json::to_string_pretty(&plan)?);

    let applied = plan.apply(&**grid)?;
    info!("Applied {} membership changes", applied);

    if let Some(follow_up) = grid.groups_rebalance_data() {
        info!(
            "Converged: {} ({} changes outstanding)",
            follow_up.is_converged(),
            follow_up.total_moves()
        );
    }

    println!("{}", serde_json::to_string_pretty(&grid.stats())?);

    // Close the channel so the counter finishes
    drop(broadcast);
    drop(grid);
    let membership_events = counter
        .await
        .map_err(|e| Error::Internal(format!("Event counter failed: {}", e)))?;
    info!("Observed {} membership events", membership_events);

    info!("Simulation complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive(
            "dashmap=warn"
                .parse()
                .map_err(|e| Error::Configuration(format!("Invalid log directive: {}", e)))?,
        );

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}
