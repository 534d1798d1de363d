mod cli;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use fleetlink::config::{FleetConfig, RequestConfig};
use fleetlink::controller::{
    Destination, DestinationKind, DeviceId, FleetClient, MapElementKind, RobotId,
};
use fleetlink::fleet::{Aggregator, FleetPoller, FleetSnapshot, PollState};

use crate::cli::Command;

fn initialize_tracing() {
    // Initialize tracing subscriber for human-readable logs
    tracing_subscriber::registry()
        .with(
            // Defaults, overridable through RUST_LOG
            EnvFilter::try_from_default_env().unwrap_or(
                EnvFilter::default()
                    .add_directive("info".parse().unwrap())
                    .add_directive("hyper=error".parse().unwrap())
                    .add_directive("reqwest=warn".parse().unwrap()),
            ),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE)
                .event_format(fmt::format().compact().with_target(false).without_time()),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    initialize_tracing();

    let cli = cli::parse();

    let mut config = FleetConfig::new(cli.endpoint.clone());
    if let Some(timeout) = cli.connect_timeout {
        config.request.connect_timeout = timeout;
    }
    if let Some(timeout) = cli.status_timeout {
        config.request.status_timeout = timeout;
    }
    if let Some(interval) = cli.poll_interval {
        config.request.poll_interval = interval;
    }
    let request = config.request.clone();

    let client = FleetClient::new(config.endpoint.clone(), &request)?;

    match cli.command {
        Command::Status => {
            let mut aggregator = Aggregator::new(client, request.status_deadline);
            let snapshot = aggregator.snapshot().await?;
            print_snapshot(&snapshot);
        }

        Command::Watch => watch(client, &request).await?,

        Command::Destinations { robot_id } => {
            let device = client.fetch_device_id().await?;
            let destinations = client.fetch_destinations(&device, &robot_id).await?;
            for destination in &destinations {
                println!("{:<24} {}", destination.name, destination.kind.label());
            }
        }

        Command::Deliver {
            robot_id,
            destination,
        } => {
            let device = client.fetch_device_id().await?;
            let ack = client
                .send_delivery_task(&device, &robot_id, &destination)
                .await?;
            if !ack.success {
                bail!("controller rejected the delivery task");
            }
            println!("delivery task to {destination:?} sent");
        }

        Command::DeliverMulti {
            robot_id,
            destinations,
        } => {
            let device = client.fetch_device_id().await?;
            let stops = resolve_tables(&client, &device, &robot_id, &destinations).await?;
            let ack = client
                .send_multi_delivery_task(&device, &robot_id, &stops)
                .await?;
            if !ack.success {
                bail!("controller rejected the delivery task");
            }
            println!("delivery task with {} stops sent", stops.len());
        }

        Command::Call {
            robot_id,
            destination,
        } => {
            let device = client.fetch_device_id().await?;
            let destination = resolve_destination(&client, &device, &robot_id, &destination).await?;
            let ack = client
                .send_robot_call(&device, &robot_id, &destination)
                .await?;
            if !ack.success {
                bail!("controller rejected the call");
            }
            println!("robot called to {:?}", destination.name);
        }

        Command::Cancel { robot_id } => {
            let device = client.fetch_device_id().await?;
            if !client.cancel_all_deliveries(&device, &robot_id).await? {
                bail!("controller did not cancel the deliveries");
            }
            println!("all deliveries cancelled");
        }

        Command::Complete { robot_id } => {
            let device = client.fetch_device_id().await?;
            if !client.force_complete_delivery(&device, &robot_id).await? {
                bail!("controller did not complete the delivery");
            }
            println!("delivery marked as completed");
        }

        Command::Map { robot_id } => {
            let device = client.fetch_device_id().await?;
            let elements = client.fetch_robot_map(&device, &robot_id).await?;
            print_map_summary(&elements);
        }
    }

    Ok(())
}

/// Runs the background poller and prints every published update until
/// interrupted.
async fn watch(client: FleetClient, request: &RequestConfig) -> Result<()> {
    let aggregator = Aggregator::new(client, request.status_deadline);
    let poller = FleetPoller::spawn(aggregator, request.poll_interval, request.poll_max_jitter);
    let mut rx = poller.subscribe();

    info!(
        "watching fleet every {:?}, press ctrl-c to stop",
        request.poll_interval
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = rx.borrow_and_update().clone();
                print_state(&state);
            }
        }
    }

    poller.shutdown();
    Ok(())
}

fn print_state(state: &PollState) {
    if let Some(error) = &state.error {
        println!("[cycle {}] poll failed: {error}", state.cycles);
        if state.snapshot.is_some() {
            println!("showing last known fleet state");
        }
    }
    if let Some(snapshot) = &state.snapshot {
        if state.error.is_none() {
            println!("[cycle {}]", state.cycles);
        }
        print_snapshot(snapshot);
    }
}

fn print_snapshot(snapshot: &FleetSnapshot) {
    if snapshot.is_empty() {
        println!("no robots in the fleet");
        return;
    }
    println!(
        "{:<20} {:<14} {:<10} {:>7}  ONLINE",
        "NAME", "ID", "STATUS", "BATTERY"
    );
    for (robot, state) in snapshot.iter() {
        println!(
            "{:<20} {:<14} {:<10} {:>6}%  {}",
            robot.name,
            robot.id,
            state.status.to_string(),
            state.battery,
            if robot.is_online { "yes" } else { "no" }
        );
    }
}

fn print_map_summary(elements: &[fleetlink::controller::MapElement]) {
    let tracks = elements
        .iter()
        .filter(|e| e.kind == MapElementKind::Track)
        .count();
    let cycles = elements
        .iter()
        .filter(|e| e.kind == MapElementKind::Cycle)
        .count();
    println!("{} map elements ({tracks} tracks, {cycles} cycles)", elements.len());

    for element in elements {
        if element.kind != MapElementKind::Source {
            continue;
        }
        let name = element.name.as_deref().unwrap_or("(unnamed)");
        let mode = element.mode.as_deref().unwrap_or("-");
        match element.vector.as_slice() {
            [x, y, ..] => println!("  {name:<24} {mode:<16} at ({x:.2}, {y:.2})"),
            _ => println!("  {name:<24} {mode:<16}"),
        }
    }
}

/// Looks a destination up by name in the robot's destination list.
async fn resolve_destination(
    client: &FleetClient,
    device: &DeviceId,
    robot: &RobotId,
    name: &str,
) -> Result<Destination> {
    let destinations = client.fetch_destinations(device, robot).await?;
    destinations
        .into_iter()
        .find(|destination| destination.name == name)
        .with_context(|| format!("destination {name:?} is not known to robot {robot}"))
}

/// Resolves multi-delivery stop names, restricted to table destinations
/// the way the dispatch surface expects.
async fn resolve_tables(
    client: &FleetClient,
    device: &DeviceId,
    robot: &RobotId,
    names: &[String],
) -> Result<Vec<Destination>> {
    let destinations = client.fetch_destinations(device, robot).await?;
    names
        .iter()
        .map(|name| {
            let found = destinations
                .iter()
                .find(|destination| &destination.name == name)
                .with_context(|| format!("destination {name:?} is not known to robot {robot}"))?;
            if found.kind != DestinationKind::Table {
                bail!("destination {name:?} is not a table");
            }
            Ok(found.clone())
        })
        .collect()
}
