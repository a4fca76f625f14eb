//! `fibernet` command line tool

use anyhow::{bail, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use fibernet_core::{
    telemetry, EventLog, InMemoryNotifier, InMemoryRouteNetwork, LogError, ServiceConfig, UtilityNetworkService,
};
use fibernet_graph::{OutageViewNode, TracePath};
use fibernet_model::RouteNodeId;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

fn path_arg() -> Arg {
    Arg::new("path")
        .long("path")
        .required(true)
        .help("Path to a saved event log (JSON)")
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON")
}

fn uuid_arg(args: &ArgMatches, name: &str) -> Result<Uuid> {
    let raw = args
        .get_one::<String>(name)
        .with_context(|| format!("--{name} is required"))?;
    Uuid::parse_str(raw).with_context(|| format!("--{name} is not a uuid: {raw}"))
}

fn load_service(args: &ArgMatches, config: ServiceConfig) -> Result<UtilityNetworkService> {
    let path = args.get_one::<String>("path").context("--path is required")?;
    let log = EventLog::load(path).with_context(|| format!("failed to load event log {path}"))?;
    let service = UtilityNetworkService::from_event_log(
        config,
        log,
        Arc::new(InMemoryRouteNetwork::new()),
        Arc::new(InMemoryNotifier::new()),
    )?;
    Ok(service)
}

fn print_path(label: &str, path: &TracePath, indent: usize) {
    for hop in &path.hops {
        println!(
            "{:indent$}{label} {:>3}  {:<32} {}  {:.1} m",
            "",
            hop.hop_seq_no,
            hop.equipment_name.as_deref().unwrap_or("-"),
            hop.element_id,
            hop.total_length_m,
        );
    }
    for branch in &path.branches {
        print_path(label, branch, indent + 2);
    }
    if path.truncated {
        println!("{:indent$}{label} ... truncated", "");
    }
}

fn print_outage(node: &OutageViewNode, depth: usize) {
    let indent = depth * 2;
    match &node.description {
        Some(description) => println!("{:indent$}{} ({description})", "", node.label),
        None => println!("{:indent$}{}", "", node.label),
    }
    for child in &node.nodes {
        print_outage(child, depth + 1);
    }
}

fn cli() -> Command {
    Command::new("fibernet")
        .version(fibernet_core::VERSION)
        .about("Fiber network inventory tools over a saved event log")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .help("Path to a TOML service configuration"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("verify-log")
                .about("Verify the hash chain of an event log")
                .arg(path_arg())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("stats")
                .about("Rebuild the projection and print counters")
                .arg(path_arg())
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("trace")
                .about("Trace a terminal or span segment in both directions")
                .arg(path_arg())
                .arg(Arg::new("route-node").long("route-node").required(true))
                .arg(
                    Arg::new("start")
                        .long("start")
                        .required(true)
                        .help("Terminal or span segment id"),
                )
                .arg(
                    Arg::new("fan-out")
                        .long("fan-out")
                        .action(ArgAction::SetTrue)
                        .help("Follow every splitter output"),
                )
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("outage")
                .about("Print what loses service downstream of a node or equipment")
                .arg(path_arg())
                .arg(Arg::new("route-node").long("route-node").required(true))
                .arg(Arg::new("equipment").long("equipment").help("Root equipment id"))
                .arg(json_arg()),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    run(&cli().get_matches()).await
}

async fn run(matches: &ArgMatches) -> Result<()> {
    let config = match matches.get_one::<String>("config") {
        Some(path) => ServiceConfig::from_file(path).with_context(|| format!("failed to load config {path}"))?,
        None => ServiceConfig::default(),
    };
    telemetry::init(&config.log_filter, config.log_json);

    match matches.subcommand() {
        Some(("verify-log", args)) => {
            let path = args.get_one::<String>("path").context("--path is required")?;
            let (valid, detail) = match EventLog::load(path) {
                Ok(log) => {
                    let report = log.verify_integrity();
                    (report.valid, format!("{} events checked", report.events_checked))
                }
                Err(LogError::IntegrityViolation { sequence }) => (false, format!("broken at sequence {sequence}")),
                Err(err) => return Err(err).with_context(|| format!("failed to read {path}")),
            };
            if args.get_flag("json") {
                println!("{}", serde_json::json!({ "valid": valid, "detail": detail }));
            } else {
                println!("Log integrity: {}", if valid { "VALID" } else { "INVALID" });
                println!("{detail}");
            }
            if !valid {
                bail!("event log {path} failed the integrity check: {detail}");
            }
        }
        Some(("stats", args)) => {
            let service = load_service(args, config)?;
            let stats = service.stats();
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Events applied:      {}", stats.applied_events);
                println!("Span equipment:      {}", stats.span_equipment);
                println!("Node containers:     {}", stats.node_containers);
                println!("Terminal equipment:  {}", stats.terminal_equipment);
                println!("Terminal connections: {}", stats.terminal_connections);
                println!("Graph:               {} nodes, {} edges", stats.graph_nodes, stats.graph_edges);
            }
        }
        Some(("trace", args)) => {
            let route_node_id = RouteNodeId::from(uuid_arg(args, "route-node")?);
            let start = uuid_arg(args, "start")?;
            let fan_out = args.get_flag("fan-out").then_some(true);
            let service = load_service(args, config)?;
            let trace = service.get_connectivity_trace_view(route_node_id, start, fan_out)?;
            info!(start = %start, hops = trace.downstream.hop_count() + trace.upstream.hop_count(), "trace done");

            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&trace)?);
            } else {
                print_path("up", &trace.upstream, 0);
                println!(
                    "at   0  {:<32} {}",
                    trace.origin.equipment_name.as_deref().unwrap_or("-"),
                    trace.origin.element_id
                );
                print_path("dn", &trace.downstream, 0);
            }
        }
        Some(("outage", args)) => {
            let route_node_id = RouteNodeId::from(uuid_arg(args, "route-node")?);
            let root = match args.get_one::<String>("equipment") {
                Some(_) => Some(uuid_arg(args, "equipment")?),
                None => None,
            };
            let service = load_service(args, config)?;
            let view = service.get_outage_view(route_node_id, root)?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_outage(&view, 0);
                println!("{} installations", view.installation_count());
            }
        }
        Some((other, _)) => bail!("unknown subcommand {other}"),
        None => bail!("a subcommand is required"),
    }
    Ok(())
}
