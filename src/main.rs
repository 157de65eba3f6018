use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use geo::Coord;

use nav_engine_rs::config::NavConfig;
use nav_engine_rs::routing::{route_from_json, OsrmClient};
use nav_engine_rs::session::NavigationSession;
use nav_engine_rs::types::RawFix;

#[derive(Parser, Debug)]
#[command(name = "nav_engine")]
#[command(about = "Replay a GPS fix log through a navigation session", long_about = None)]
struct Args {
    /// Path to a JSON array of fixes
    #[arg(long)]
    log: PathBuf,

    /// Routing service base URL
    #[arg(long, default_value = OsrmClient::PUBLIC_BASE_URL)]
    osrm_url: String,

    /// Canned route response JSON; skips the initial network route request
    #[arg(long)]
    route: Option<PathBuf>,

    /// Destination latitude (defaults to the last fix in the log)
    #[arg(long)]
    dest_lat: Option<f64>,

    /// Destination longitude (defaults to the last fix in the log)
    #[arg(long)]
    dest_lon: Option<f64>,

    /// JSON config override (partial overrides are fine)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the final status snapshot to this path
    #[arg(long)]
    status_out: Option<PathBuf>,
}

fn load_fixes(path: &PathBuf) -> Result<Vec<RawFix>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let fixes: Vec<RawFix> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing fix log {}", path.display()))?;
    Ok(fixes)
}

fn load_config(path: Option<&PathBuf>) -> Result<NavConfig> {
    match path {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            Ok(serde_json::from_reader(BufReader::new(file))?)
        }
        None => Ok(NavConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let fixes = load_fixes(&args.log)?;
    if fixes.is_empty() {
        bail!("fix log {} is empty", args.log.display());
    }
    let config = load_config(args.config.as_ref())?;

    println!("[{}] Navigation replay starting", ts_now());
    println!("  Log: {} ({} fixes)", args.log.display(), fixes.len());
    println!("  Routing service: {}", args.osrm_url);

    let backend = Arc::new(OsrmClient::new(args.osrm_url.clone()));
    let mut session = NavigationSession::new(backend, config);

    let origin = fixes[0].coord();
    let destination = match (args.dest_lat, args.dest_lon) {
        (Some(lat), Some(lon)) => Coord { x: lon, y: lat },
        _ => fixes[fixes.len() - 1].coord(),
    };

    match args.route.as_ref() {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let route = route_from_json(&json)
                .map_err(|e| anyhow::anyhow!("canned route rejected: {e}"))?;
            println!(
                "[{}] Canned route: {:.0}m, {:.0}s",
                ts_now(),
                route.total_distance_m,
                route.total_duration_s
            );
            session.start_with_route(route)?;
        }
        None => {
            println!(
                "[{}] Requesting route to {:.5},{:.5}",
                ts_now(),
                destination.y,
                destination.x
            );
            session.start(origin, destination).await?;
        }
    }

    let mut announcements = 0u64;
    let mut off_route_updates = 0u64;
    let mut last_state = String::new();

    for fix in &fixes {
        let status = session.process_fix(fix).await;

        if status.off_route {
            off_route_updates += 1;
        }
        if let Some(tier) = status.announcement {
            announcements += 1;
            let instruction = status.instruction.as_ref();
            println!(
                "[{}] ANNOUNCE {:?}: {} in {}",
                ts_now(),
                tier,
                instruction.map(|i| i.direction.as_text()).unwrap_or("?"),
                instruction
                    .map(|i| nav_engine_rs::status::format_distance(i.distance_to_maneuver_m))
                    .unwrap_or_default()
            );
        }
        if status.state != last_state {
            println!("[{}] State: {}", ts_now(), status.state);
            last_state = status.state.clone();
        }

        log::debug!(
            "fix t={:.1} -> {} remaining={} eta={}",
            fix.timestamp,
            status.state,
            status.remaining_distance_text,
            status.eta_text
        );

        if status.state == "arrived" {
            break;
        }
    }

    let final_status = session.snapshot();
    println!("\n=== Replay Summary ===");
    println!("State: {}", final_status.state);
    println!("Fixes processed: {}", final_status.fixes_processed);
    println!("Reroutes: {}", final_status.reroutes);
    println!("Announcements: {announcements}");
    println!("Off-route updates: {off_route_updates}");
    println!("Remaining: {}", final_status.remaining_distance_text);

    if let Some(path) = args.status_out.as_ref() {
        let json = serde_json::to_string_pretty(&final_status)?;
        std::fs::write(path, json)?;
        println!("Final status written to {}", path.display());
    }

    session.stop();
    Ok(())
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
