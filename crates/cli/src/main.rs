use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::debug;
use mapnote_core::geometry::{decode_coordinates, normalize_ring, validate_coordinates};
use mapnote_core::projection::{from_lon_lat, project_all};
use mapnote_core::session::gesture::is_drag;
use mapnote_core::session::{
    HeadlessSurface, MapSurface, NotificationLevel, Pixel, RecordRef, SessionController, Size,
};
use mapnote_core::{Config, GeometryKind, LonLat, MapNote, Settings, init, table};
use std::io;
use std::io::Write;
use std::time::Duration;

/// Zoom used while editing so that small moves still register as drags.
const EDIT_ZOOM: f64 = 22.0;

type Session = SessionController<HeadlessSurface>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Override the store URL defined in .env or settings
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Log more (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List stored records
    List {
        /// Only list one kind (point, line, polygon)
        #[arg(short, long)]
        kind: Option<GeometryKind>,
    },
    /// Show a single record
    Show { kind: GeometryKind, id: String },
    /// Save a new record
    Add {
        kind: GeometryKind,
        #[arg(short, long)]
        name: String,
        /// Vertices as lon1,lat1,lon2,lat2,...
        #[arg(short, long, allow_hyphen_values = true)]
        coords: String,
    },
    /// Rename a record
    Rename {
        kind: GeometryKind,
        id: String,
        name: String,
    },
    /// Move a point
    Move {
        id: String,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
    },
    /// Replace the vertices of a line or polygon
    Reshape {
        kind: GeometryKind,
        id: String,
        #[arg(short, long, allow_hyphen_values = true)]
        coords: String,
    },
    /// Delete a record
    Delete {
        kind: GeometryKind,
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long, default_value_t = false)]
        yes: bool,
    },
    /// Show or change saved settings
    Settings {
        /// Initial map center as lon,lat
        #[arg(long, allow_hyphen_values = true)]
        center: Option<String>,
        #[arg(long)]
        zoom: Option<f64>,
        /// Store URL to use instead of MAPNOTE_API_URL
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup
    init();
    let args = Args::parse();
    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Command::Settings { center, zoom, url } = &args.command {
        return update_settings(center.as_deref(), *zoom, url.clone());
    }

    let app = build_app(&args)?;
    debug!("using store at {}", app.config().api_base_url);

    // Every other command works on a live session
    let surface = HeadlessSurface::new(Size::new(1024.0, 768.0), Size::new(240.0, 120.0));
    let mut session = app
        .session(surface)
        .context("Failed to create the store client")?;
    let mut seen = 0;
    settle(&mut session, &mut seen)
        .await
        .context("Failed to load records")?;

    match args.command {
        Command::List { kind } => {
            let kinds = kind.map_or_else(|| GeometryKind::ALL.to_vec(), |k| vec![k]);
            for kind in kinds {
                session.query(kind);
                settle(&mut session, &mut seen).await?;
                let records = session.records(kind);
                if !records.is_empty() {
                    println!("{kind}");
                    print!("{}", table::render(&table::rows(records)));
                    println!();
                }
            }
        }
        Command::Show { kind, id } => {
            session.show(&RecordRef::new(kind, id));
            settle(&mut session, &mut seen).await?;
            if let Some(selection) = session.selection() {
                println!("{}", table::detail_text(&selection.record));
            }
        }
        Command::Add { kind, name, coords } => {
            let coordinates = normalize_ring(kind, decode_coordinates(&coords)?);
            validate_coordinates(kind, &coordinates).context("Invalid coordinates")?;
            add(&mut session, kind, &name, &coordinates)?;
            settle(&mut session, &mut seen).await?;
            println!("Saved {kind} {:?}", name.trim());
        }
        Command::Rename { kind, id, name } => {
            session.rename_record(RecordRef::new(kind, id), &name)?;
            settle(&mut session, &mut seen).await?;
            println!("Renamed to {:?}", name.trim());
        }
        Command::Move { id, lon, lat } => {
            let target = RecordRef::new(GeometryKind::Point, id);
            let destination = LonLat::new(lon, lat);
            destination.validate()?;
            if move_point(&mut session, &target, destination)? {
                settle(&mut session, &mut seen).await?;
                println!("Moved {target}");
            } else {
                println!("Position unchanged");
            }
        }
        Command::Reshape { kind, id, coords } => {
            let target = RecordRef::new(kind, id);
            let coordinates = decode_coordinates(&coords)?;
            session.begin_vertex_edit(&target)?;
            let marker = session
                .marker_of(&target)
                .context("Record is not displayed")?;
            session.on_vertex_drag_end(marker, project_all(&coordinates));
            settle(&mut session, &mut seen).await?;
            session.cancel_draft();
            println!("Reshaped {target}");
        }
        Command::Delete { kind, id, yes } => {
            let target = RecordRef::new(kind, id);
            session.delete_record(target.clone())?;
            if yes || confirm(&format!("Delete {target}?"))? {
                session.confirm_delete()?;
                settle(&mut session, &mut seen).await?;
                println!("Deleted {target}");
            } else {
                session.dismiss_delete();
                println!("Delete cancelled");
            }
        }
        Command::Settings { .. } => {}
    }

    Ok(())
}

/// Loads configuration and applies flag overrides.
fn build_app(args: &Args) -> Result<MapNote> {
    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(secs) = args.timeout {
        if secs == 0 {
            bail!("--timeout must be at least one second");
        }
        config.request_timeout = Duration::from_secs(secs);
    }

    let mut settings = Settings::load();
    if let Some(url) = &args.api_url {
        settings.api_url = Some(url.clone());
    }
    MapNote::with_settings(config, settings).context("Invalid store URL")
}

/// Places a draft the way a user would and submits it.
fn add(session: &mut Session, kind: GeometryKind, name: &str, coordinates: &[LonLat]) -> Result<()> {
    session.begin_add(kind);

    let mut last = Pixel::default();
    for position in coordinates {
        let at = from_lon_lat(*position);
        last = session.surface().pixel_for(at);
        session.on_map_click(at, last);
    }
    if kind.has_vertices() {
        session.finish_drawing(last)?;
    }
    session.commit_draft(name)?;
    Ok(())
}

/// Drags a point marker to `destination`. Returns `false` if it did not move.
fn move_point(session: &mut Session, target: &RecordRef, destination: LonLat) -> Result<bool> {
    session.begin_drag_update(target)?;
    let marker = session.marker_of(target).context("Record is not displayed")?;
    let origin = session
        .selection()
        .and_then(|s| s.record.position())
        .context("Selected record has no position")?;

    let start = from_lon_lat(origin);
    let end = from_lon_lat(destination);
    session.surface_mut().set_view(start, EDIT_ZOOM);
    let from = session.surface().pixel_for(start);
    let to = session.surface().pixel_for(end);
    if !is_drag(from, to) {
        session.cancel_draft();
        return Ok(false);
    }

    session.on_drag_end(marker, from, to, end);
    Ok(true)
}

/// Waits for outstanding requests and prints what the session reported.
///
/// Fails with the last error notification, if any arrived.
async fn settle(session: &mut Session, seen: &mut usize) -> Result<()> {
    session.settle().await;

    let mut failure = None;
    for notification in &session.notifications()[*seen..] {
        match notification.level {
            NotificationLevel::Info => println!("{}", notification.message),
            NotificationLevel::Error => failure = Some(notification.message.clone()),
        }
    }
    *seen = session.notifications().len();

    match failure {
        Some(message) => bail!(message),
        None => Ok(()),
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn update_settings(center: Option<&str>, zoom: Option<f64>, url: Option<String>) -> Result<()> {
    let mut settings = Settings::load();
    let changed = center.is_some() || zoom.is_some() || url.is_some();

    if let Some(center) = center {
        let position = match decode_coordinates(center)?.as_slice() {
            [position] => *position,
            _ => bail!("--center takes a single lon,lat pair"),
        };
        position.validate()?;
        settings.center = position;
    }
    if let Some(zoom) = zoom {
        if !(0.0..=28.0).contains(&zoom) {
            bail!("--zoom must be between 0 and 28");
        }
        settings.zoom = zoom;
    }
    if let Some(url) = url {
        // Validate before saving
        Config::builder().with_api_url(url.as_str()).build()?;
        settings.api_url = Some(url);
    }

    if changed {
        settings.save().context("Failed to save settings")?;
    }

    if let Some(path) = Settings::config_path() {
        println!("Settings file: {}", path.display());
    }
    println!("Center: {}, {}", settings.center.lon, settings.center.lat);
    println!("Zoom: {}", settings.zoom);
    match &settings.api_url {
        Some(url) => println!("Store URL: {url}"),
        None => println!("Store URL: (from environment)"),
    }
    Ok(())
}
