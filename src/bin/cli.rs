use anyhow::{bail, Context, Result};
use heroctl::{Camera, ConnectionSession, HeroConfig, MediaStore, PreviewRelay};
use std::env;
use std::time::Duration;

fn usage() -> ! {
    eprintln!("Usage: heroctl [--config <path>] [--json] <command> [args]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  discover                      find the camera over USB/WiFi");
    eprintln!("  status                        connection and recording status");
    eprintln!("  photo [--delay <secs>]        take a single photo");
    eprintln!("  video start|stop              start/stop recording");
    eprintln!("  interval <secs>               interval capture until Ctrl-C");
    eprintln!("  set resolution <key>          5.3k, 4k, 2.7k, 1080, 720");
    eprintln!("  set fps <n>                   240, 120, 60, 30, 24");
    eprintln!("  media list|latest|local       browse media");
    eprintln!("  media download <dir> <file>   download one file");
    eprintln!("  media delete <dir> <file>     delete one file");
    eprintln!("  media delete-all              delete everything on the camera");
    eprintln!("  preview                       relay live preview until Ctrl-C");
    eprintln!("  keep-alive                    keep the camera awake");
    eprintln!("  power-off                     turn the camera off");
    #[cfg(feature = "ble")]
    eprintln!("  wake                          wake the WiFi radio over BLE");
    std::process::exit(1);
}

struct Cli {
    config: HeroConfig,
    json: bool,
    args: Vec<String>,
}

fn parse_cli() -> Result<Cli> {
    let raw: Vec<String> = env::args().skip(1).collect();
    let mut json = false;
    let mut config_path = None;
    let mut args = Vec::new();

    let mut i = 0;
    while i < raw.len() {
        match raw[i].as_str() {
            "--json" => json = true,
            "--config" => {
                i += 1;
                config_path = Some(raw.get(i).cloned().context("--config needs a path")?);
            }
            other => args.push(other.to_string()),
        }
        i += 1;
    }

    let config = match config_path {
        Some(path) => HeroConfig::load_from_file(path)?,
        None => HeroConfig::load_or_default(),
    };
    if let Err(e) = config.validate() {
        bail!("invalid configuration: {}", e);
    }

    Ok(Cli { config, json, args })
}

#[tokio::main]
async fn main() -> Result<()> {
    heroctl::init_logging();

    let cli = parse_cli()?;
    if cli.args.is_empty() {
        usage();
    }

    let session = ConnectionSession::new(&cli.config.camera)?;
    let camera = Camera::new(session.clone(), &cli.config.capture);

    match cli.args[0].as_str() {
        "discover" => cmd_discover(&cli, &session).await,
        "status" => cmd_status(&cli, &camera).await,
        "photo" => cmd_photo(&cli, &camera).await,
        "video" => cmd_video(&cli, &camera).await,
        "interval" => cmd_interval(&cli, &camera).await,
        "set" => cmd_set(&cli, &camera).await,
        "media" => cmd_media(&cli, &session).await,
        "preview" => cmd_preview(&cli, &session).await,
        "keep-alive" => {
            if !session.keep_alive().await {
                bail!("keep-alive failed");
            }
            println!("OK");
            Ok(())
        }
        "power-off" => {
            if !camera.power_off().await {
                bail!("power-off failed");
            }
            println!("OK");
            Ok(())
        }
        #[cfg(feature = "ble")]
        "wake" => {
            heroctl::ble::wake_wifi(Duration::from_secs(10)).await?;
            println!("WiFi radio wake sent; look for the camera network now");
            Ok(())
        }
        _ => usage(),
    }
}

async fn cmd_discover(cli: &Cli, session: &ConnectionSession) -> Result<()> {
    if !session.connect().await {
        bail!("camera not found; check USB mode or join the camera's WiFi network");
    }
    let info = session.info().await;
    if cli.json {
        println!("{}", serde_json::to_string(&info)?);
    } else {
        println!(
            "Connected via {} at {}",
            info.transport.map(|t| t.to_string()).unwrap_or_default(),
            info.address.unwrap_or_default()
        );
    }
    Ok(())
}

async fn cmd_status(cli: &Cli, camera: &Camera) -> Result<()> {
    let status = camera.status().await;
    let info = camera.session().info().await;
    if cli.json {
        println!(
            "{}",
            serde_json::json!({ "session": info, "status": status })
        );
    } else {
        println!(
            "connected: {}  recording: {}  address: {}",
            status.connected,
            status.recording,
            info.address.unwrap_or_else(|| "-".to_string())
        );
    }
    Ok(())
}

async fn cmd_photo(cli: &Cli, camera: &Camera) -> Result<()> {
    let mut delay = 0u64;
    let mut i = 1;
    while i < cli.args.len() {
        if cli.args[i] == "--delay" {
            i += 1;
            delay = cli
                .args
                .get(i)
                .context("--delay needs seconds")?
                .parse()
                .context("invalid delay")?;
        }
        i += 1;
    }

    if delay > 0 {
        println!("Taking photo in {}s...", delay);
        tokio::time::sleep(Duration::from_secs(delay)).await;
    }
    if !camera.take_photo().await {
        bail!("photo failed");
    }
    println!("Photo taken");
    Ok(())
}

async fn cmd_video(cli: &Cli, camera: &Camera) -> Result<()> {
    match cli.args.get(1).map(String::as_str) {
        Some("start") => {
            if !camera.start_video().await {
                bail!("failed to start recording");
            }
            println!("Recording");
            Ok(())
        }
        Some("stop") => {
            if !camera.stop_video().await {
                bail!("failed to stop recording");
            }
            println!("Recording stopped");
            Ok(())
        }
        _ => usage(),
    }
}

async fn cmd_interval(cli: &Cli, camera: &Camera) -> Result<()> {
    let secs: u64 = match cli.args.get(1) {
        Some(s) => s.parse().context("invalid interval")?,
        None => cli.config.capture.default_interval_secs,
    };

    camera
        .start_interval(Duration::from_secs(secs), |ok| {
            if ok {
                println!("Photo taken");
            } else {
                eprintln!("Shot failed");
            }
        })
        .await?;
    println!("Interval capture every {}s; Ctrl-C to stop", secs);

    tokio::signal::ctrl_c().await?;
    camera.stop_interval().await;
    println!("Stopped");
    Ok(())
}

async fn cmd_set(cli: &Cli, camera: &Camera) -> Result<()> {
    match (cli.args.get(1).map(String::as_str), cli.args.get(2)) {
        (Some("resolution"), Some(key)) => {
            camera.set_resolution(key).await?;
            println!("Resolution set to {}", key);
            Ok(())
        }
        (Some("fps"), Some(value)) => {
            let fps: u32 = value.parse().context("invalid fps")?;
            camera.set_fps(fps).await?;
            println!("FPS set to {}", fps);
            Ok(())
        }
        _ => usage(),
    }
}

async fn cmd_media(cli: &Cli, session: &ConnectionSession) -> Result<()> {
    let store = MediaStore::new(session.clone(), &cli.config.storage.download_dir)?;

    match cli.args.get(1).map(String::as_str) {
        Some("list") => {
            let entries = store.list().await;
            if cli.json {
                println!("{}", serde_json::to_string(&entries)?);
            } else {
                for entry in &entries {
                    println!(
                        "{}/{}  {} bytes",
                        entry.directory, entry.filename, entry.size
                    );
                }
                println!("{} file(s)", entries.len());
            }
            Ok(())
        }
        Some("latest") => {
            let latest = store.latest().await;
            if cli.json {
                println!("{}", serde_json::to_string(&latest)?);
            } else {
                match latest {
                    Some(entry) => println!("{}/{}", entry.directory, entry.filename),
                    None => println!("No media on camera"),
                }
            }
            Ok(())
        }
        Some("local") => {
            for name in store.local_files() {
                println!("{}", name);
            }
            Ok(())
        }
        Some("download") => {
            let dir = cli.args.get(2).context("download needs <dir> <file>")?;
            let file = cli.args.get(3).context("download needs <dir> <file>")?;
            let mut print_progress = |pct: f64| {
                eprint!("\r{:>5.1}%", pct);
            };
            match store.download(dir, file, Some(&mut print_progress)).await {
                Some(path) => {
                    eprintln!();
                    println!("Saved to {}", path.display());
                    Ok(())
                }
                None => bail!("download failed"),
            }
        }
        Some("delete") => {
            let dir = cli.args.get(2).context("delete needs <dir> <file>")?;
            let file = cli.args.get(3).context("delete needs <dir> <file>")?;
            if !store.delete_file(dir, file).await {
                bail!("delete failed");
            }
            println!("Deleted {}/{}", dir, file);
            Ok(())
        }
        Some("delete-all") => {
            if !store.delete_all().await {
                bail!("delete-all failed");
            }
            println!("All media deleted");
            Ok(())
        }
        _ => usage(),
    }
}

async fn cmd_preview(cli: &Cli, session: &ConnectionSession) -> Result<()> {
    let relay = PreviewRelay::new(session.clone(), &cli.config.preview);
    relay.start().await?;
    println!("Preview playlist: {}", relay.playlist_path().display());
    println!("Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    relay.stop().await?;
    Ok(())
}
