use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use navgate::audit;
use navgate::cli::{Cli, Commands};
use navgate::host::DetachedHost;
use navgate::policy::config::Settings;
use navgate::policy::engine::{Decision, PolicyEngine};
use navgate::store;
use navgate::web;
use tokio::sync::broadcast;

fn db_path() -> std::path::PathBuf {
    dirs_path().join("navgate.db")
}

fn dirs_path() -> std::path::PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let dir = std::path::PathBuf::from(home).join(".navgate");
    std::fs::create_dir_all(&dir).ok();
    dir
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { listen } => {
            cmd_start(&cli.config, &listen).await?;
        }
        Commands::Check { url } => {
            cmd_check(&cli.config, &url)?;
        }
        Commands::Show => {
            cmd_show(&cli.config)?;
        }
        Commands::Logs {
            tail,
            export,
            format,
        } => {
            cmd_logs(tail, export, &format)?;
        }
        Commands::Init => {
            cmd_init(&cli.config)?;
        }
    }

    Ok(())
}

async fn cmd_start(config_path: &Path, listen: &str) -> anyhow::Result<()> {
    let engine = Arc::new(PolicyEngine::new(Arc::new(DetachedHost)));

    // Defaults first, then the loaded snapshot; listeners attach only once
    // the load has been applied.
    let settings = store::load_or_default(config_path);
    engine.apply_settings(&settings);

    println!("navgate starting...");
    println!("Settings: {}", config_path.display());
    println!("Mode: {:?}", engine.mode());
    println!("Action: {:?}", engine.action());
    println!(
        "Rules: {} blacklisted, {} whitelisted",
        engine.blacklist().len(),
        engine.whitelist().len()
    );
    println!("Enabled: {}", engine.is_enabled());

    let pool = audit::open_pool(&db_path())?;
    let (event_tx, _) = broadcast::channel(64);
    let state = Arc::new(web::AppState {
        engine: engine.clone(),
        db: Some(pool),
        event_tx,
        settings_path: Some(config_path.to_path_buf()),
    });

    let _watcher = store::start_file_watcher(config_path.to_path_buf(), engine.clone())?;
    store::start_sighup_handler(config_path.to_path_buf(), engine.clone());

    let listen = listen.to_string();
    let serve_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = web::start(&listen, serve_state).await {
            tracing::error!("control API stopped: {e}");
        }
    });

    // Keep running until interrupted
    tokio::signal::ctrl_c().await?;
    println!("\nShutting down...");
    engine.disable();
    Ok(())
}

fn cmd_check(config_path: &Path, url: &str) -> anyhow::Result<()> {
    let engine = PolicyEngine::new(Arc::new(DetachedHost));
    let settings = store::load_or_default(config_path);
    engine.apply_settings(&settings);

    match engine.decide(url, chrono::Local::now()) {
        Decision::Noop => println!("{url}: allowed"),
        Decision::Intervene { action } => println!("{url}: intervene ({action:?})"),
    }
    Ok(())
}

fn cmd_show(config_path: &Path) -> anyhow::Result<()> {
    let settings = store::load_or_default(config_path);
    println!("Current settings ({})", config_path.display());
    println!("═══════════════════════════════════════");
    println!("Enabled: {}", settings.enabled);
    println!("Mode: {:?}", settings.mode);
    println!("Action: {:?}", settings.action);
    println!("Blacklist ({}):", settings.blacklist.len());
    for pattern in &settings.blacklist {
        println!("  {pattern}");
    }
    println!("Whitelist ({}):", settings.whitelist.len());
    for pattern in &settings.whitelist {
        println!("  {pattern}");
    }
    if settings.schedule.enabled {
        println!(
            "Schedule: {:?} {} - {}",
            settings.schedule.days, settings.schedule.time.start, settings.schedule.time.end
        );
    } else {
        println!("Schedule: disabled");
    }
    if !settings.redirect_url.is_empty() {
        println!("Redirect URL: {}", settings.redirect_url);
    }
    Ok(())
}

fn cmd_logs(tail: usize, export: bool, format: &str) -> anyhow::Result<()> {
    let db = db_path();
    if !db.exists() {
        println!("No decision database found. Run 'navgate start' first.");
        return Ok(());
    }

    let conn = audit::open_db(&db)?;

    if export {
        match format {
            "csv" => {
                let csv = audit::export::export_csv(&conn)?;
                print!("{csv}");
            }
            _ => {
                let json = audit::export::export_json(&conn)?;
                println!("{json}");
            }
        }
    } else {
        let records = audit::query_recent(&conn, tail)?;
        if records.is_empty() {
            println!("No decisions logged.");
        } else {
            println!(
                "{:<25} {:<40} {:<25} {:<16} {}",
                "TIMESTAMP", "URL", "HOST", "VERDICT", "REASON"
            );
            println!("{}", "─".repeat(120));
            for record in &records {
                println!(
                    "{:<25} {:<40} {:<25} {:<16} {}",
                    record.timestamp, record.url, record.host, record.verdict, record.reason
                );
            }
        }
    }
    Ok(())
}

fn cmd_init(config_path: &Path) -> anyhow::Result<()> {
    println!("Initializing navgate...");

    let data_dir = dirs_path();
    std::fs::create_dir_all(&data_dir)?;
    println!("  Created data dir: {}", data_dir.display());

    let db = db_path();
    audit::open_db(&db)?;
    println!("  Initialized database: {}", db.display());

    if !config_path.exists() {
        let default_settings = include_str!("../templates/default.toml");
        std::fs::write(config_path, default_settings)?;
        println!("  Created settings: {}", config_path.display());
    } else {
        println!("  Settings already exist: {}", config_path.display());
    }

    println!("\nDone! Next steps:");
    println!("  1. Edit the lists:  {}", config_path.display());
    println!("  2. Run the engine:  navgate start");
    println!("  3. Try a decision:  navgate check https://example.com/");
    Ok(())
}
