//! taskboard - Kanban task and employee board
//!
//! Role-gated task and employee management against a REST backend, with a
//! local audit log. `taskboard serve` runs a mock backend with the same
//! REST surface.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use taskboard::cli::{AuditCommand, Cli, Commands};
use taskboard::config::Config;
use taskboard::{api, commands, db};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("taskboard=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(url) = cli.api_url {
        cfg.api.base_url = url;
    }

    match cli.command {
        Commands::Serve { port, bind } => {
            // Override with CLI args
            if let Some(p) = port {
                cfg.server.port = p;
            }
            if let Some(b) = bind {
                cfg.server.bind = b;
            }

            run_server(cfg).await
        }

        Commands::Seed => {
            let db = db::Database::open(&cfg.database.path).context("Failed to open database")?;
            let (employees, tasks) = commands::seed_demo(&db)?;
            println!(
                "Seeded {} employees and {} tasks into {}",
                employees,
                tasks,
                cfg.database.path.display()
            );
            Ok(())
        }

        Commands::Init { output } => {
            let path = output.unwrap_or_else(|| PathBuf::from("config.toml"));
            Config::default().save_to(&path)?;

            println!("Created config file: {}", path.display());
            println!();
            println!("Next steps:");
            println!("  1. Start the backend: taskboard serve --config {}", path.display());
            println!("  2. Add demo data:     taskboard seed --config {}", path.display());
            println!("  3. Sign in:           taskboard employees list, then taskboard login <id>");

            Ok(())
        }

        Commands::Login { employee_id } => {
            let mut board = commands::open_board(&cfg)?;
            board.refresh().await?;
            let user = board.login(&employee_id)?;
            println!("Signed in as {} ({})", user.name, user.role);
            Ok(())
        }

        Commands::Logout => {
            let mut board = commands::open_board(&cfg)?;
            board.logout()?;
            println!("Signed out.");
            Ok(())
        }

        Commands::Whoami => {
            let board = commands::open_board(&cfg)?;
            commands::whoami(&board);
            Ok(())
        }

        Commands::Role { role } => {
            let mut board = commands::open_board(&cfg)?;
            board.switch_role(role)?;
            println!("Now acting as {}", role);
            Ok(())
        }

        Commands::Theme { theme } => {
            let mut board = commands::open_board(&cfg)?;
            board.set_theme(theme)?;
            println!("Theme set to {:?}", theme);
            Ok(())
        }

        Commands::Tasks(command) => {
            let mut board = commands::open_board(&cfg)?;
            board.refresh().await?;
            commands::tasks(&mut board, command).await
        }

        Commands::Employees(command) => {
            let mut board = commands::open_board(&cfg)?;
            board.refresh().await?;
            commands::employees(&mut board, command).await
        }

        Commands::Audit(command) => {
            let mut board = commands::open_board(&cfg)?;
            if matches!(command, AuditCommand::Restore { .. }) {
                board.refresh().await?;
            }
            commands::audit(&mut board, command).await
        }
    }
}

async fn run_server(config: Config) -> Result<()> {
    let db = db::Database::open(&config.database.path).context("Failed to open database")?;

    let state = api::AppState::new(db);
    let app = api::create_router(state);

    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("taskboard backend listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
