use tokio::time::sleep;
use tracing::info;

use clap::Parser;

use warden::app_state::AppState;
use warden::http::setup_http_server;
use warden::init_telemetry;
use warden::services::cleanup::setup_cache_purge;
use warden::settings::config::Settings;

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Decides who may do what, and keeps their credentials honest")]
#[clap(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Parser)]
enum Commands {
    /// Show current configuration and exit
    Config,
    /// Start the warden server (default)
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let _ = dotenvy::from_filename(".env.local");

    let cli = Cli::parse();

    match cli.command.as_ref().unwrap_or(&Commands::Run) {
        Commands::Config => {
            let settings = Settings::new()?;
            println!("{:#?}", &settings);
            return Ok(());
        }
        Commands::Run => {
            // Continue with the normal server startup
        }
    }

    init_telemetry::init_telemetry_and_tracing()?;

    let mut handles = vec![];

    let app_state = AppState::new().await?;

    // Setup http server.
    {
        let handle =
            setup_http_server(app_state.clone(), &app_state.settings.api.bind_address).await?;
        handles.push(handle);
    }

    // Setup cache maintenance
    {
        let handle = setup_cache_purge(app_state.clone()).await?;
        handles.push(handle);
    }

    sleep(std::time::Duration::from_millis(100)).await;

    loop {
        // Remove and await completed handles
        handles.retain(|handle| !handle.is_finished());

        // Break the loop if no more handles are running
        if handles.is_empty() {
            info!("All tasks are done");
            break;
        }

        // Sleep for a short duration to avoid busy-waiting
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;
    }

    Ok(())
}
