use std::sync::Arc;

use wallet_announcements::announcements::{DismissRecorder, RuleIdentifier};
use wallet_announcements::clock::SystemClock;
use wallet_announcements::config::{EngineConfig, SECS_PER_DAY};
use wallet_announcements::error::Result;
use wallet_announcements::store::{KeyValueStore, LibSqlBackend};

const USAGE: &str = "\
Usage: announcements <command> [rule-id]...

Commands:
  status [id]...     Show dismissal state (all stored rules if no ids given)
  dismiss <id>...    Record a dismissal now
  undismiss <id>...  Clear dismissals";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(command) = args.next() else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };
    let ids: Vec<RuleIdentifier> = args.map(RuleIdentifier::from).collect();

    let config = EngineConfig::from_env()?;
    let store = Arc::new(LibSqlBackend::new_local(&config.db_path).await?);
    let recorder = DismissRecorder::new(
        Arc::clone(&store) as Arc<dyn KeyValueStore>,
        Arc::new(SystemClock),
        config.default_window,
    );

    eprintln!("   Database: {}", config.db_path.display());
    eprintln!(
        "   Window: {} days\n",
        config.default_window.as_secs() / SECS_PER_DAY
    );

    match command.as_str() {
        "status" => {
            let ids = if ids.is_empty() {
                store
                    .list_keys()
                    .await?
                    .into_iter()
                    .map(RuleIdentifier::from)
                    .collect()
            } else {
                ids
            };
            if ids.is_empty() {
                println!("No dismissals recorded.");
            }
            let now = recorder.now();
            let window = recorder.window();
            for id in &ids {
                let entry = recorder.get(id).await;
                let state = if entry.is_dismissed(now, window) {
                    "dismissed"
                } else {
                    "visible"
                };
                let at = entry
                    .dismissed_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                let forever = if entry.dismissed_forever { " (forever)" } else { "" };
                println!("{id:<32} {state:<10} last dismissed: {at}{forever}");
            }
        }
        "dismiss" | "undismiss" if !ids.is_empty() => {
            for id in &ids {
                if command == "dismiss" {
                    recorder.dismiss(id).await?;
                } else {
                    recorder.undismiss(id).await?;
                }
                println!("{command}ed {id}");
            }
        }
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }

    Ok(())
}
