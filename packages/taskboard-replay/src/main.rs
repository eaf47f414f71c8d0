/// Replays a recorded remote change feed (one JSON frame per line) through a
/// board session and prints the resulting board as JSON.
use std::path::PathBuf;
use std::sync::Arc;

use taskboard_core::clock::{Clock, SystemClock};
use taskboard_core::config::load_config;
use taskboard_core::{Board, BoardSession, RemoteEvent};

const USAGE: &str = "usage: taskboard-replay <feed.jsonl> [--config <path>] [--empty]";

#[derive(Debug, PartialEq)]
struct Args {
    feed: PathBuf,
    config: Option<PathBuf>,
    empty: bool,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut feed = None;
    let mut config = None;
    let mut empty = false;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = args.next().ok_or("--config needs a path")?;
                config = Some(PathBuf::from(path));
            }
            "--empty" => empty = true,
            other if other.starts_with("--") => return Err(format!("Unknown flag {}", other)),
            other => {
                if feed.replace(PathBuf::from(other)).is_some() {
                    return Err("Only one feed file can be replayed".into());
                }
            }
        }
    }
    let feed = feed.ok_or(USAGE)?;
    Ok(Args { feed, config, empty })
}

/// Default config path: ~/.config/taskboard/session.json
fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskboard")
        .join("session.json")
}

async fn run() -> Result<(), String> {
    let args = parse_args(std::env::args().skip(1))?;
    let config = load_config(&args.config.unwrap_or_else(default_config_path));
    let content = std::fs::read_to_string(&args.feed)
        .map_err(|e| format!("Failed to read {}: {}", args.feed.display(), e))?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let initial = if args.empty {
        Board::new()
    } else {
        Board::starter(clock.now())
    };
    let (session, channels) = BoardSession::new(initial, &config, clock);
    let running = tokio::spawn(session.run());

    let mut replayed = 0usize;
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match RemoteEvent::decode(line) {
            Ok(event) => {
                channels.handle.remote(event).await.map_err(|e| e.to_string())?;
                replayed += 1;
            }
            Err(e) => log::warn!("[taskboard.replay] Skipping line {}: {}", line_no + 1, e),
        }
    }
    drop(channels.handle);

    let board = running
        .await
        .map_err(|e| format!("Session task failed: {}", e))?;
    log::info!(
        "[taskboard.replay] Replayed {} events: {} columns, {} tasks",
        replayed,
        board.column_count(),
        board.task_count()
    );
    let json = serde_json::to_string_pretty(&*board).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = run().await {
        log::error!("[taskboard.replay] {}", e);
        std::process::exit(1);
    }
}
