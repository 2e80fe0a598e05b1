//! segue CLI: headless driver for the segue playback engine.
//!
//! Audio is simulated by the in-memory backend; session state persists
//! under `$SEGUE_ROOT` (default `~/.segue`) between invocations.
//!
//! Commands:
//!   segue now                   Show the session as JSON
//!   segue load <start> <id...>  Replace the queue and play from `start`
//!   segue play <id>             Play one track, keeping the queue
//!   segue toggle                Toggle play/pause
//!   segue next                  Skip forward
//!   segue prev                  Skip backward
//!   segue seek <seconds>        Seek to position
//!   segue volume <0-100>        Set volume
//!   segue loop                  Cycle loop mode (none, queue, track)
//!   segue shuffle               Toggle shuffle
//!   segue enqueue <id>          Play `id` next
//!   segue tick <seconds>        Let simulated playback run (shell only)
//!   segue end                   Finish the current track (shell only)
//!   segue reset                 Forget everything
//!   segue shell                 Read commands from stdin, one per line
//!
//! Each invocation starts a fresh simulated backend with nothing loaded, so
//! `tick` and `end` only have an effect inside `shell`, after a track has
//! been started in the same session.

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use segue_core::{
    CollectingSink, Direction, Engine, MemoryBackend, PlaybackCommand, SessionConfig, TrackId,
};

const SETTLE: Duration = Duration::from_secs(2);

struct Cli {
    engine: Engine,
    backend: Arc<MemoryBackend>,
    sink: Arc<CollectingSink>,
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        print_usage();
        return;
    }

    let mut config = match SessionConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("segue: {}", e);
            std::process::exit(2);
        }
    };
    // State root defaults to ~/.segue
    if config.state_root.is_none() {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        config.state_root = Some(format!("{}/.segue", home).into());
    }

    let backend = Arc::new(MemoryBackend::new());
    let sink = Arc::new(CollectingSink::new());
    let engine = match Engine::open(config, backend.clone(), sink.clone(), None) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("segue: failed to open session: {}", e);
            std::process::exit(1);
        }
    };
    engine.start();

    let cli = Cli { engine, backend, sink };
    if args[0] == "shell" {
        cmd_shell(&cli);
    } else {
        run(&cli, &args);
    }

    cli.engine.shutdown();
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Run one command line. Returns false when the caller should stop.
fn run(cli: &Cli, args: &[String]) -> bool {
    let Some(name) = args.first() else {
        return true;
    };
    let rest = &args[1..];

    match name.as_str() {
        "now" => {}
        "load" => cmd_load(cli, rest),
        "play" => match parse_id(rest) {
            Some(id) => send(cli, PlaybackCommand::SetTrack { id }),
            None => eprintln!("usage: segue play <id>"),
        },
        "toggle" => send(cli, PlaybackCommand::TogglePlayPause),
        "next" => send(cli, PlaybackCommand::Skip { direction: Direction::Forward }),
        "prev" => send(cli, PlaybackCommand::Skip { direction: Direction::Backward }),
        "seek" => cmd_seek(cli, rest),
        "volume" => cmd_volume(cli, rest),
        "loop" => send(cli, PlaybackCommand::CycleLoop),
        "shuffle" => send(cli, PlaybackCommand::Shuffle),
        "enqueue" => match parse_id(rest) {
            Some(id) => send(cli, PlaybackCommand::EnqueueNext { id }),
            None => eprintln!("usage: segue enqueue <id>"),
        },
        "tick" => cmd_tick(cli, rest),
        "end" => {
            if let Some(signal) = cli.backend.finish() {
                cli.engine.signal(signal).ok();
            }
        }
        "reset" => send(cli, PlaybackCommand::Reset),
        "quit" | "exit" => return false,
        other => {
            eprintln!("unknown command: {}", other);
            print_usage();
            return true;
        }
    }

    if !cli.engine.settle(SETTLE) {
        eprintln!("segue: engine did not settle");
    }
    for note in cli.sink.drain() {
        eprintln!("{}", note);
    }
    print_view(cli);
    true
}

fn cmd_shell(cli: &Cli) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let words: Vec<String> = line.split_whitespace().map(String::from).collect();
        if !run(cli, &words) {
            break;
        }
    }
}

fn cmd_load(cli: &Cli, args: &[String]) {
    let start = args.first().and_then(|s| s.parse::<usize>().ok());
    let tracks: Option<Vec<TrackId>> = args
        .iter()
        .skip(1)
        .map(|s| s.parse::<u32>().ok().map(TrackId))
        .collect();
    match (start, tracks) {
        (Some(start), Some(tracks)) if !tracks.is_empty() => {
            send(cli, PlaybackCommand::LoadContext { tracks, start })
        }
        _ => eprintln!("usage: segue load <start> <id> [id...]"),
    }
}

fn cmd_seek(cli: &Cli, args: &[String]) {
    match args.first().and_then(|s| s.parse::<f64>().ok()) {
        Some(position) => send(cli, PlaybackCommand::SetProgress { position, held: false }),
        None => eprintln!("usage: segue seek <seconds>"),
    }
}

fn cmd_volume(cli: &Cli, args: &[String]) {
    match args.first().and_then(|s| s.parse::<u32>().ok()) {
        Some(v) => {
            let volume = (v.min(100) as f32) / 100.0;
            send(cli, PlaybackCommand::SetVolume { volume });
        }
        None => eprintln!("usage: segue volume <0-100>"),
    }
}

fn cmd_tick(cli: &Cli, args: &[String]) {
    let Some(seconds) = args.first().and_then(|s| s.parse::<f64>().ok()) else {
        eprintln!("usage: segue tick <seconds>");
        return;
    };
    for signal in cli.backend.advance(seconds) {
        cli.engine.signal(signal).ok();
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn send(cli: &Cli, cmd: PlaybackCommand) {
    if let Err(e) = cli.engine.command(cmd) {
        eprintln!("segue: {}", e);
    }
}

fn parse_id(args: &[String]) -> Option<TrackId> {
    args.first()?.parse::<u32>().ok().map(TrackId)
}

fn print_view(cli: &Cli) {
    let view = cli.engine.view();
    match serde_json::to_string_pretty(&view) {
        Ok(json) => println!("{}", json),
        Err(e) => log::warn!("segue: could not render session: {}", e),
    }
}

fn print_usage() {
    println!("segue - headless playback session driver");
    println!();
    println!("usage: segue <command> [args]");
    println!();
    println!("commands:");
    println!("  now                    Show the session as JSON");
    println!("  load <start> <id...>   Replace the queue and play from index <start>");
    println!("  play <id>              Play one track, keeping the queue");
    println!("  toggle                 Toggle play/pause");
    println!("  next                   Skip forward");
    println!("  prev                   Skip backward");
    println!("  seek <seconds>         Seek to position");
    println!("  volume <0-100>         Set volume");
    println!("  loop                   Cycle loop mode (none, queue, track)");
    println!("  shuffle                Toggle shuffle");
    println!("  enqueue <id>           Play <id> next");
    println!("  tick <seconds>         Let simulated playback run (shell only)");
    println!("  end                    Finish the current track (shell only)");
    println!("  reset                  Forget everything");
    println!("  shell                  Read commands from stdin, one per line");
}
