use blw::api::http::HttpBuildApi;
use blw::app::{Build, BuildState, WatchConfig, WatchTarget};
use blw::cli::Cli;
use blw::events::{LogPosition, LogView, WatchEvent};
#[cfg(feature = "desktop-notify")]
use blw::notify;
use blw::watcher::{BuildWatcher, WatcherHandle};

use clap::Parser;
use color_eyre::eyre::Result;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::sleep;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();

    if args.verbose {
        tracing_subscriber::fmt().with_writer(io::stderr).init();
    }

    let api = Arc::new(HttpBuildApi::new(&args.base_url));
    let target = WatchTarget {
        branch_id: args.branch_id,
        module_name: args.module.clone(),
        build_number: args.build,
    };
    let config = WatchConfig {
        log_refresh: Duration::from_secs(args.log_refresh),
        build_refresh: Duration::from_secs(args.build_refresh),
    };

    let (watcher, handle, events) = BuildWatcher::new(api, target, config);
    tokio::spawn(watcher.run());
    handle.load();

    let code = run_printer(&args, &handle, events).await?;
    std::process::exit(code)
}

/// Streams log bytes to stdout until the build reaches a terminal state.
/// Status lines and diagnostics go to stderr so the log stays pipeable.
async fn run_printer(
    args: &Cli,
    handle: &WatcherHandle,
    mut events: UnboundedReceiver<WatchEvent>,
) -> Result<i32> {
    let mut stdout = io::stdout();
    let mut printed_to: u64 = 0;
    let mut last_state: Option<BuildState> = None;
    // --from-start turns the window around to the top of the log before
    // anything is printed, then pages forward to catch up.
    let mut started_walk = false;
    let mut awaiting_top = false;
    let mut walking = false;

    loop {
        let Some(event) = events.recv().await else {
            return Ok(2);
        };
        let snapshot = match event {
            WatchEvent::Snapshot(snapshot) => snapshot,
            WatchEvent::Error(message) => {
                eprintln!("Error: {message}");
                return Ok(2);
            }
        };

        let state = snapshot.build.state;
        if last_state != Some(state) {
            eprintln!("{}", status_line(&snapshot.build));
            last_state = Some(state);
            #[cfg(feature = "desktop-notify")]
            if state.is_terminal() && !args.no_notify {
                notify::send_desktop(&snapshot.build);
            }
        }

        if state == BuildState::Unknown {
            eprintln!("unrecognized build state; giving up");
            return Ok(2);
        }
        if state.is_on_deck() {
            // Nothing to stream yet. Ask again after one build interval.
            sleep(Duration::from_secs(args.build_refresh)).await;
            handle.load();
            continue;
        }

        let Some(view) = snapshot.log.as_ref() else {
            continue;
        };

        if args.from_start && !started_walk {
            started_walk = true;
            awaiting_top = true;
            walking = true;
            handle.navigate(LogPosition::Top);
            continue;
        }
        if awaiting_top {
            if snapshot.position_change != Some(LogPosition::Top) {
                continue;
            }
            awaiting_top = false;
        }

        print_new_bytes(view, &mut printed_to, &mut stdout)?;

        if walking {
            if view.request_offset >= 0 && !view.end_of_log_loaded() {
                handle.fetch_next();
                continue;
            }
            walking = false;
            if state.is_active() {
                // Caught up with a build that is still running: go back to
                // the bottom, which also re-arms the log loop.
                handle.navigate(LogPosition::Bottom);
                continue;
            }
        }

        if state.is_terminal() {
            // A cancelled build's follow-up read may already be queued.
            while let Ok(extra) = events.try_recv() {
                if let WatchEvent::Snapshot(snapshot) = extra {
                    if let Some(view) = snapshot.log.as_ref() {
                        print_new_bytes(view, &mut printed_to, &mut stdout)?;
                    }
                }
            }
            return Ok(exit_code(state));
        }
    }
}

/// Writes the window bytes past `printed_to`, marking any range the window
/// skipped over. Offsets are bytes, so output goes out raw rather than
/// through string slicing.
fn print_new_bytes(
    view: &LogView,
    printed_to: &mut u64,
    out: &mut impl Write,
) -> io::Result<()> {
    if view.max_offset_loaded <= *printed_to {
        return Ok(());
    }
    let from = if *printed_to < view.min_offset_loaded {
        if view.min_offset_loaded > 0 {
            writeln!(out, "[... skipped to offset {}]", view.min_offset_loaded)?;
        }
        view.min_offset_loaded
    } else {
        *printed_to
    };
    let start = (from - view.min_offset_loaded) as usize;
    let bytes = view.text.as_bytes().get(start..).unwrap_or_default();
    out.write_all(bytes)?;
    out.flush()?;
    *printed_to = view.max_offset_loaded;
    Ok(())
}

/// Status line for stderr; builds that have finished carry their
/// wall-clock duration.
fn status_line(build: &Build) -> String {
    match (build.start_timestamp, build.end_timestamp) {
        (Some(start), Some(end)) => format!(
            "build #{} is {} ({})",
            build.build_number,
            build.state,
            format_duration(end.signed_duration_since(start).num_seconds())
        ),
        _ => format!("build #{} is {}", build.build_number, build.state),
    }
}

fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

fn exit_code(state: BuildState) -> i32 {
    match state {
        BuildState::Succeeded => 0,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn finished_build(secs: i64) -> Build {
        let start = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        Build {
            id: 7001,
            module_id: 11,
            repo_build_id: 501,
            build_number: 7,
            state: BuildState::Succeeded,
            start_timestamp: Some(start),
            end_timestamp: Some(start + chrono::Duration::seconds(secs)),
        }
    }

    #[test]
    fn status_line_of_finished_build_carries_duration() {
        let line = status_line(&finished_build(125));
        assert_eq!(line, "build #7 is succeeded (2m 5s)");
    }

    #[test]
    fn status_line_without_end_timestamp_is_bare() {
        let mut build = finished_build(0);
        build.state = BuildState::InProgress;
        build.end_timestamp = None;
        assert_eq!(status_line(&build), "build #7 is in progress");
    }

    #[test]
    fn format_duration_rolls_units() {
        assert_eq!(format_duration(-10), "0s");
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(125), "2m 5s");
        assert_eq!(format_duration(3725), "1h 2m");
    }
}
