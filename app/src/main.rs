mod cli;

use autotouch_core::{
    export_script_yaml, import_script_yaml, Jitter, JsonScriptStore, PlaybackController,
    PlaybackError, RecorderConfig, RecordingEvent, RecordingSession, SchedulerConfig,
    ScriptExecutor, ScriptRepository, SettingsProvider, SettingsStore, StorageError, StrokeSink,
};
use autotouch_platform::{start_pointer_hook, EnigoStrokeSink, NoopStrokeSink, PlatformError};
use clap::Parser;
use cli::{Cli, Commands, SettingsAction};
use crossbeam_channel::bounded;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("playback ended without reporting a summary")]
    NoSummary,
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "autotouch=info,autotouch_core=info,autotouch_platform=info".into()
            }),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let store: Arc<dyn ScriptRepository> = Arc::new(match &cli.scripts_dir {
        Some(dir) => JsonScriptStore::open(dir)?,
        None => JsonScriptStore::open_default()?,
    });
    let settings = Arc::new(match &cli.settings {
        Some(path) => SettingsStore::open(path)?,
        None => SettingsStore::open_default()?,
    });

    match cli.command {
        Commands::List { enabled } => list(store.as_ref(), enabled),
        Commands::Record { seconds, name } => record(store.as_ref(), seconds, name),
        Commands::Play {
            id,
            timeout,
            dry_run,
        } => {
            let timeout = timeout.map(Duration::from_secs);
            if dry_run {
                play(NoopStrokeSink, store, settings, &id, timeout)
            } else {
                play(EnigoStrokeSink::new()?, store, settings, &id, timeout)
            }
        }
        Commands::Settings { action } => update_settings(&settings, action),
        Commands::Enable { id, off } => {
            store.set_enabled(&id, !off)?;
            println!("{id}: shortcut {}", if off { "hidden" } else { "shown" });
            Ok(())
        }
        Commands::Delete { id } => {
            store.delete(&id)?;
            println!("Deleted {id}");
            Ok(())
        }
        Commands::Export { id } => {
            let script = store
                .get_by_id(&id)?
                .ok_or_else(|| StorageError::NotFound(id.clone()))?;
            print!("{}", export_script_yaml(&script)?);
            Ok(())
        }
        Commands::Import { file } => import(store.as_ref(), &file),
    }
}

fn list(store: &dyn ScriptRepository, enabled_only: bool) -> Result<(), AppError> {
    let scripts = if enabled_only {
        store.list_enabled()?
    } else {
        store.list_all()?
    };
    if scripts.is_empty() {
        println!("No scripts");
    }
    for script in scripts {
        let loops = match script.loop_count {
            0 => "forever".to_string(),
            n => format!("x{n}"),
        };
        println!(
            "{}  {}  [{} gestures, {}]{}",
            script.id,
            script.name,
            script.gesture_count(),
            loops,
            if script.is_enabled { " *" } else { "" }
        );
    }
    Ok(())
}

fn record(store: &dyn ScriptRepository, seconds: u64, name: Option<String>) -> Result<(), AppError> {
    let hook = start_pointer_hook()?;
    // The user's own input already reached the screen; nothing to replay.
    let mut session = RecordingSession::new(RecorderConfig {
        passthrough: false,
        ..RecorderConfig::default()
    });
    session.start();
    println!("Recording for {seconds}s...");

    let deadline = Instant::now() + Duration::from_secs(seconds);
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        let Some(gesture) = hook.recv_timeout(remaining) else {
            continue;
        };
        if let Some(RecordingEvent::ActionRecorded { action_count, kind }) =
            session.record_gesture(gesture)
        {
            println!("  #{action_count} {kind}");
        }
    }
    hook.stop();

    match session.save(store, name)? {
        RecordingEvent::Saved { script } => println!(
            "Saved \"{}\" ({}) with {} actions",
            script.name,
            script.id,
            script.actions.len()
        ),
        _ => println!("Nothing recorded"),
    }
    Ok(())
}

fn play<S: StrokeSink + 'static>(
    sink: S,
    store: Arc<dyn ScriptRepository>,
    settings: Arc<dyn SettingsProvider>,
    id: &str,
    timeout: Option<Duration>,
) -> Result<(), AppError> {
    let executor = ScriptExecutor::new(
        sink,
        settings,
        Arc::new(Jitter::new()),
        SchedulerConfig {
            emit_action_events: false,
            ..SchedulerConfig::default()
        },
    );
    let controller = PlaybackController::new(store, executor);

    let (done_tx, done_rx) = bounded(1);
    let run_id = controller.play_by_id(id, move |summary| {
        let _ = done_tx.send(summary.clone());
    })?;

    let summary = match timeout {
        Some(limit) => match done_rx.recv_timeout(limit) {
            Ok(summary) => summary,
            Err(_) => {
                info!(run_id, "timeout reached, stopping playback");
                controller.stop();
                done_rx.recv().map_err(|_| AppError::NoSummary)?
            }
        },
        None => done_rx.recv().map_err(|_| AppError::NoSummary)?,
    };

    println!(
        "{:?}: {} passes, {} gestures, {} rejected",
        summary.reason,
        summary.passes_completed,
        summary.gestures_dispatched,
        summary.dispatches_rejected
    );
    Ok(())
}

fn update_settings(settings: &SettingsStore, action: Option<SettingsAction>) -> Result<(), AppError> {
    if let Some(SettingsAction::Set {
        randomization,
        offset_radius,
        duration_variance,
        delay_variance,
    }) = action
    {
        if let Some(enabled) = randomization {
            settings.update_randomization_enabled(enabled)?;
        }
        if let Some(radius) = offset_radius {
            settings.update_click_offset_radius(radius)?;
        }
        if let Some(variance) = duration_variance {
            settings.update_click_duration_variance(variance)?;
        }
        if let Some(variance) = delay_variance {
            settings.update_delay_variance(variance)?;
        }
    }

    let current = settings.snapshot();
    println!("settings: {}", settings.path().display());
    print!("{}", serde_yaml::to_string(&current).map_err(StorageError::from)?);
    Ok(())
}

fn import(store: &dyn ScriptRepository, file: &Path) -> Result<(), AppError> {
    let yaml = std::fs::read_to_string(file).map_err(|source| AppError::Read {
        path: file.display().to_string(),
        source,
    })?;
    let script = import_script_yaml(&yaml)?;
    store.insert(&script)?;
    println!("Imported \"{}\" as {}", script.name, script.id);
    Ok(())
}
