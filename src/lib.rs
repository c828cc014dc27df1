pub mod camera;
pub mod capture;
pub mod cli;
pub mod error;
pub mod gate;
pub mod journal;
pub mod kiosk;
pub mod matching;
pub mod models;
pub mod notice;
pub mod presenter;
pub mod server;
pub mod settings;
pub mod submit;
pub mod utils;
pub mod workflow;

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{info, warn};

use camera::{CameraSource, StillImageCamera};
use capture::FrameCapturer;
use cli::{Cli, Command, SelectionArgs};
use journal::AttemptJournal;
use kiosk::Kiosk;
use models::{resolve_delay, resolve_delay_text, AttemptStatus, CaptureContext};
use presenter::TerminalPresenter;
use server::HttpAttendanceServer;
use settings::{KioskSettings, SettingsStore};
use workflow::{AttendanceWorkflow, WorkflowOptions};

struct AppState {
    data_dir: PathBuf,
    settings_store: SettingsStore,
    settings: KioskSettings,
}

impl AppState {
    fn load(cli: &Cli) -> Result<Self> {
        let data_dir = match &cli.data_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_dir()
                .map(|dir| dir.join("scanmark"))
                .ok_or_else(|| anyhow!("could not determine a data directory, pass --data-dir"))?,
        };
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let settings_path = cli
            .settings
            .clone()
            .unwrap_or_else(|| data_dir.join("settings.json"));
        let settings_store = SettingsStore::new(settings_path)?;

        let mut settings = settings_store.current();
        if let Some(server) = &cli.server {
            settings.server_url = server.clone();
        }

        Ok(Self {
            data_dir,
            settings_store,
            settings,
        })
    }

    fn journal_path(&self) -> PathBuf {
        self.data_dir.join("attempts.sqlite3")
    }

    /// Opens the journal and finalises attempts a crashed run left behind.
    fn open_journal(&self) -> Result<AttemptJournal> {
        let journal = AttemptJournal::open(self.journal_path())?;
        let recovered = journal.recovered_on_open();
        if recovered > 0 {
            warn!(
                "Marked {recovered} unfinished attempt(s) in {} as Interrupted",
                journal.path().display()
            );
        }
        Ok(journal)
    }

    fn capture_context(&self, selection: &SelectionArgs) -> Result<CaptureContext> {
        let device = selection.device_class(self.settings.device_class);
        let delay = match selection.delay.as_deref() {
            Some(text) => resolve_delay_text(text, device),
            None => resolve_delay(self.settings.confirm_delay_secs, device),
        };
        self.settings
            .courses
            .select(&selection.field, &selection.course, delay)
            .map_err(|err| anyhow!(err.user_message()))
    }

    fn build_workflow(&self, journal: AttemptJournal, json: bool) -> Result<AttendanceWorkflow> {
        let server =
            HttpAttendanceServer::new(&self.settings.server_url, self.settings.request_timeout())?;
        let presenter = Arc::new(TerminalPresenter::new(self.settings.server_url.clone(), json));
        let options = WorkflowOptions {
            capturer: FrameCapturer::new(self.settings.jpeg_quality),
            notice_ttl: self.settings.notice_ttl(),
            ..WorkflowOptions::default()
        };
        Ok(AttendanceWorkflow::new(
            Arc::new(server),
            presenter,
            Some(journal),
            options,
        ))
    }
}

#[cfg(feature = "native-camera")]
fn device_camera(index: u32) -> Result<Arc<dyn CameraSource>> {
    Ok(Arc::new(camera::NativeCamera::new(index)))
}

#[cfg(not(feature = "native-camera"))]
fn device_camera(_index: u32) -> Result<Arc<dyn CameraSource>> {
    Err(anyhow!(
        "no camera backend compiled in: pass --image or build with the native-camera feature"
    ))
}

async fn run_command(cli: Cli) -> Result<ExitCode> {
    let app = AppState::load(&cli)?;

    match cli.command {
        Command::Kiosk(args) => {
            let context = app.capture_context(&args.selection)?;
            let camera: Arc<dyn CameraSource> = match &args.image {
                Some(path) => Arc::new(StillImageCamera::new(path)),
                None => device_camera(args.camera_index.unwrap_or(app.settings.camera_index))?,
            };
            let journal = app.open_journal()?;
            let workflow = app.build_workflow(journal, args.json)?;

            info!(
                "Kiosk ready for {}/{} against {} ({}s confirmation)",
                context.field(),
                context.course(),
                app.settings.server_url,
                context.delay_seconds()
            );
            let input = tokio::io::BufReader::new(tokio::io::stdin());
            Kiosk::new(workflow, camera, context)
                .run(input, args.auto_scan)
                .await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Once {
            selection,
            image,
            json,
        } => {
            let context = app.capture_context(&selection)?;
            let journal = app.open_journal()?;
            let workflow = app.build_workflow(journal, json)?;

            let camera = StillImageCamera::new(image);
            if workflow.acquire_camera(&camera).await.is_err() {
                return Ok(ExitCode::FAILURE);
            }
            let report = workflow.start_attempt(context, false).await;
            workflow.shutdown().await;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("attempt {}: {}", report.attempt_id, report.status.as_str());
            }
            Ok(if report.status == AttemptStatus::Marked {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::History { limit } => {
            let journal = app.open_journal()?;
            for attempt in journal.recent_attempts(limit).await? {
                println!(
                    "{}  {:<13} {}/{}  {}  {}",
                    attempt.started_at.format("%Y-%m-%d %H:%M:%S"),
                    attempt.status.as_str(),
                    attempt.field,
                    attempt.course,
                    attempt.display_name.as_deref().unwrap_or("-"),
                    attempt.message.as_deref().unwrap_or("")
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Config {
            delay,
            device,
            save,
        } => {
            let mut settings = app.settings.clone();
            if let Some(delay) = delay {
                settings.confirm_delay_secs = Some(delay);
            }
            if let Some(device) = device {
                settings.device_class = device.into();
            }
            if save {
                settings = app.settings_store.update(|stored| *stored = settings)?;
                info!("Saved settings to {}", app.settings_store.path().display());
            }

            println!("settings file: {}", app.settings_store.path().display());
            println!("journal: {}", app.journal_path().display());
            println!("{}", serde_json::to_string_pretty(&settings)?);
            println!("courses:");
            for field in settings.courses.fields() {
                let courses = settings.courses.courses(field).unwrap_or_default();
                println!("  {field}: {}", courses.join(", "));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Entry point of the `scanmark` binary. The workflow is single-threaded, so
/// everything runs on a current-thread runtime.
pub fn run() -> Result<ExitCode> {
    utils::init_logging(utils::debug_from_env());

    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(run_command(cli))
}
