use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand, arg};
use egui::Vec2;
use log::info;
use slipstream::{
    SlipstreamError,
    fetcher::{Fetcher, MemoryTraceSink},
    openf1::{DataSource, OpenF1Client, RecordedSource, record_session, write_recording},
    ui::{ReplayApp, config::AppConfig},
};

const WINDOW_SIZE: Vec2 = Vec2::new(1440., 900.);

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Browse a season on the live provider and replay fastest laps
    Replay {
        #[arg(short, long)]
        year: Option<i32>,

        #[arg(short, long)]
        api_url: Option<String>,
    },
    /// Replay a session previously saved with `record`
    Load {
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Save the fastest laps of a session to a JSON lines file
    Record {
        #[arg(short, long)]
        session: u32,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long)]
        api_url: Option<String>,
    },
}

fn run_dashboard(
    source: Arc<dyn DataSource>,
    app_config: AppConfig,
    year: i32,
    recording: Option<(PathBuf, RecordedSource)>,
) -> Result<(), SlipstreamError> {
    let trace = Arc::new(MemoryTraceSink::default());
    let fetcher = Fetcher::spawn(source, trace.clone())?;
    let window_position = app_config.window_position.clone();

    let mut native_options = eframe::NativeOptions::default();
    native_options.viewport = native_options
        .viewport
        .with_inner_size(WINDOW_SIZE)
        .with_position(window_position);

    eframe::run_native(
        "Slipstream",
        native_options,
        Box::new(move |cc| {
            let app = ReplayApp::new(fetcher, trace, app_config, year, cc);
            Ok(Box::new(match recording {
                Some((path, source)) => app.with_recording(path, &source),
                None => app,
            }))
        }),
    )
    .map_err(|e| SlipstreamError::WindowStartup {
        description: e.to_string(),
    })
}

fn replay(year: Option<i32>, api_url: Option<String>) -> Result<(), SlipstreamError> {
    let mut app_config = AppConfig::from_local_file().unwrap_or_default();
    if let Some(api_url) = api_url {
        app_config.api_base_url = api_url;
    }
    let year = year.unwrap_or(app_config.default_year);
    info!("Replaying {} season from {}", year, app_config.api_base_url);

    let source: Arc<dyn DataSource> = Arc::new(OpenF1Client::new(app_config.api_base_url.clone()));
    run_dashboard(source, app_config, year, None)
}

fn load(input: &PathBuf) -> Result<(), SlipstreamError> {
    if !input.exists() {
        return Err(SlipstreamError::InvalidRecordingFile {
            path: format!("{:?}", input),
        });
    }
    let recorded = RecordedSource::from_file(input)?;
    let app_config = AppConfig::from_local_file().unwrap_or_default();
    let year = recorded
        .all_sessions()
        .first()
        .map_or(app_config.default_year, |s| s.year);

    let source: Arc<dyn DataSource> = Arc::new(recorded.clone());
    run_dashboard(source, app_config, year, Some((input.clone(), recorded)))
}

fn record(session_key: u32, output: &PathBuf, api_url: Option<String>) -> Result<(), SlipstreamError> {
    let app_config = AppConfig::from_local_file().unwrap_or_default();
    let client = OpenF1Client::new(api_url.unwrap_or(app_config.api_base_url));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| SlipstreamError::FetcherRuntime { source: e })?;
    let records = runtime.block_on(record_session(&client, session_key))?;
    write_recording(output, &records)
}

fn main() {
    #[cfg(debug_assertions)]
    colog::init();

    let cli = Args::parse();
    ctrlc::set_handler(move || {
        println!("Exiting...");
        std::process::exit(0);
    })
    .expect("Could not set Ctrl-C handler");
    match &cli.command {
        Commands::Replay { year, api_url } => {
            replay(*year, api_url.clone()).expect("Error while running the replay dashboard")
        }
        Commands::Load { input } => {
            load(input).expect("Error while replaying recording");
        }
        Commands::Record {
            session,
            output,
            api_url,
        } => record(*session, output, api_url.clone()).expect("Error while recording session"),
    };
}
