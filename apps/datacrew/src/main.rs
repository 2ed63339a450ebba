use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client_core::{
    HttpDatasetService, NoticeKind, Outcome, SessionController, SessionEvent, UploadFile,
};
use shared::domain::Tab;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::broadcast::error::RecvError,
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod charts;
mod commands;
mod config;
mod views;

use commands::{Command, HELP};
use config::{load_settings, Settings, ViewKind};
use views::View;

#[derive(Parser, Debug)]
#[command(
    name = "datacrew",
    version,
    about = "Terminal client for the DataCrew dataset analysis service"
)]
struct Args {
    /// Config file; defaults to ./datacrew.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    service_url: Option<String>,
    #[arg(long, value_enum)]
    view: Option<ViewKind>,
    #[arg(long)]
    timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Option<Mode>,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Interactive shell (default).
    Shell,
    /// Ping the service and print its health payload.
    Health,
    /// Print the service's status payload.
    Status,
    /// Upload a file, run each query, print the results, then remove the dataset.
    Run {
        path: PathBuf,
        #[arg(short, long = "query")]
        queries: Vec<String>,
        /// Leave the dataset on the service afterwards.
        #[arg(long)]
        keep: bool,
    },
}

enum Flow {
    Continue,
    Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(url) = args.service_url {
        settings.service_url = url;
    }
    if let Some(view) = args.view {
        settings.view = view;
    }
    if let Some(secs) = args.timeout_secs {
        settings.request_timeout_secs = secs;
    }

    let service = HttpDatasetService::new(settings.service_config()?)?;
    let view = views::select(settings.view);
    let controller = SessionController::with_followups(
        Arc::new(service),
        settings.history_capacity,
        view.upload_followups(),
    );
    info!(service_url = %settings.service_url, view = ?settings.view, "datacrew starting");

    match args.command.unwrap_or(Mode::Shell) {
        Mode::Shell => run_shell(&controller, view.as_ref(), &settings).await,
        Mode::Health => {
            let body = controller.check_health().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        Mode::Status => {
            let body = controller.check_status().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        Mode::Run {
            path,
            queries,
            keep,
        } => run_batch(&controller, view.as_ref(), path, queries, keep).await,
    }
}

fn spawn_event_printer(controller: &SessionController) -> JoinHandle<()> {
    let mut events = controller.subscribe_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::Notice(notice)) => {
                    let marker = match notice.kind {
                        NoticeKind::Info => "·",
                        NoticeKind::Success => "✓",
                        NoticeKind::Error => "✗",
                    };
                    eprintln!("{marker} {}", notice.message);
                }
                Ok(SessionEvent::Error(message)) => eprintln!("!! {message}"),
                Ok(SessionEvent::Changed) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "session event printer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn render(controller: &SessionController, view: &dyn View) {
    println!("{}", view.render(&controller.snapshot().await));
}

async fn run_shell(
    controller: &Arc<SessionController>,
    view: &dyn View,
    settings: &Settings,
) -> Result<()> {
    let printer = spawn_event_printer(controller);
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    render(controller, view).await;
    loop {
        stdout.write_all(b"datacrew> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let command = match commands::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };
        if let Flow::Quit = execute(controller, view, settings, command).await? {
            break;
        }
    }

    printer.abort();
    Ok(())
}

async fn execute(
    controller: &Arc<SessionController>,
    view: &dyn View,
    settings: &Settings,
    command: Command,
) -> Result<Flow> {
    let outcome = match command {
        Command::Upload(path) => match UploadFile::from_path(&path).await {
            Ok(file) => controller.submit_upload(file).await,
            Err(err) => {
                eprintln!("{err}");
                return Ok(Flow::Continue);
            }
        },
        Command::Tab(tab) if !view.offers(tab) => {
            eprintln!("The {} tab is not part of this view.", tab.label());
            return Ok(Flow::Continue);
        }
        Command::Tab(tab) => controller.select_tab(tab).await,
        Command::Analyze => controller.request_analysis().await,
        Command::Visualize => controller.request_visualizations().await,
        Command::Summary => controller.request_summary().await,
        Command::Query(text) => {
            let text = match text {
                Some(text) => text,
                None => controller.snapshot().await.query,
            };
            let outcome = controller.submit_query(text).await;
            if outcome == Outcome::Applied {
                controller.select_tab(Tab::Query).await;
            }
            outcome
        }
        Command::Recall(position) => controller.recall_query(position - 1).await,
        Command::History => controller.select_tab(Tab::Query).await,
        Command::Remove => controller.remove_dataset().await,
        Command::SaveCharts(dir) => {
            let dir = dir.unwrap_or_else(|| settings.chart_dir.clone());
            let session = controller.snapshot().await;
            match charts::save_visualizations(&dir, &session.visualizations).await {
                Ok(paths) if paths.is_empty() => println!("No visualizations to save."),
                Ok(paths) => {
                    for path in paths {
                        println!("wrote {}", path.display());
                    }
                }
                Err(err) => eprintln!("{err:#}"),
            }
            return Ok(Flow::Continue);
        }
        Command::Dismiss => {
            controller.dismiss_error().await;
            Outcome::Applied
        }
        Command::Show => Outcome::Applied,
        Command::Wait => {
            controller.wait_for_background().await;
            Outcome::Applied
        }
        Command::Health => {
            print_probe(controller.check_health().await);
            return Ok(Flow::Continue);
        }
        Command::Status => {
            print_probe(controller.check_status().await);
            return Ok(Flow::Continue);
        }
        Command::Help => {
            println!("{HELP}");
            return Ok(Flow::Continue);
        }
        Command::Quit => return Ok(Flow::Quit),
    };

    if let Outcome::Skipped(reason) = outcome {
        debug!(?reason, "command skipped");
    }
    render(controller, view).await;
    Ok(Flow::Continue)
}

fn print_probe(body: Result<serde_json::Value>) {
    match body {
        Ok(body) => println!("{body}"),
        Err(err) => eprintln!("{err:#}"),
    }
}

async fn run_batch(
    controller: &Arc<SessionController>,
    view: &dyn View,
    path: PathBuf,
    queries: Vec<String>,
    keep: bool,
) -> Result<()> {
    let printer = spawn_event_printer(controller);
    let file = UploadFile::from_path(&path).await?;
    match controller.submit_upload(file).await {
        Outcome::Applied => {}
        Outcome::Failed(message) => bail!("upload of '{}' failed: {message}", path.display()),
        other => bail!("upload of '{}' did not complete: {other:?}", path.display()),
    }
    controller.wait_for_background().await;
    render(controller, view).await;

    for query in queries {
        controller.submit_query(query).await;
        controller.select_tab(Tab::Query).await;
        render(controller, view).await;
    }

    if !keep {
        controller.remove_dataset().await;
    }
    printer.abort();
    Ok(())
}
