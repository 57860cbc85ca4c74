use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use normcap::capture::{CapturedImage, FileGrabber, Rect, ScreenGrabber};
use normcap::cli::Cli;
use normcap::config::Config;
use normcap::error::CaptureError;
use normcap::logging;
use normcap::ocr::TesseractEngine;
use normcap::overlay::HeadlessOverlayHost;
use normcap::paths;
use normcap::tray::{
    Collaborators, ControllerOptions, HeadlessTray, StdoutClipboard, TrayController, TrayHandle,
};
use normcap::update::{UpdateChecker, UpdateStatus};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_dir = paths::ensure_directories_exist()
        .and_then(|_| paths::get_logs_dir())
        .ok();
    let guard = logging::init_logging(log_dir.as_deref(), cli.verbose);
    logging::log_platform_info();

    let mut config = load_config(&cli);
    cli.apply(&mut config);
    info!(
        "Configuration loaded: mode={}, languages={:?}, background_mode={}",
        config.capture.mode, config.ocr.languages, config.capture.background_mode
    );

    if config.update.enabled {
        start_update_check(&config);
    }

    let grabber: Arc<dyn ScreenGrabber> = if cli.images.is_empty() {
        Arc::new(|| -> Result<Vec<CapturedImage>, CaptureError> {
            Err(CaptureError::Grab(
                "no screenshot backend available, pass --image <PATH>".to_string(),
            ))
        })
    } else {
        Arc::new(FileGrabber::new(cli.images.clone()).with_scale_factor(cli.scale_factor))
    };

    let (exit_tx, mut exit_rx) = mpsc::unbounded_channel::<i32>();
    let collaborators = Collaborators {
        grabber,
        ocr: Arc::new(TesseractEngine::new(
            config.ocr.tesseract_cmd.clone(),
            config.ocr.languages.clone(),
        )),
        overlay_host: Arc::new(HeadlessOverlayHost),
        tray_icon: Box::new(HeadlessTray::new()),
        clipboard: Some(Box::new(StdoutClipboard)),
        exit: Arc::new(move |code| {
            let _ = exit_tx.send(code);
        }),
    };

    let (handle, controller) = TrayController::spawn(collaborators, ControllerOptions::from(&config));

    let ctrl_c_handle = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received");
            let _ = ctrl_c_handle.exit(true);
        }
    });

    tokio::spawn(run_console(handle.clone()));

    controller.await.context("Tray controller task failed")?;
    drop(handle);

    let code = exit_rx.try_recv().unwrap_or(0);
    drop(guard);
    std::process::exit(code);
}

fn load_config(cli: &Cli) -> Config {
    let loaded = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    loaded.unwrap_or_else(|e| {
        warn!("Using default configuration: {:#}", e);
        Config::default()
    })
}

fn start_update_check(config: &Config) {
    let checker = UpdateChecker::for_running_version(config.update.url.clone());
    let mut results = checker.subscribe();

    match checker.check() {
        Ok(_) => {
            tokio::spawn(async move {
                if let Ok(UpdateStatus::Available(newest)) = results.recv().await {
                    println!("NormCap {} is available", newest);
                }
            });
        }
        Err(e) => warn!("Update check not started: {}", e),
    }
}

/// Line commands on stdin standing in for tray clicks and overlay input
async fn run_console(handle: TrayHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let words: Vec<&str> = line.split_whitespace().collect();
        let result = match words.as_slice() {
            [] => continue,
            ["select", rest @ ..] => match parse_selection(rest) {
                Some((display, rect)) => handle.select_region(display, rect),
                None => {
                    warn!("Usage: select <display> <x> <y> <width> <height>");
                    continue;
                }
            },
            ["cancel"] => {
                let displays = handle.status().overlays;
                match displays.first() {
                    Some(display) => handle.escape(*display),
                    None => continue,
                }
            }
            ["status"] => {
                println!("{:?}", handle.status());
                continue;
            }
            [action] => handle.trigger(action).await,
            _ => {
                warn!("Unknown command: {}", line.trim());
                continue;
            }
        };

        if let Err(e) = result {
            error!("{}", e);
        }
    }
}

fn parse_selection(args: &[&str]) -> Option<(u32, Rect)> {
    let numbers = args
        .iter()
        .map(|a| a.parse::<i32>().ok())
        .collect::<Option<Vec<_>>>()?;
    match numbers.as_slice() {
        [display, x, y, width, height] if *display >= 0 && *width > 0 && *height > 0 => Some((
            *display as u32,
            Rect::new(*x, *y, *width as u32, *height as u32),
        )),
        _ => None,
    }
}
