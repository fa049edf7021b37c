//! AcreetionOS Imager command line front end

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;

use acreetion_imager::{config, logging, Flasher, FlasherEvent, Settings};
use acreetion_imager::{log_error, log_info};

#[derive(Parser)]
#[command(name = "acreetion-imager")]
#[command(about = "Download AcreetionOS and flash it to a USB drive", version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Settings file to use instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List ISO images on the download page
    Images,
    /// List removable drives
    Devices,
    /// Download an image and write it to a drive
    Flash {
        /// Image URL (see `images`)
        #[arg(long)]
        image: String,

        /// Target device path (see `devices`)
        #[arg(long)]
        device: String,

        /// Do not ask for confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

/// Ask the user to confirm erasing `device`
fn confirm_erase(device: &str) -> bool {
    print!(
        "WARNING: all data on {} will be erased. Type 'yes' to continue: ",
        device
    );
    if std::io::stdout().flush().is_err() {
        return false;
    }

    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(_) => answer.trim().eq_ignore_ascii_case("yes"),
        Err(_) => false,
    }
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    let style = ProgressStyle::with_template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        .map(|s| s.progress_chars("=> "))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

async fn run_flash(flasher: &Flasher, image: &str, device: &str, show_output: bool) -> bool {
    let pb = progress_bar();
    let mut rx = flasher.subscribe();
    let view = pb.clone();

    let listener = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(FlasherEvent::Progress { percent }) => view.set_position(percent as u64),
                Ok(FlasherEvent::Status { message, .. }) => view.set_message(message),
                Ok(FlasherEvent::LogLine { text }) if show_output => view.println(text),
                Ok(FlasherEvent::LogLine { .. }) => {}
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let result = flasher.flash(image, device).await;
    listener.abort();

    if result.success {
        pb.finish_with_message(result.message);
    } else {
        pb.abandon_with_message(result.message);
    }
    result.success
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    logging::init();
    // The progress bar owns the terminal; log lines still go to the file
    logging::set_stderr_output(cli.debug);

    let settings = match &cli.settings {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    if cli.debug || settings.developer_mode {
        logging::set_log_level(true);
    }

    log_info!("main", "=== {} Starting ===", config::app::TITLE);
    log_info!("main", "Version: {}", env!("CARGO_PKG_VERSION"));
    log_info!("main", "OS: {} {}", std::env::consts::OS, std::env::consts::ARCH);

    let flasher = match Flasher::new(settings) {
        Ok(flasher) => flasher,
        Err(e) => {
            log_error!("main", "Startup failed: {}", e);
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    log_info!("main", "Image page: {}", flasher.settings().image_page_url);
    log_info!("main", "Working directory: {}", flasher.settings().work_dir().display());
    flasher.purge_stale_artifacts();

    match cli.command {
        Commands::Images => {
            let images = flasher.list_images().await;
            let mut ok = false;
            for image in &images {
                if image.is_flashable() {
                    ok = true;
                    println!("{}\n    {}", image.label, image.url);
                } else {
                    eprintln!("{}", image.label);
                }
            }
            if ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Commands::Devices => {
            let devices = flasher.list_devices().await;
            if devices.is_empty() {
                eprintln!("No USB devices found.");
            }
            for device in &devices {
                println!("{:<24} {:>10}  {}", device.path, device.size, device.label);
            }
            ExitCode::SUCCESS
        }
        Commands::Flash { image, device, yes } => {
            if !yes && !confirm_erase(&device) {
                println!("Flash cancelled.");
                return ExitCode::FAILURE;
            }

            if run_flash(&flasher, &image, &device, cli.debug).await {
                ExitCode::SUCCESS
            } else {
                log_error!("main", "Flash of {} to {} failed", image, device);
                ExitCode::FAILURE
            }
        }
    }
}
