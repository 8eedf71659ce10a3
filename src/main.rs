use faceid::{common::Paths, CaptureProvider, Config, DeviceCapture, ServiceClient};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "faceid")]
#[command(about = "Face enrollment and login")]
struct Cli {
    /// Enable development mode (saves data locally for testing)
    #[arg(long, global = true)]
    dev: bool,

    /// Talk to the service on this socket instead of the default
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new face
    Enroll {
        #[arg(short, long)]
        username: String,
        /// Name shown after login (defaults to the username)
        #[arg(short = 'n', long)]
        display_name: Option<String>,
        /// Use a still image instead of the camera (dev mode)
        #[arg(short, long)]
        image: Option<PathBuf>,
    },
    /// Log in with an enrolled face
    Login {
        #[arg(short, long)]
        username: String,
        /// Use a still image instead of the camera (dev mode)
        #[arg(short, long)]
        image: Option<PathBuf>,
    },
    /// List enrolled users
    Users,
    /// Capture one frame and save it
    TestCamera,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.dev);

    let paths = Paths::new(cli.dev, false)?;
    let client = ServiceClient::new(
        cli.socket.clone().unwrap_or_else(|| paths.socket_path()),
        cli.dev,
    );

    match cli.command {
        Commands::Enroll { username, display_name, image } => {
            println!("Enrolling user: {}", username);
            let outcome = client.enroll(&username, display_name.as_deref(), image.as_deref())?;
            println!("{}", outcome.message());
            outcome.into_result()?;
        }
        Commands::Login { username, image } => {
            println!("Authenticating: {}", username);
            let outcome = client.authenticate(&username, image.as_deref())?;
            println!("{}", outcome.message());
            if let Some(name) = outcome.display_name() {
                println!("Welcome, {}", name);
            }
            let distance = outcome.into_result()?;
            tracing::debug!("Accepted at distance {:.4}", distance);
        }
        Commands::Users => {
            let users = client.list_users()?;
            if users.is_empty() {
                println!("No users enrolled");
            }
            for user in users {
                println!("{}", user);
            }
        }
        Commands::TestCamera => {
            println!("Testing camera...");
            test_camera(&paths)?;
        }
    }

    Ok(())
}

fn test_camera(paths: &Paths) -> Result<()> {
    let config_path = paths.config_file();
    let config = if config_path.exists() {
        Config::load_from_path(&config_path)?
    } else {
        Config::load()?
    };

    let mut camera = DeviceCapture::new(&config.camera);
    let image = camera.capture()?;

    let save_path = paths.capture_path("test_capture");
    image.save(&save_path)?;
    println!("Saved test image to {:?}", save_path);
    Ok(())
}

fn setup_logging(dev_mode: bool) {
    if dev_mode {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt::init();
    }
}
