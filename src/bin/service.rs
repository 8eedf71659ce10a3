use faceid::{
    common::{Paths, Result},
    Config, OnnxExtractor, Service,
};
use anyhow::Context as _;
use clap::Parser;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

#[derive(Parser, Debug)]
#[command(name = "faceid-service")]
#[command(about = "Face enrollment and authentication service")]
struct Args {
    /// Run in development mode (./dev_data, still images allowed)
    #[arg(long)]
    dev: bool,

    /// Override the socket path
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Override the config file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting faceid service (dev_mode: {})", args.dev);

    let paths = Paths::new(args.dev, !args.dev)?;
    let config_path = args.config.unwrap_or_else(|| paths.config_file());
    let config = if config_path.exists() {
        Config::load_from_path(&config_path)?
    } else {
        Config::load()?
    };

    // Models are loaded once and reused; the camera is opened per request
    let extractor = OnnxExtractor::new(&config, &paths.models_dir())?;
    let users_file = paths.users_file(&config);
    let service = Arc::new(
        Service::new(config, &users_file, extractor)?
            .with_dev_mode(args.dev)
            .with_pictures_dir(paths.pictures_dir()),
    );

    let socket_path = args.socket.unwrap_or_else(|| paths.socket_path());
    let listener = bind_socket(&socket_path)?;
    tracing::info!("Listening on {}", socket_path.display());

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let service = Arc::clone(&service);
                let spawned = thread::Builder::new()
                    .name("client".into())
                    .spawn(move || {
                        if let Err(e) = service.handle_client(stream) {
                            tracing::error!("Client error: {}", e);
                        }
                    });
                if let Err(e) = spawned {
                    tracing::error!("Failed to spawn client thread: {}", e);
                }
            }
            Err(e) => {
                tracing::error!("Connection error: {}", e);
            }
        }
    }

    Ok(())
}

fn bind_socket(socket_path: &Path) -> Result<UnixListener> {
    if socket_path.exists() {
        fs::remove_file(socket_path)?;
    }
    if let Some(parent) = socket_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind Unix socket {}", socket_path.display()))?;

    // Any local user may ask to be enrolled or authenticated
    fs::set_permissions(socket_path, fs::Permissions::from_mode(0o666))?;
    Ok(listener)
}
