use crate::common::{FaceAuthError, Result};
use crate::core::{AuthenticationOutcome, EnrollmentOutcome};
use crate::service::protocol::{read_frame, write_frame, AuthRequest, EnrollRequest, Request, Response};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

pub struct ServiceClient {
    socket_path: PathBuf,
    dev_mode: bool,
}

impl ServiceClient {
    pub fn new(socket_path: impl Into<PathBuf>, dev_mode: bool) -> Self {
        ServiceClient { socket_path: socket_path.into(), dev_mode }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn enroll(
        &self,
        username: &str,
        display_name: Option<&str>,
        image: Option<&Path>,
    ) -> Result<EnrollmentOutcome> {
        let request = Request::Enroll(EnrollRequest {
            username: username.to_string(),
            display_name: display_name.map(str::to_string),
            image: image.map(Path::to_path_buf),
        });

        match self.round_trip(&request)? {
            Response::Enroll(outcome) => Ok(outcome),
            other => Err(unexpected(other)),
        }
    }

    pub fn authenticate(&self, username: &str, image: Option<&Path>) -> Result<AuthenticationOutcome> {
        let request = Request::Authenticate(AuthRequest {
            username: username.to_string(),
            image: image.map(Path::to_path_buf),
        });

        match self.round_trip(&request)? {
            Response::Auth(outcome) => Ok(outcome),
            other => Err(unexpected(other)),
        }
    }

    pub fn list_users(&self) -> Result<Vec<String>> {
        match self.round_trip(&Request::ListUsers)? {
            Response::Users(users) => Ok(users),
            other => Err(unexpected(other)),
        }
    }

    pub fn ensure_service_running(&self) -> Result<()> {
        if self.socket_path.exists() && UnixStream::connect(&self.socket_path).is_ok() {
            return Ok(());
        }

        // Only auto-start in dev mode
        if !self.dev_mode {
            return Err(FaceAuthError::Other(anyhow::anyhow!(
                "Service is not running. Please start it with: sudo systemctl start faceid"
            )));
        }

        println!("Starting service in development mode...");

        let service_binary = std::env::current_exe()?
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Failed to get binary directory"))?
            .join("faceid-service");

        if !service_binary.exists() {
            return Err(FaceAuthError::Other(anyhow::anyhow!(
                "Service binary not found at {:?}. Please build the project first.", service_binary
            )));
        }

        Command::new(&service_binary)
            .arg("--dev")
            .arg("--socket")
            .arg(&self.socket_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| FaceAuthError::Other(anyhow::anyhow!("Failed to start service: {}", e)))?;

        // Model loading takes a moment
        for _ in 0..10 {
            std::thread::sleep(Duration::from_millis(500));
            if self.socket_path.exists() {
                println!("Service started successfully");
                return Ok(());
            }
        }

        Err(FaceAuthError::Other(anyhow::anyhow!("Service failed to start within timeout")))
    }

    fn round_trip(&self, request: &Request) -> Result<Response> {
        self.ensure_service_running()?;

        let mut stream = self.connect_with_retry(3)?;
        write_frame(&mut stream, request)?;
        let response: Response = read_frame(&mut stream)?;

        match response {
            Response::Failed { kind, message } => Err(kind.into_error(message)),
            response => Ok(response),
        }
    }

    fn connect_with_retry(&self, max_retries: u32) -> Result<UnixStream> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match UnixStream::connect(&self.socket_path) {
                Ok(stream) => {
                    // Capture can take a while, writes should not
                    stream.set_read_timeout(Some(Duration::from_secs(120)))?;
                    stream.set_write_timeout(Some(Duration::from_secs(10)))?;
                    return Ok(stream);
                }
                Err(e) if attempt < max_retries => {
                    tracing::warn!("Failed to connect (attempt {}): {}", attempt, e);
                    std::thread::sleep(Duration::from_millis(500));
                }
                Err(e) => {
                    return Err(FaceAuthError::Other(anyhow::anyhow!(
                        "Failed to connect to service at {}: {}", self.socket_path.display(), e
                    )));
                }
            }
        }
    }
}

fn unexpected(response: Response) -> FaceAuthError {
    FaceAuthError::Protocol(format!("Unexpected response type: {:?}", response))
}
