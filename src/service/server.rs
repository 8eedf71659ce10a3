use crate::camera::{CaptureProvider, DeviceCapture, FileCapture};
use crate::common::{Config, FaceAuthError, Result};
use crate::core::{AuthenticationWorkflow, DescriptorExtractor, EnrollmentWorkflow};
use crate::service::protocol::{read_frame, write_frame, AuthRequest, EnrollRequest, Request, Response};
use crate::storage::IdentityStore;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Request handling behind the service socket, shared by all client threads.
pub struct Service<E> {
    config: Config,
    store: StoreState,
    // Held for capture and extraction; the camera is exclusive
    extractor: Mutex<E>,
    pictures_dir: Option<PathBuf>,
    dev_mode: bool,
}

enum StoreState {
    Ready(IdentityStore),
    // Clients are told why instead of finding no socket
    Corrupt { path: PathBuf, message: String },
}

impl<E: DescriptorExtractor> Service<E> {
    /// Loads the identity store. A corrupt store does not stop the service;
    /// every identity request is answered with `StorageCorrupt` instead.
    pub fn new(config: Config, users_file: &Path, extractor: E) -> Result<Self> {
        let store = match IdentityStore::load(users_file) {
            Ok(store) => {
                tracing::info!("Loaded {} enrolled user(s) from {}", store.len(), store.path().display());
                StoreState::Ready(store)
            }
            Err(FaceAuthError::StorageCorrupt { path, message }) => {
                tracing::error!("Identity store {} is corrupt: {}", path.display(), message);
                StoreState::Corrupt { path, message }
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            config,
            store,
            extractor: Mutex::new(extractor),
            pictures_dir: None,
            dev_mode: false,
        })
    }

    /// Accept still image paths in place of the camera.
    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    pub fn with_pictures_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pictures_dir = Some(dir.into());
        self
    }

    pub fn handle_client(&self, mut stream: UnixStream) -> Result<()> {
        stream.set_read_timeout(Some(Duration::from_secs(10)))?;
        stream.set_write_timeout(Some(Duration::from_secs(5)))?;

        let request: Request = match read_frame(&mut stream) {
            Ok(request) => request,
            // Liveness checks connect and close without a request
            Err(FaceAuthError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => {
                let _ = write_frame(&mut stream, &Response::failed(&e));
                return Err(e);
            }
        };

        write_frame(&mut stream, &self.handle(request))
    }

    pub fn handle(&self, request: Request) -> Response {
        let result = match request {
            Request::Enroll(request) => self.handle_enroll(request),
            Request::Authenticate(request) => self.handle_auth(request),
            Request::ListUsers => self.store().map(|store| Response::Users(store.usernames())),
        };

        result.unwrap_or_else(|e| {
            tracing::error!("Request failed: {}", e);
            Response::failed(&e)
        })
    }

    fn handle_enroll(&self, request: EnrollRequest) -> Result<Response> {
        tracing::info!("Processing enrollment request for user: {}", request.username);

        let store = self.store()?;
        let mut capture = self.capture_for(request.image.as_deref())?;
        let extractor = self.lock_extractor();

        let mut workflow = EnrollmentWorkflow::new(store, &*extractor);
        if let Some(dir) = &self.pictures_dir {
            workflow = workflow.with_pictures_dir(dir);
        }
        let outcome = workflow.run(&request.username, request.display_name.as_deref(), &mut capture)?;
        Ok(Response::Enroll(outcome))
    }

    fn handle_auth(&self, request: AuthRequest) -> Result<Response> {
        tracing::info!("Processing auth request for user: {}", request.username);

        let store = self.store()?;
        let mut capture = self.capture_for(request.image.as_deref())?;
        let extractor = self.lock_extractor();

        let workflow = AuthenticationWorkflow::new(store, &*extractor, self.config.auth.match_threshold);
        let outcome = workflow.run(&request.username, &mut capture)?;
        Ok(Response::Auth(outcome))
    }

    fn store(&self) -> Result<&IdentityStore> {
        match &self.store {
            StoreState::Ready(store) => Ok(store),
            StoreState::Corrupt { path, message } => Err(FaceAuthError::StorageCorrupt {
                path: path.clone(),
                message: message.clone(),
            }),
        }
    }

    fn lock_extractor(&self) -> MutexGuard<'_, E> {
        // A panicked request leaves the models intact
        self.extractor.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn capture_for(&self, image: Option<&Path>) -> Result<Box<dyn CaptureProvider>> {
        match image {
            Some(path) if self.dev_mode => Ok(Box::new(FileCapture::new(path))),
            Some(_) => Err(FaceAuthError::Protocol(
                "Image files are only accepted in development mode".into(),
            )),
            None => Ok(Box::new(DeviceCapture::new(&self.config.camera))),
        }
    }
}
