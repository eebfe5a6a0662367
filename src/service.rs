//! Capture service backed by a dedicated worker thread
//!
//! The worker owns the transcript, the raster backend and the output surface
//! and runs one capture at a time on its own single-threaded runtime, so async
//! callers get a `Send` handle even though the pipeline itself is not. Each
//! request carries a [`CancelToken`] the caller can trip while it runs.

use crate::capture::{CancelToken, Capture, CaptureOutcome};
use crate::platform::{DeviceMetrics, Interaction, OutputSurface};
use crate::range::RangeRequest;
use crate::rendering::{RasterBackend, DEFAULT_SETTLE_DELAY};
use crate::transcript::Transcript;
use crate::{Error, Result, SnapConfig};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;

enum Command {
    Capture(RangeRequest, CancelToken, oneshot::Sender<CaptureOutcome>),
    Reload(Transcript, oneshot::Sender<()>),
    Close(oneshot::Sender<()>),
}

/// Everything a capture needs, moved onto the worker thread.
pub struct ServiceParts {
    pub config: SnapConfig,
    pub transcript: Transcript,
    pub backend: Box<dyn RasterBackend + Send>,
    pub interaction: Arc<dyn Interaction>,
    pub surface: Box<dyn OutputSurface + Send>,
    pub device: DeviceMetrics,
    pub settle: Duration,
}

impl ServiceParts {
    pub fn new(
        config: SnapConfig,
        transcript: Transcript,
        backend: Box<dyn RasterBackend + Send>,
        interaction: Arc<dyn Interaction>,
        surface: Box<dyn OutputSurface + Send>,
    ) -> Self {
        Self {
            config,
            transcript,
            backend,
            interaction,
            surface,
            device: DeviceMetrics::default(),
            settle: DEFAULT_SETTLE_DELAY,
        }
    }
}

#[derive(Clone)]
pub struct CaptureService {
    cmd_tx: Sender<Command>,
}

impl CaptureService {
    /// Spawn the worker thread.
    pub async fn start(parts: ServiceParts) -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx) = oneshot::channel::<Result<()>>();

        thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    let _ = init_tx.send(Err(Error::InitializationError(format!(
                        "Failed to build capture runtime: {}",
                        e
                    ))));
                    return;
                }
            };
            let _ = init_tx.send(Ok(()));

            let mut parts = parts;
            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Capture(request, cancel, resp) => {
                        let capture = Capture::new(
                            &parts.config,
                            parts.backend.as_ref(),
                            parts.interaction.as_ref(),
                            parts.surface.as_ref(),
                        )
                        .with_device(parts.device.clone())
                        .with_settle_delay(parts.settle);
                        let outcome =
                            runtime.block_on(capture.run(&parts.transcript, &request, &cancel));
                        let _ = resp.send(outcome);
                    }
                    Command::Reload(transcript, resp) => {
                        parts.transcript = transcript;
                        let _ = resp.send(());
                    }
                    Command::Close(resp) => {
                        let _ = resp.send(());
                        break;
                    }
                }
            }
            log::debug!("capture worker stopped");
        });

        init_rx
            .await
            .map_err(|e| Error::Other(format!("Worker init canceled: {}", e)))??;
        Ok(Self { cmd_tx })
    }

    /// Queue a capture and wait for its outcome.
    pub async fn capture(&self, request: RangeRequest, cancel: CancelToken) -> Result<CaptureOutcome> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Capture(request, cancel, tx))
            .map_err(|_| Error::Other("capture worker is gone".into()))?;
        rx.await
            .map_err(|e| Error::Other(format!("Capture canceled: {}", e)))
    }

    /// Replace the transcript snapshot used by later captures.
    pub async fn reload(&self, transcript: Transcript) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Reload(transcript, tx))
            .map_err(|_| Error::Other("capture worker is gone".into()))?;
        rx.await.map_err(|e| Error::Other(format!("Reload canceled: {}", e)))
    }

    /// Stop the worker after the current capture.
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Close(tx));
        rx.await.map_err(|e| Error::Other(format!("Close canceled: {}", e)))
    }
}
