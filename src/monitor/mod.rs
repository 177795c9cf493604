//! # Live Refresh
//!
//! The monitor re-reads all devices on a background thread and hands decoded results to the
//! presentation thread. Only whole-device [`Update`]s cross the thread boundary. The
//! presentation thread owns its model exclusively and applies updates in the order they were
//! published.
//!
//! ```text
//!  refresh thread                                  presentation thread
//!  ──────────────                                  ───────────────────
//!  Device ─► RenderContext::new ─► Update ─► [queue] ─► PresentationModel::apply ─► draw
//!     ▲                                                          │
//!     └──────────── DeviceSource::refresh_all ◄── next cycle     └─► RegisterMutator (keys)
//! ```

pub mod context;
pub mod source;

use std::{
    error::Error,
    fmt::Write,
    io,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use tracing::{debug, info, trace, warn};

use crate::device::pci::device::Device;

use self::{context::RenderContext, source::DeviceSource};

/// A message from the refresh thread to the presentation thread.
#[derive(Debug, Clone)]
pub enum Update {
    /// A device was decoded.
    Device(Box<RenderContext>),

    /// Re-reading devices failed. The devices keep their previous state.
    Error(String),

    /// A refresh cycle completed in this time.
    CycleTime(Duration),
}

/// The receiving side of the update queue is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("The presentation side stopped listening for updates")]
pub struct Disconnected;

/// The hand-off point between the refresh thread and its consumer.
pub trait UpdateSink: Send {
    /// Queue `update` for the consumer.
    fn publish(&self, update: Update) -> Result<(), Disconnected>;
}

/// Render an error and its sources on one line.
#[must_use]
pub fn error_chain(err: &dyn Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        let _ = write!(out, ": {cause}");
        source = cause.source();
    }

    out
}

/// Owns the device roster and keeps republishing decoded device state.
///
/// Each cycle publishes one [`Update::Device`] per device, re-reads all devices from the
/// [`DeviceSource`], and finishes with [`Update::CycleTime`]. Cycles follow each other without
/// delay. A frozen source is decoded exactly once.
#[derive(Debug)]
pub struct Synchronizer<S, K> {
    devices: Vec<Device>,
    source: S,
    sink: K,
}

impl<S: DeviceSource, K: UpdateSink> Synchronizer<S, K> {
    /// Create a synchronizer for `devices`, which should already hold fresh Configuration Space
    /// bytes.
    #[must_use]
    pub fn new(devices: Vec<Device>, source: S, sink: K) -> Self {
        Self {
            devices,
            source,
            sink,
        }
    }

    /// Run a single refresh cycle.
    pub fn cycle(&mut self) -> Result<(), Disconnected> {
        let start = Instant::now();

        for device in &self.devices {
            let context = RenderContext::new(device.clone());
            self.sink.publish(Update::Device(Box::new(context)))?;
        }

        if self.source.is_live() {
            if let Err(err) = self.source.refresh_all(&mut self.devices) {
                let message = error_chain(&err);
                warn!("Refreshing devices failed: {message}");
                self.sink.publish(Update::Error(message))?;
            }
        }

        let elapsed = start.elapsed();
        trace!("Refresh cycle took {elapsed:?}");
        self.sink.publish(Update::CycleTime(elapsed))
    }

    /// Run refresh cycles until the consumer disconnects, or once for a frozen source.
    pub fn run(mut self) {
        info!(
            "Watching {} devices ({})",
            self.devices.len(),
            if self.source.is_live() { "live" } else { "frozen" }
        );

        loop {
            if self.cycle().is_err() {
                debug!("Update consumer is gone, stopping refresh");
                return;
            }

            if !self.source.is_live() {
                return;
            }
        }
    }
}

impl<S, K> Synchronizer<S, K>
where
    S: DeviceSource + 'static,
    K: UpdateSink + 'static,
{
    /// Run the synchronizer on its own thread.
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("refresh".to_owned())
            .spawn(move || self.run())
    }
}
