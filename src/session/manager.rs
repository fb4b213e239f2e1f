//! Session ownership and the one-active-stream policy.
//!
//! The manager is a plain value the transport layer owns and drives; there
//! are no process-wide singletons. Every lifecycle operation and every
//! `process_frame` call runs under one mutex, so they can never interleave.

use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};

use ab_glyph::FontArc;
use log::info;
use uuid::Uuid;

use crate::config::PulseConfig;
use crate::detection::DetectorProvider;
use crate::error::{PulseError, Result};
use crate::input::CaptureProvider;

use super::types::{CameraInfo, CurrentStats, FrameResult, SessionState, SessionSummary};
use super::PulseSession;

struct Inner {
    active: Option<PulseSession>,
    history: Vec<SessionSummary>,
}

pub struct SessionManager {
    capture: Box<dyn CaptureProvider>,
    detectors: Box<dyn DetectorProvider>,
    config: PulseConfig,
    font: Option<FontArc>,
    inner: Mutex<Inner>,
}

impl SessionManager {
    pub fn new(
        capture: Box<dyn CaptureProvider>,
        detectors: Box<dyn DetectorProvider>,
        config: PulseConfig,
    ) -> Self {
        Self {
            capture,
            detectors,
            config,
            font: None,
            inner: Mutex::new(Inner {
                active: None,
                history: Vec::new(),
            }),
        }
    }

    /// Font used for frame text annotations; without one, text is skipped.
    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a session on `camera_id`. An already-active session is fully
    /// stopped (device released, buffers cleared, summary recorded) before
    /// the new device is acquired.
    pub fn start(&self, camera_id: u32, bpm_limits: Option<(f64, f64)>) -> Result<Uuid> {
        let mut inner = self.lock();
        if let Some(mut previous) = inner.active.take() {
            info!(
                "stopping session {} before starting camera {camera_id}",
                previous.id()
            );
            if let Some(summary) = previous.stop() {
                inner.history.push(summary);
            }
        }

        let session = PulseSession::open(
            camera_id,
            bpm_limits,
            self.config.clone(),
            self.capture.as_ref(),
            self.detectors.as_ref(),
            self.font.clone(),
        )?;
        let id = session.id();
        inner.active = Some(session);
        Ok(id)
    }

    /// Stop the active session, recording and returning its summary.
    /// A no-op returning `None` when nothing is running.
    pub fn stop(&self) -> Option<SessionSummary> {
        let mut inner = self.lock();
        let mut session = inner.active.take()?;
        let summary = session.stop();
        if let Some(summary) = &summary {
            inner.history.push(summary.clone());
        }
        summary
    }

    pub fn toggle_lock(&self) -> Result<SessionState> {
        let mut inner = self.lock();
        let session = inner.active.as_mut().ok_or(PulseError::NoActiveSession)?;
        Ok(session.toggle_lock())
    }

    /// Stop the current device and reacquire on `new_id`. If the new device
    /// cannot be opened the session ends (its summary is recorded) and the
    /// error propagates.
    pub fn switch_camera(&self, new_id: u32) -> Result<()> {
        let mut inner = self.lock();
        let session = inner.active.as_mut().ok_or(PulseError::NoActiveSession)?;
        if let Err(e) = session.switch_camera(new_id, self.capture.as_ref()) {
            if let Some(mut dead) = inner.active.take() {
                if let Some(summary) = dead.stop() {
                    inner.history.push(summary);
                }
            }
            return Err(e);
        }
        Ok(())
    }

    /// Drive one processing cycle. `Ok(None)` means no frame this cycle;
    /// callers wait briefly and poll again rather than busy-spin.
    pub fn process_frame(&self) -> Result<Option<FrameResult>> {
        let mut inner = self.lock();
        let session = inner.active.as_mut().ok_or(PulseError::NoActiveSession)?;
        session.process_frame()
    }

    pub fn current_stats(&self) -> Option<CurrentStats> {
        let inner = self.lock();
        inner.active.as_ref().map(PulseSession::current_stats)
    }

    pub fn state(&self) -> Option<SessionState> {
        let inner = self.lock();
        inner.active.as_ref().map(PulseSession::state)
    }

    pub fn is_active(&self) -> bool {
        self.lock().active.is_some()
    }

    /// The most recent `limit` session summaries, oldest first.
    pub fn history(&self, limit: usize) -> Vec<SessionSummary> {
        let inner = self.lock();
        let start = inner.history.len().saturating_sub(limit);
        inner.history[start..].to_vec()
    }

    /// Probe a set of candidate device ids.
    pub fn cameras(&self, candidates: &[u32]) -> Vec<CameraInfo> {
        candidates
            .iter()
            .map(|&id| CameraInfo {
                id,
                name: format!("Camera {id}"),
                available: self.capture.is_available(id),
            })
            .collect()
    }

    /// Export the active session's raw signal as two-column rows.
    pub fn export_signal<W: Write>(&self, writer: W) -> Result<usize> {
        let inner = self.lock();
        let session = inner.active.as_ref().ok_or(PulseError::NoActiveSession)?;
        session.export_signal(writer)
    }

    /// Timestamped default name for an export file.
    pub fn export_filename(&self) -> String {
        format!("pulse-{}.csv", crate::timestamp_slug("_"))
    }
}
