use crate::error::MediaError;
use crate::media::{MediaConstraints, MediaDevices, MediaStream, MediaTrack, StreamSource, TrackKind};
use std::sync::Arc;
use tracing::{debug, info};

/// Single owner of local capture.
///
/// Holds at most one user stream and one screen stream. The active pointer
/// picks which of them peers receive.
pub struct LocalMediaManager {
    devices: Arc<dyn MediaDevices>,
    user: Option<MediaStream>,
    screen: Option<MediaStream>,
    active: Option<StreamSource>,
    user_constraints: Option<MediaConstraints>,
}

impl LocalMediaManager {
    pub fn new(devices: Arc<dyn MediaDevices>) -> Self {
        Self {
            devices,
            user: None,
            screen: None,
            active: None,
            user_constraints: None,
        }
    }

    /// Captures camera and microphone and makes them the active stream.
    pub async fn acquire_user_media(
        &mut self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, MediaError> {
        let stream = self.devices.get_user_media(constraints).await?;
        if let Some(previous) = self.user.replace(stream.clone()) {
            previous.stop();
        }
        self.user_constraints = Some(constraints.clone());
        self.active = Some(StreamSource::User);
        info!("Acquired user media ({} tracks)", stream.tracks().len());
        Ok(stream)
    }

    /// Captures the screen. Publication does not switch until [`activate`](Self::activate).
    pub async fn acquire_screen_media(
        &mut self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, MediaError> {
        let stream = self.devices.get_display_media(constraints).await?;
        if let Some(previous) = self.screen.replace(stream.clone()) {
            previous.stop();
        }
        info!("Acquired screen media");
        Ok(stream)
    }

    pub fn activate(&mut self, source: StreamSource) -> Result<&MediaStream, MediaError> {
        let stream = match source {
            StreamSource::User => self.user.as_ref(),
            StreamSource::Screen => self.screen.as_ref(),
        }
        .ok_or(MediaError::NotAcquired(source))?;
        self.active = Some(source);
        Ok(stream)
    }

    pub fn active_source(&self) -> Option<StreamSource> {
        self.active
    }

    pub fn active_stream(&self) -> Option<&MediaStream> {
        match self.active? {
            StreamSource::User => self.user.as_ref(),
            StreamSource::Screen => self.screen.as_ref(),
        }
    }

    /// Tracks peers should currently carry. Empty without an active stream.
    pub fn active_tracks(&self) -> Vec<MediaTrack> {
        self.active_stream()
            .map(|s| s.tracks().to_vec())
            .unwrap_or_default()
    }

    pub fn user_stream(&self) -> Option<&MediaStream> {
        self.user.as_ref()
    }

    pub fn screen_stream(&self) -> Option<&MediaStream> {
        self.screen.as_ref()
    }

    /// Flips `enabled` on every `kind` track of the active stream.
    ///
    /// Capture keeps running. Returns the new state of the first flipped
    /// track, or `None` when the active stream has no track of that kind.
    pub fn toggle_track_kind(&self, kind: TrackKind) -> Option<bool> {
        let stream = self.active_stream()?;
        let mut result = None;
        for track in stream.tracks_of(kind) {
            let enabled = !track.is_enabled();
            track.set_enabled(enabled);
            result.get_or_insert(enabled);
        }
        debug!("Toggled {} tracks: {:?}", kind, result);
        result
    }

    /// Makes the user stream active again, recapturing it if it was released.
    pub async fn switch_to_user(&mut self) -> Result<&MediaStream, MediaError> {
        let needs_capture = self.user.as_ref().is_none_or(|s| !s.is_live());
        if needs_capture {
            let constraints = self.user_constraints.clone().unwrap_or_default();
            self.acquire_user_media(&constraints).await?;
        }
        self.activate(StreamSource::User)
    }

    /// Stops the screen stream. If it was active, nothing is active afterwards.
    pub fn stop_screen(&mut self) {
        if let Some(screen) = self.screen.take() {
            screen.stop();
        }
        if self.active == Some(StreamSource::Screen) {
            self.active = None;
        }
    }

    /// Stops every track of both streams. Safe to call repeatedly.
    pub fn release(&mut self) -> usize {
        let mut stopped = 0;
        for stream in [self.user.take(), self.screen.take()].into_iter().flatten() {
            stopped += stream.stop();
        }
        self.active = None;
        if stopped > 0 {
            info!("Released local media ({} tracks)", stopped);
        }
        stopped
    }
}
