use crate::error::MediaError;
use crate::media::{MediaConstraints, MediaStream, MediaTrack, StreamSource, TrackKind};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Platform capture backend.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn get_user_media(&self, constraints: &MediaConstraints) -> Result<MediaStream, MediaError>;

    async fn get_display_media(&self, constraints: &MediaConstraints)
    -> Result<MediaStream, MediaError>;
}

#[derive(Debug)]
struct SyntheticState {
    deny_user: AtomicBool,
    deny_screen: AtomicBool,
    camera: AtomicBool,
    microphone: AtomicBool,
    acquisitions: AtomicUsize,
    issued: Mutex<Vec<MediaTrack>>,
}

/// Capture devices that hand out tracks without touching hardware.
///
/// Permission and device presence can be flipped at any time, which makes
/// it the backend for tests, the demo and receive-only clients.
#[derive(Debug, Clone)]
pub struct SyntheticDevices {
    state: Arc<SyntheticState>,
}

impl Default for SyntheticDevices {
    fn default() -> Self {
        Self {
            state: Arc::new(SyntheticState {
                deny_user: AtomicBool::new(false),
                deny_screen: AtomicBool::new(false),
                camera: AtomicBool::new(true),
                microphone: AtomicBool::new(true),
                acquisitions: AtomicUsize::new(0),
                issued: Mutex::new(Vec::new()),
            }),
        }
    }
}

impl SyntheticDevices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny_user_permission(&self, deny: bool) {
        self.state.deny_user.store(deny, Ordering::SeqCst);
    }

    pub fn deny_screen_permission(&self, deny: bool) {
        self.state.deny_screen.store(deny, Ordering::SeqCst);
    }

    pub fn set_camera_present(&self, present: bool) {
        self.state.camera.store(present, Ordering::SeqCst);
    }

    pub fn set_microphone_present(&self, present: bool) {
        self.state.microphone.store(present, Ordering::SeqCst);
    }

    /// Number of successful captures so far.
    pub fn acquisitions(&self) -> usize {
        self.state.acquisitions.load(Ordering::SeqCst)
    }

    /// Handed-out tracks that have not been stopped yet.
    pub fn live_tracks(&self) -> usize {
        self.issued().iter().filter(|t| t.is_live()).count()
    }

    /// Feeds one encoded frame into every live `kind` track handed out so far,
    /// the way a capture backend would. Returns the number of subscribers reached.
    pub fn capture_frame(&self, kind: TrackKind, frame: &[u8]) -> usize {
        let frame = Bytes::copy_from_slice(frame);
        self.issued()
            .iter()
            .filter(|t| t.kind() == kind && t.is_live())
            .map(|t| t.write_frame(frame.clone()))
            .sum()
    }

    fn issued(&self) -> std::sync::MutexGuard<'_, Vec<MediaTrack>> {
        self.state.issued.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn hand_out(&self, source: StreamSource, tracks: Vec<MediaTrack>) -> MediaStream {
        self.state.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.issued().extend(tracks.iter().cloned());
        MediaStream::new(source, tracks)
    }
}

#[async_trait]
impl MediaDevices for SyntheticDevices {
    async fn get_user_media(&self, constraints: &MediaConstraints) -> Result<MediaStream, MediaError> {
        if constraints.is_empty() {
            return Err(MediaError::NoTracksRequested);
        }
        if self.state.deny_user.load(Ordering::SeqCst) {
            return Err(MediaError::PermissionDenied(StreamSource::User));
        }

        let mut tracks = Vec::new();
        if let Some(video) = &constraints.video {
            if !self.state.camera.load(Ordering::SeqCst) {
                return Err(MediaError::DeviceUnavailable(TrackKind::Video));
            }
            let label = format!(
                "synthetic camera {}x{}@{}",
                video.width, video.height, video.frame_rate_ideal
            );
            tracks.push(MediaTrack::new(TrackKind::Video, label));
        }
        if constraints.audio.is_some() {
            if !self.state.microphone.load(Ordering::SeqCst) {
                return Err(MediaError::DeviceUnavailable(TrackKind::Audio));
            }
            tracks.push(MediaTrack::new(TrackKind::Audio, "synthetic microphone"));
        }

        debug!("Synthetic user media with {} tracks", tracks.len());
        Ok(self.hand_out(StreamSource::User, tracks))
    }

    async fn get_display_media(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaStream, MediaError> {
        if self.state.deny_screen.load(Ordering::SeqCst) {
            return Err(MediaError::PermissionDenied(StreamSource::Screen));
        }
        let Some(video) = &constraints.video else {
            return Err(MediaError::NoTracksRequested);
        };

        let mut tracks = vec![MediaTrack::new(
            TrackKind::Video,
            format!("synthetic screen {}x{}", video.width, video.height),
        )];
        if constraints.audio.is_some() {
            tracks.push(MediaTrack::new(TrackKind::Audio, "synthetic system audio"));
        }

        Ok(self.hand_out(StreamSource::Screen, tracks))
    }
}
