use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Encoded frames a subscriber may fall behind by before it starts losing them.
pub const FRAME_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Audio => f.write_str("audio"),
            Self::Video => f.write_str("video"),
        }
    }
}

/// Where a local stream comes from.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamSource {
    User,
    Screen,
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Screen => f.write_str("screen"),
        }
    }
}

#[derive(Debug)]
struct TrackShared {
    enabled: AtomicBool,
    live: AtomicBool,
    frames: broadcast::Sender<Bytes>,
}

/// Handle to one captured track.
///
/// Clones share the same flags and frame feed, so a track published on
/// several peer links mutes everywhere at once.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    id: String,
    kind: TrackKind,
    label: String,
    shared: Arc<TrackShared>,
}

impl MediaTrack {
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            label: label.into(),
            shared: Arc::new(TrackShared {
                enabled: AtomicBool::new(true),
                live: AtomicBool::new(true),
                frames: broadcast::channel(FRAME_BUFFER).0,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.shared.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_live(&self) -> bool {
        self.shared.live.load(Ordering::SeqCst)
    }

    /// Ends capture. Returns `false` if the track was already stopped.
    pub fn stop(&self) -> bool {
        self.shared.live.swap(false, Ordering::SeqCst)
    }

    /// Hands one encoded frame from the capture backend to every subscriber.
    ///
    /// Muted and stopped tracks produce nothing. Returns the number of
    /// subscribers reached.
    pub fn write_frame(&self, frame: impl Into<Bytes>) -> usize {
        if !self.is_live() || !self.is_enabled() {
            return 0;
        }
        self.shared.frames.send(frame.into()).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.shared.frames.subscribe()
    }
}

#[derive(Debug, Clone)]
pub struct MediaStream {
    id: String,
    source: StreamSource,
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(source: StreamSource, tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source,
            tracks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> StreamSource {
        self.source
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn tracks_of(&self, kind: TrackKind) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(move |t| t.kind() == kind)
    }

    /// Live while any track is still capturing.
    pub fn is_live(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_live)
    }

    /// Stops every track and returns how many were actually running.
    pub fn stop(&self) -> usize {
        self.tracks.iter().filter(|t| t.stop()).count()
    }
}
