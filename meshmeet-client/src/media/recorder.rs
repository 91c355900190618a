use crate::error::MediaError;
use crate::media::TrackKind;
use crate::peer::MediaFeed;
use bytes::Bytes;
use futures::future;
use meshmeet_core::Identity;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const DEFAULT_RECORDING_MIME_TYPE: &str = "video/webm;codecs=vp9";
pub const DEFAULT_AUDIO_BITS_PER_SECOND: u32 = 128_000;
pub const DEFAULT_VIDEO_BITS_PER_SECOND: u32 = 2_500_000;

/// Container and bitrate hints attached to every recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderOptions {
    pub mime_type: String,
    pub audio_bits_per_second: u32,
    pub video_bits_per_second: u32,
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            mime_type: DEFAULT_RECORDING_MIME_TYPE.to_string(),
            audio_bits_per_second: DEFAULT_AUDIO_BITS_PER_SECOND,
            video_bits_per_second: DEFAULT_VIDEO_BITS_PER_SECOND,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedChunk {
    pub kind: TrackKind,
    pub data: Bytes,
}

/// Everything captured from one participant between start and stop.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub identity: Identity,
    pub options: RecorderOptions,
    pub chunks: Vec<RecordedChunk>,
    pub started_at: SystemTime,
    pub duration: Duration,
}

impl Recording {
    /// Suggested name when the recording is written out.
    pub fn file_name(&self) -> String {
        format!("{}_record", self.identity)
    }

    /// Total payload bytes across all chunks.
    pub fn byte_len(&self) -> usize {
        self.chunks.iter().map(|c| c.data.len()).sum()
    }

    pub fn chunks_of(&self, kind: TrackKind) -> impl Iterator<Item = &RecordedChunk> {
        self.chunks.iter().filter(move |c| c.kind == kind)
    }
}

/// A running recorder over the feeds of one participant's stream.
///
/// Chunks are collected on a background task until [`StreamRecorder::stop`];
/// frames already buffered when stop arrives are still kept.
pub struct StreamRecorder {
    identity: Identity,
    stop: oneshot::Sender<()>,
    task: JoinHandle<Recording>,
}

impl StreamRecorder {
    pub fn start(identity: Identity, feeds: Vec<MediaFeed>, options: RecorderOptions) -> Self {
        debug!("Recording {} over {} feeds", identity, feeds.len());
        let (stop, stopped) = oneshot::channel();
        let task = tokio::spawn(record(identity.clone(), feeds, options, stopped));
        Self {
            identity,
            stop,
            task,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub async fn stop(self) -> Result<Recording, MediaError> {
        let _ = self.stop.send(());
        self.task
            .await
            .map_err(|e| MediaError::RecorderFailed(e.to_string()))
    }
}

async fn record(
    identity: Identity,
    mut feeds: Vec<MediaFeed>,
    options: RecorderOptions,
    mut stopped: oneshot::Receiver<()>,
) -> Recording {
    let started_at = SystemTime::now();
    let started = Instant::now();
    let mut chunks = Vec::new();

    loop {
        if feeds.is_empty() {
            let _ = (&mut stopped).await;
            break;
        }

        let next = future::select_all(feeds.iter_mut().map(|(kind, frames)| {
            let kind = *kind;
            Box::pin(async move { (kind, frames.recv().await) })
        }));
        let mut ended = None;
        tokio::select! {
            _ = &mut stopped => break,
            ((kind, received), index, _) = next => match received {
                Ok(data) => chunks.push(RecordedChunk { kind, data }),
                Err(RecvError::Lagged(missed)) => {
                    warn!("Recorder for {} lost {} {} chunks", identity, missed, kind);
                }
                Err(RecvError::Closed) => ended = Some(index),
            },
        }
        if let Some(index) = ended {
            let (kind, _) = feeds.remove(index);
            debug!("{} feed of {} ended", kind, identity);
        }
    }

    for (kind, frames) in &mut feeds {
        loop {
            match frames.try_recv() {
                Ok(data) => chunks.push(RecordedChunk { kind: *kind, data }),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    }

    Recording {
        identity,
        options,
        chunks,
        started_at,
        duration: started.elapsed(),
    }
}
