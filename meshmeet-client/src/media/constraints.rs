use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    User,
    Environment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoConstraints {
    pub width: u32,
    pub height: u32,
    pub frame_rate_ideal: u32,
    pub frame_rate_max: u32,
    pub facing_mode: Option<FacingMode>,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            frame_rate_ideal: 30,
            frame_rate_max: 60,
            facing_mode: Some(FacingMode::User),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AudioConstraints {
    pub auto_gain_control: bool,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            auto_gain_control: false,
            echo_cancellation: true,
            noise_suppression: true,
        }
    }
}

/// Capture request. `None` for a kind means "do not capture it".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConstraints {
    pub video: Option<VideoConstraints>,
    pub audio: Option<AudioConstraints>,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            video: Some(VideoConstraints::default()),
            audio: Some(AudioConstraints::default()),
        }
    }
}

impl MediaConstraints {
    pub fn none() -> Self {
        Self {
            video: None,
            audio: None,
        }
    }

    pub fn screen() -> Self {
        Self {
            video: Some(VideoConstraints {
                facing_mode: None,
                ..Default::default()
            }),
            audio: None,
        }
    }

    pub fn audio_only() -> Self {
        Self {
            video: None,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.video.is_none() && self.audio.is_none()
    }
}
