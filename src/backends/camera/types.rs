// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use serde::{Deserialize, Serialize};

/// Camera backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CameraBackendType {
    /// In-process simulated camera
    #[default]
    Virtual,
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::Virtual => write!(f, "virtual"),
        }
    }
}

/// Sensor rotation in degrees (clockwise)
///
/// Camera sensors may be physically mounted at various angles relative to the device.
/// This is common on mobile devices where sensors are rotated 90° or 270° relative
/// to the display orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorRotation {
    /// No rotation (sensor is oriented correctly)
    #[default]
    None,
    /// 90 degrees clockwise
    Rotate90,
    /// 180 degrees (upside down)
    Rotate180,
    /// 270 degrees clockwise (90 degrees counter-clockwise)
    Rotate270,
}

impl SensorRotation {
    /// Create rotation from an integer degree value (normalised to 0-360).
    pub fn from_degrees_int(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => SensorRotation::Rotate90,
            180 => SensorRotation::Rotate180,
            270 => SensorRotation::Rotate270,
            _ => SensorRotation::None,
        }
    }

    /// Get the rotation in degrees
    pub fn degrees(&self) -> u32 {
        match self {
            SensorRotation::None => 0,
            SensorRotation::Rotate90 => 90,
            SensorRotation::Rotate180 => 180,
            SensorRotation::Rotate270 => 270,
        }
    }

    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, SensorRotation::Rotate90 | SensorRotation::Rotate270)
    }
}

impl std::fmt::Display for SensorRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Pixel dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Framerate as a fraction (numerator/denominator)
/// Stores exact framerate to handle NTSC rates like 59.94fps (60000/1001)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Framerate {
    pub num: u32,
    pub denom: u32,
}

impl Framerate {
    /// Create a new framerate from numerator and denominator
    pub fn new(num: u32, denom: u32) -> Self {
        Self {
            num,
            denom: if denom == 0 { 1 } else { denom },
        }
    }

    /// Create a framerate from an integer (e.g., 30 becomes 30/1)
    pub fn from_int(fps: u32) -> Self {
        Self { num: fps, denom: 1 }
    }

    /// Get the framerate as a floating point value
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }

    /// Frame duration for this rate: the reciprocal fraction `denom/num` seconds
    pub fn frame_duration(&self) -> FrameDuration {
        FrameDuration {
            value: self.denom,
            timescale: self.num.max(1),
        }
    }
}

impl std::fmt::Display for Framerate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.denom != 1 {
            write!(f, "{:.2}", self.as_f64())
        } else {
            write!(f, "{}", self.num)
        }
    }
}

impl Default for Framerate {
    fn default() -> Self {
        Self { num: 30, denom: 1 }
    }
}

/// Duration of a single frame, `value / timescale` seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameDuration {
    pub value: u32,
    pub timescale: u32,
}

impl FrameDuration {
    pub fn as_secs_f64(&self) -> f64 {
        self.value as f64 / self.timescale as f64
    }
}

/// Inclusive range of frame rates a format supports
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRateRange {
    pub min: f64,
    pub max: f64,
}

impl FrameRateRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, rate: Framerate) -> bool {
        let fps = rate.as_f64();
        fps >= self.min && fps <= self.max
    }
}

/// A capture format exposed by a video device
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceFormat {
    pub dimensions: Dimensions,
    pub frame_rate_ranges: Vec<FrameRateRange>,
    /// Photo sizes this format can deliver, ascending
    pub supported_max_photo_dimensions: Vec<Dimensions>,
    pub video_stabilization_supported: bool,
    /// FourCC code (e.g., "420v", "x420")
    pub pixel_format: String,
}

impl DeviceFormat {
    /// A format with a single `[min, max]` frame rate range
    pub fn new(width: u32, height: u32, min_fps: f64, max_fps: f64) -> Self {
        let dimensions = Dimensions::new(width, height);
        Self {
            dimensions,
            frame_rate_ranges: vec![FrameRateRange::new(min_fps, max_fps)],
            supported_max_photo_dimensions: vec![dimensions],
            video_stabilization_supported: true,
            pixel_format: "420v".to_string(),
        }
    }

    pub fn supports(&self, rate: Framerate) -> bool {
        self.frame_rate_ranges.iter().any(|r| r.contains(rate))
    }

    /// Largest photo the format can produce
    pub fn largest_photo_dimensions(&self) -> Option<Dimensions> {
        self.supported_max_photo_dimensions.last().copied()
    }
}

impl std::fmt::Display for DeviceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let max = self
            .frame_rate_ranges
            .iter()
            .map(|r| r.max)
            .fold(0.0_f64, f64::max);
        write!(f, "{} @ {}fps ({})", self.dimensions, max, self.pixel_format)
    }
}

/// Movie resolution class selectable by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MovieResolution {
    /// 1920x1080
    #[default]
    Hd,
    /// 3840x2160
    Hd4k,
}

impl MovieResolution {
    pub const ALL: [MovieResolution; 2] = [MovieResolution::Hd, MovieResolution::Hd4k];

    pub fn dimensions(&self) -> Dimensions {
        match self {
            MovieResolution::Hd => Dimensions::new(1920, 1080),
            MovieResolution::Hd4k => Dimensions::new(3840, 2160),
        }
    }

    /// Session preset matching this resolution class
    pub fn preset(&self) -> SessionPreset {
        match self {
            MovieResolution::Hd => SessionPreset::Hd1920x1080,
            MovieResolution::Hd4k => SessionPreset::Hd4k3840x2160,
        }
    }
}

impl std::fmt::Display for MovieResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MovieResolution::Hd => write!(f, "1080p"),
            MovieResolution::Hd4k => write!(f, "4K"),
        }
    }
}

impl std::str::FromStr for MovieResolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hd" | "1080" | "1080p" => Ok(MovieResolution::Hd),
            "4k" | "uhd" | "2160" | "2160p" => Ok(MovieResolution::Hd4k),
            other => Err(format!("unknown resolution '{}'", other)),
        }
    }
}

/// Movie frame rate selectable by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MovieFrameRate {
    #[default]
    Thirty,
    Sixty,
}

impl MovieFrameRate {
    pub const ALL: [MovieFrameRate; 2] = [MovieFrameRate::Thirty, MovieFrameRate::Sixty];

    pub fn fps(&self) -> u32 {
        match self {
            MovieFrameRate::Thirty => 30,
            MovieFrameRate::Sixty => 60,
        }
    }

    pub fn framerate(&self) -> Framerate {
        Framerate::from_int(self.fps())
    }

    pub fn from_fps(fps: u32) -> Option<Self> {
        match fps {
            30 => Some(MovieFrameRate::Thirty),
            60 => Some(MovieFrameRate::Sixty),
            _ => None,
        }
    }
}

/// Discrete zoom steps offered in the studio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ZoomFactor {
    #[default]
    One,
    OneAndHalf,
    Two,
}

impl ZoomFactor {
    pub const ALL: [ZoomFactor; 3] = [ZoomFactor::One, ZoomFactor::OneAndHalf, ZoomFactor::Two];

    /// Value handed to the device's video zoom
    pub fn video_zoom_factor(&self) -> f64 {
        match self {
            ZoomFactor::One => 1.0,
            ZoomFactor::OneAndHalf => 1.5,
            ZoomFactor::Two => 2.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ZoomFactor::One => "1.0x",
            ZoomFactor::OneAndHalf => "1.5x",
            ZoomFactor::Two => "2.0x",
        }
    }
}

impl std::str::FromStr for ZoomFactor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_end_matches(['x', 'X']) {
            "1" | "1.0" => Ok(ZoomFactor::One),
            "1.5" => Ok(ZoomFactor::OneAndHalf),
            "2" | "2.0" => Ok(ZoomFactor::Two),
            other => Err(format!("unsupported zoom '{}', use 1, 1.5 or 2", other)),
        }
    }
}

/// Session preset (resolution class of the whole pipeline)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionPreset {
    /// Full sensor photo preset
    #[default]
    Photo,
    Hd1920x1080,
    Hd4k3840x2160,
    /// The device's active format drives the session
    InputPriority,
}

impl SessionPreset {
    /// Video dimensions a movie preset selects
    pub fn movie_dimensions(&self) -> Option<Dimensions> {
        match self {
            SessionPreset::Hd1920x1080 => Some(MovieResolution::Hd.dimensions()),
            SessionPreset::Hd4k3840x2160 => Some(MovieResolution::Hd4k.dimensions()),
            SessionPreset::Photo | SessionPreset::InputPriority => None,
        }
    }
}

/// Focus mode of a video device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusMode {
    Locked,
    /// Single-shot auto focus, then lock
    AutoFocus,
    #[default]
    ContinuousAutoFocus,
}

/// Exposure mode of a video device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExposureMode {
    Locked,
    /// Single-shot auto exposure, then lock
    AutoExpose,
    #[default]
    ContinuousAutoExposure,
}

/// Normalized point in device coordinates, (0,0) top-left to (1,1) bottom-right
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DevicePoint {
    pub x: f64,
    pub y: f64,
}

impl DevicePoint {
    /// Create a point, clamping both coordinates into `[0, 1]`
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: x.clamp(0.0, 1.0),
            y: y.clamp(0.0, 1.0),
        }
    }

    pub fn center() -> Self {
        Self { x: 0.5, y: 0.5 }
    }
}

/// Photo codec offered by the photo output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PhotoCodec {
    #[default]
    Hevc,
    Jpeg,
}

impl PhotoCodec {
    pub fn extension(&self) -> &'static str {
        match self {
            PhotoCodec::Hevc => "heic",
            PhotoCodec::Jpeg => "jpg",
        }
    }
}

/// Quality/speed trade-off of photo processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QualityPrioritization {
    Speed,
    Balanced,
    #[default]
    Quality,
}

/// Represents an audio input device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    pub name: String,
    pub id: String,
    pub is_default: bool,
}

/// Photo resolved by the backend when it accepts a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolvedPhotoSettings {
    pub photo_dimensions: Dimensions,
    /// Non-zero when the backend delivered a deferred proxy instead of a final photo
    pub deferred_proxy_dimensions: Dimensions,
}

impl ResolvedPhotoSettings {
    pub fn is_deferred(&self) -> bool {
        self.deferred_proxy_dimensions.width > 0 && self.deferred_proxy_dimensions.height > 0
    }
}

/// Identifier correlating a photo request with its completion callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub i64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a capture session, handed to preview surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable settings snapshot for one photo
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    pub id: RequestId,
    pub codec: PhotoCodec,
    pub max_dimensions: Dimensions,
    pub quality: QualityPrioritization,
    /// Embedded preview pixel format, when the output offers one
    pub preview_pixel_format: Option<String>,
}

/// Error delivered with a finished recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingFailure {
    pub message: String,
    /// The file is usable despite the error (e.g. disk-space warning)
    pub recorded_successfully: bool,
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Camera or microphone not found
    DeviceNotFound(String),
    /// Format not supported
    FormatNotSupported(String),
    /// lock_for_configuration was refused
    LockFailed(String),
    /// Recording already in progress
    RecordingInProgress,
    /// No recording in progress
    NoRecordingInProgress,
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::LockFailed(msg) => write!(f, "Lock failed: {}", msg),
            BackendError::RecordingInProgress => write!(f, "Recording already in progress"),
            BackendError::NoRecordingInProgress => write!(f, "No recording in progress"),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}
