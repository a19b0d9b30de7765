//! # screen-capture-core
//!
//! Platform-agnostic screen capture core library.
//!
//! Derives content filters and stream configurations from a capture target,
//! demultiplexes raw sample buffers into typed video frames and audio chunks,
//! and orchestrates the stream lifecycle, including live reconfiguration
//! while running. Platform backends implement `CaptureService` (and
//! optionally `PickerSource`) and plug into the generic `CaptureSession`.
//!
//! ## Architecture
//!
//! ```text
//! screen-capture-core (this crate)
//! ├── traits/       ← CaptureService, CaptureStream, CaptureDelegate, PickerSource
//! ├── models/       ← CaptureError, SessionState, CaptureTarget, FilterSpec, StreamConfigSpec, etc.
//! ├── builders/     ← build_filter, build_config
//! ├── processing/   ← demux, AudioLevelMonitor
//! └── session/      ← CaptureSession, CaptureController, PickerAdapter
//! ```

pub mod builders;
pub mod models;
pub mod processing;
pub mod session;
pub mod traits;

#[cfg(test)]
mod test_support;

// Re-export key types at crate root for convenience.
pub use builders::config_builder::{build_config, native_scale_factor};
pub use builders::filter_builder::build_filter;
pub use models::config::{AudioFlags, MediaTime, SpecPair, StreamConfigSpec};
pub use models::content::{RunningApplication, ShareableContent};
pub use models::diagnostics::{AudioLevels, DeliveryDiagnostics};
pub use models::error::CaptureError;
pub use models::filter::FilterSpec;
pub use models::media::{AudioChunk, FrameStatus, Sample, SurfaceRef, VideoFrame};
pub use models::sample_buffer::{
    AudioFormatDescription, PixelSurface, RawSampleBuffer, SampleFormat, StreamKind, VideoAttachments,
};
pub use models::settings::{CaptureSettings, SessionOptions};
pub use models::state::SessionState;
pub use models::target::{CaptureTarget, DisplayId, DisplayInfo, ExclusionSet, Rect, Size, WindowId, WindowInfo};
pub use processing::demux::demux;
pub use processing::level_monitor::AudioLevelMonitor;
pub use session::capture_session::{CaptureSession, PendingReconfiguration, ReconfigureOutcome};
pub use session::controller::{CaptureController, SelectionOutcome};
pub use session::picker_adapter::PickerAdapter;
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::capture_service::{
    AckSender, Acknowledgment, CaptureService, CaptureStream, SampleSink, StreamDelegate,
};
pub use traits::picker_source::{PickerEvent, PickerEventSender, PickerSelection, PickerSource, SubscriptionId};
