//! Synthetic capture service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use screen_capture_core::models::config::StreamConfigSpec;
use screen_capture_core::models::content::{RunningApplication, ShareableContent};
use screen_capture_core::models::error::CaptureError;
use screen_capture_core::models::filter::FilterSpec;
use screen_capture_core::models::target::{DisplayInfo, Rect, Size, WindowInfo};
use screen_capture_core::traits::capture_service::{CaptureService, CaptureStream, StreamDelegate};

use crate::stream::{StreamShared, SyntheticStream};

/// Behavior knobs for the synthetic backend.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticOptions {
    /// Whether screen recording permission is granted.
    pub permission_granted: bool,
    /// Delay before start/stop/update requests are acknowledged.
    pub ack_latency: Duration,
    /// Frames per generated audio chunk.
    pub audio_frames_per_chunk: usize,
    /// Emit an idle-status frame every N frames, as a static screen would.
    pub idle_frame_every: Option<u64>,
}

impl Default for SyntheticOptions {
    fn default() -> Self {
        Self {
            permission_granted: true,
            ack_latency: Duration::ZERO,
            audio_frames_per_chunk: 480,
            idle_frame_every: None,
        }
    }
}

/// In-process `CaptureService` producing generated content.
///
/// Hosts at most one live stream at a time. Targets are checked against the
/// current `ShareableContent` when a stream is opened.
pub struct SyntheticCaptureService {
    content: RwLock<ShareableContent>,
    options: SyntheticOptions,
    live: Arc<AtomicBool>,
    active: Mutex<Weak<StreamShared>>,
}

impl SyntheticCaptureService {
    pub fn new(content: ShareableContent) -> Self {
        Self::with_options(content, SyntheticOptions::default())
    }

    pub fn with_options(content: ShareableContent, options: SyntheticOptions) -> Self {
        Self {
            content: RwLock::new(content),
            options,
            live: Arc::new(AtomicBool::new(false)),
            active: Mutex::new(Weak::new()),
        }
    }

    /// A service with a small desktop: two displays, three windows.
    pub fn demo() -> Self {
        Self::new(demo_content())
    }

    /// Replace what is on screen, e.g. to simulate a window closing.
    pub fn set_content(&self, content: ShareableContent) {
        *self.content.write() = content;
    }

    pub fn has_live_stream(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Make the live stream fail on its own, as an unplugged display would.
    /// Returns false if no stream is open.
    pub fn interrupt_stream(&self, error: CaptureError) -> bool {
        let active = self.active.lock().upgrade();
        match active {
            Some(stream) => {
                stream.interrupt(error);
                true
            }
            None => false,
        }
    }

    fn check_permission(&self) -> Result<(), CaptureError> {
        if self.options.permission_granted {
            Ok(())
        } else {
            Err(CaptureError::PermissionDenied)
        }
    }

    fn check_target(&self, filter: &FilterSpec) -> Result<(), CaptureError> {
        let content = self.content.read();
        let present = match filter {
            FilterSpec::Empty => {
                return Err(CaptureError::ConfigurationRejected("empty filter".into()));
            }
            FilterSpec::Display { display, .. } => content.display(display.id).is_some(),
            FilterSpec::Window { window } => content.window(window.id).is_some(),
        };
        if present {
            Ok(())
        } else {
            Err(CaptureError::TargetUnavailable)
        }
    }
}

impl CaptureService for SyntheticCaptureService {
    fn shareable_content(&self) -> Result<ShareableContent, CaptureError> {
        self.check_permission()?;
        Ok(self.content.read().clone())
    }

    fn open_stream(
        &self,
        filter: &FilterSpec,
        config: &StreamConfigSpec,
        delegate: Arc<dyn StreamDelegate>,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        self.check_permission()?;
        self.check_target(filter)?;
        if config.width == 0 || config.height == 0 {
            return Err(CaptureError::ConfigurationRejected(format!(
                "invalid output size {}x{}",
                config.width, config.height
            )));
        }
        if self
            .live
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CaptureError::StreamAlreadyActive);
        }

        log::info!("Opening synthetic stream: {}", filter.describe());
        let stream = SyntheticStream::new(
            filter.clone(),
            config.clone(),
            delegate,
            self.options.clone(),
            Arc::clone(&self.live),
        );
        *self.active.lock() = stream.handle();
        Ok(Box::new(stream))
    }
}

pub fn demo_content() -> ShareableContent {
    ShareableContent {
        displays: vec![
            DisplayInfo {
                id: 1,
                resolution: Size::new(1920.0, 1080.0),
                scale_factor: 2.0,
            },
            DisplayInfo {
                id: 2,
                resolution: Size::new(2560.0, 1440.0),
                scale_factor: 1.0,
            },
        ],
        windows: vec![
            WindowInfo {
                id: 101,
                frame: Rect::new(100.0, 80.0, 1200.0, 800.0),
                title: Some("Editor".into()),
                bundle_id: Some("com.example.editor".into()),
            },
            WindowInfo {
                id: 102,
                frame: Rect::new(400.0, 300.0, 640.0, 480.0),
                title: Some("Chat".into()),
                bundle_id: Some("com.example.chat".into()),
            },
            WindowInfo {
                id: 103,
                frame: Rect::new(0.0, 0.0, 320.0, 240.0),
                title: None,
                bundle_id: Some("com.example.chat".into()),
            },
        ],
        applications: vec![
            RunningApplication {
                bundle_id: "com.example.editor".into(),
                name: "Editor".into(),
                process_id: 4101,
            },
            RunningApplication {
                bundle_id: "com.example.chat".into(),
                name: "Chat".into(),
                process_id: 4102,
            },
        ],
    }
}
