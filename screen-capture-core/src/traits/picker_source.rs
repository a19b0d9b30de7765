use std::sync::mpsc::Sender;

use crate::models::error::CaptureError;
use crate::models::target::{CaptureTarget, ExclusionSet};

pub type SubscriptionId = u64;

/// What the user picked in the system picker.
#[derive(Debug, Clone, PartialEq)]
pub struct PickerSelection {
    pub target: CaptureTarget,
    /// Only honored for display targets.
    pub exclusions: ExclusionSet,
}

impl PickerSelection {
    pub fn new(target: CaptureTarget) -> Self {
        Self {
            target,
            exclusions: ExclusionSet::default(),
        }
    }
}

/// Notifications published by the picker.
#[derive(Debug, Clone, PartialEq)]
pub enum PickerEvent {
    TargetUpdated(PickerSelection),
    Canceled,
    Failed(String),
}

pub(crate) enum PickerMessage {
    Event(PickerEvent),
    Shutdown,
}

/// Handle a picker source publishes events through.
#[derive(Clone)]
pub struct PickerEventSender {
    tx: Sender<PickerMessage>,
}

impl PickerEventSender {
    pub(crate) fn new(tx: Sender<PickerMessage>) -> Self {
        Self { tx }
    }

    /// Returns false once the subscriber is gone.
    pub fn send(&self, event: PickerEvent) -> bool {
        self.tx.send(PickerMessage::Event(event)).is_ok()
    }
}

/// External, system-level target picker with publish/subscribe delivery.
///
/// Events may arrive on any thread, in any order relative to UI calls.
pub trait PickerSource: Send + Sync {
    fn subscribe(&self, events: PickerEventSender) -> Result<SubscriptionId, CaptureError>;

    /// Stop publishing to a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);

    /// Show the picker UI.
    fn present(&self) -> Result<(), CaptureError>;
}
