//! Scripted stand-in for the system content picker.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use parking_lot::Mutex;

use screen_capture_core::models::error::CaptureError;
use screen_capture_core::traits::picker_source::{
    PickerEvent, PickerEventSender, PickerSelection, PickerSource, SubscriptionId,
};

/// Picker whose "user" is a queue of scripted responses.
///
/// `present()` answers asynchronously from a `synthetic-picker` thread with
/// the next scripted event, the way the system picker reports back after
/// the user interacts with it. Events can also be published directly.
#[derive(Default)]
pub struct SyntheticPicker {
    subscribers: Mutex<HashMap<SubscriptionId, PickerEventSender>>,
    next_id: AtomicU64,
    script: Mutex<VecDeque<PickerEvent>>,
}

impl SyntheticPicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the response to the next `present()`.
    pub fn script(&self, event: PickerEvent) {
        self.script.lock().push_back(event);
    }

    pub fn pick(&self, selection: PickerSelection) {
        self.publish(PickerEvent::TargetUpdated(selection));
    }

    pub fn cancel(&self) {
        self.publish(PickerEvent::Canceled);
    }

    pub fn publish(&self, event: PickerEvent) {
        let subscribers: Vec<_> = self.subscribers.lock().values().cloned().collect();
        for subscriber in subscribers {
            if !subscriber.send(event.clone()) {
                log::debug!("Picker subscriber went away");
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl PickerSource for SyntheticPicker {
    fn subscribe(&self, events: PickerEventSender) -> Result<SubscriptionId, CaptureError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.subscribers.lock().insert(id, events);
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.lock().remove(&id);
    }

    fn present(&self) -> Result<(), CaptureError> {
        let event = self.script.lock().pop_front().unwrap_or(PickerEvent::Canceled);
        let subscribers: Vec<_> = self.subscribers.lock().values().cloned().collect();
        thread::Builder::new()
            .name("synthetic-picker".into())
            .spawn(move || {
                for subscriber in subscribers {
                    subscriber.send(event.clone());
                }
            })
            .map_err(|e| CaptureError::Unknown(format!("failed to spawn picker thread: {}", e)))?;
        Ok(())
    }
}
