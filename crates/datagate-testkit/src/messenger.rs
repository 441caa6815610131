//! Recording change messenger

use async_trait::async_trait;
use datagate_core::effects::ChangeMessengerEffects;
use datagate_core::{ChangeMessage, ChangeType, ObjectType};
use parking_lot::Mutex;

/// Keeps every published change for inspection
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    messages: Mutex<Vec<ChangeMessage>>,
}

impl RecordingMessenger {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far
    pub fn messages(&self) -> Vec<ChangeMessage> {
        self.messages.lock().clone()
    }

    /// Remove and return everything published so far
    pub fn take(&self) -> Vec<ChangeMessage> {
        std::mem::take(&mut *self.messages.lock())
    }

    /// Published messages of one object and change type
    pub fn of(&self, object_type: ObjectType, change_type: ChangeType) -> Vec<ChangeMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.object_type == object_type && m.change_type == change_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ChangeMessengerEffects for RecordingMessenger {
    async fn publish(&self, messages: Vec<ChangeMessage>) {
        self.messages.lock().extend(messages);
    }
}
