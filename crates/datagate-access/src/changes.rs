//! Post-commit change buffering

use datagate_core::effects::ChangeMessengerEffects;
use datagate_core::{ChangeMessage, ChangeType, ObjectType, PrincipalId, Timestamp};
use std::fmt::Display;

/// Change messages collected during a transaction
///
/// The batch is filled while the transaction runs and published once it has
/// committed; a rolled-back transaction drops its batch unpublished.
#[derive(Debug, Clone)]
pub struct ChangeBatch {
    actor: PrincipalId,
    at: Timestamp,
    messages: Vec<ChangeMessage>,
}

impl ChangeBatch {
    /// Empty batch for changes made by `actor` at `at`
    pub fn new(actor: PrincipalId, at: Timestamp) -> Self {
        Self {
            actor,
            at,
            messages: Vec::new(),
        }
    }

    /// Record a change
    pub fn record(&mut self, object_type: ObjectType, object_id: impl Display, change_type: ChangeType) {
        self.messages.push(ChangeMessage::new(
            object_type,
            object_id,
            change_type,
            self.actor,
            self.at,
        ));
    }

    /// Record one change per id
    pub fn record_all<I, T>(&mut self, object_type: ObjectType, ids: I, change_type: ChangeType)
    where
        I: IntoIterator<Item = T>,
        T: Display,
    {
        for id in ids {
            self.record(object_type, id, change_type);
        }
    }

    /// Number of buffered messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Buffered messages
    pub fn messages(&self) -> &[ChangeMessage] {
        &self.messages
    }

    /// Publish everything recorded
    pub async fn publish<M: ChangeMessengerEffects + ?Sized>(self, messenger: &M) {
        if !self.messages.is_empty() {
            messenger.publish(self.messages).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn records_carry_actor_and_time() {
        let at = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut batch = ChangeBatch::new(PrincipalId::new(5), at);
        batch.record_all(ObjectType::AccessApproval, [1u64, 2], ChangeType::Update);
        batch.record(ObjectType::DataAccessSubmissionStatus, 9, ChangeType::Update);

        assert_eq!(batch.len(), 3);
        assert!(batch
            .messages()
            .iter()
            .all(|m| m.user_id == PrincipalId::new(5) && m.timestamp == at));
        assert_eq!(batch.messages()[1].object_id, "2");
    }
}
