//! Log-only notifier
//!
//! Stands in for email delivery: every affected member gets one log line.

use async_trait::async_trait;

use crate::domain::entities::MemberId;
use crate::domain::ports::MembershipNotifier;
use crate::error::NotifyError;

/// Notifier that only records events in the log
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl MembershipNotifier for LogNotifier {
    async fn notify_expired(
        &self,
        target_id: &MemberId,
        affected_ids: &[MemberId],
    ) -> Result<(), NotifyError> {
        tracing::info!(
            member_id = %target_id,
            charged = affected_ids.len(),
            "Member expired; 1.00 deducted from each active member"
        );
        for id in affected_ids {
            tracing::info!(member_id = %id, expired = %target_id, "Notified member about deduction");
        }
        Ok(())
    }

    async fn notify_reverted(
        &self,
        target_id: &MemberId,
        affected_ids: &[MemberId],
    ) -> Result<(), NotifyError> {
        tracing::info!(
            member_id = %target_id,
            refunded = affected_ids.len(),
            "Member reverted; 1.00 refunded to each charged member"
        );
        for id in affected_ids {
            tracing::info!(member_id = %id, reverted = %target_id, "Notified member about refund");
        }
        Ok(())
    }
}
