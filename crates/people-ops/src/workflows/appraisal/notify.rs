use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::domain::{Evaluation, UserId};

/// Payload handed to the external push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushNotification {
    pub recipient: UserId,
    pub title: String,
    pub body: String,
    /// Deep link into the portal UI for the affected evaluation.
    pub link: String,
}

/// Outbound port over the browser push delivery service. Delivery is
/// best-effort; retries, subscription storage, and read receipts live on the
/// other side of this trait.
pub trait PushChannel: Send + Sync {
    fn deliver(&self, notification: PushNotification) -> Result<(), PushError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("push transport unavailable: {0}")]
    Transport(String),
}

/// Workflow moments that warrant a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationEvent {
    CycleOpened,
    AwaitingApproval,
    Approved,
    Rejected,
    Completed,
}

impl EvaluationEvent {
    pub const fn label(self) -> &'static str {
        match self {
            EvaluationEvent::CycleOpened => "cycle_opened",
            EvaluationEvent::AwaitingApproval => "awaiting_approval",
            EvaluationEvent::Approved => "approved",
            EvaluationEvent::Rejected => "rejected",
            EvaluationEvent::Completed => "completed",
        }
    }
}

/// Thin orchestration layer between state transitions and the push channel.
///
/// Dispatch is fire-and-forget: a delivery failure is logged and never rolls
/// back or blocks the transition that triggered it.
pub struct NotificationDispatcher<P> {
    channel: Arc<P>,
}

impl<P> NotificationDispatcher<P>
where
    P: PushChannel,
{
    pub fn new(channel: Arc<P>) -> Self {
        Self { channel }
    }

    pub fn notify(&self, recipient: &UserId, evaluation: &Evaluation, event: EvaluationEvent) {
        let notification = build_notification(recipient, evaluation, event);

        match self.channel.deliver(notification) {
            Ok(()) => debug!(
                evaluation = %evaluation.id,
                recipient = %recipient,
                event = event.label(),
                "notification dispatched"
            ),
            Err(err) => warn!(
                evaluation = %evaluation.id,
                recipient = %recipient,
                event = event.label(),
                error = %err,
                "notification dropped"
            ),
        }
    }
}

fn build_notification(
    recipient: &UserId,
    evaluation: &Evaluation,
    event: EvaluationEvent,
) -> PushNotification {
    let period = evaluation.period;
    let employee = evaluation.employee.display_name.as_str();

    let (title, body) = match event {
        EvaluationEvent::CycleOpened => (
            "New performance evaluation".to_string(),
            format!("The {period} evaluation of {employee} is ready to be filled in."),
        ),
        EvaluationEvent::AwaitingApproval => (
            "Evaluation awaiting your approval".to_string(),
            format!("The {period} evaluation of {employee} was submitted for your review."),
        ),
        EvaluationEvent::Approved => (
            "Evaluation approved".to_string(),
            format!("Your {period} evaluation of {employee} was approved."),
        ),
        EvaluationEvent::Rejected => {
            let reason = evaluation
                .rejection_reason
                .as_deref()
                .unwrap_or("no reason given");
            (
                "Evaluation returned for revision".to_string(),
                format!(
                    "Your {period} evaluation of {employee} was returned: {reason}"
                ),
            )
        }
        EvaluationEvent::Completed => (
            "Your performance evaluation is final".to_string(),
            format!("Your {period} performance evaluation has been completed."),
        ),
    };

    PushNotification {
        recipient: recipient.clone(),
        title,
        body,
        link: format!("/appraisals/{}", evaluation.id),
    }
}
