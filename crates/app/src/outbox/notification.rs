//! Scheduled-change notifications
//!
//! The highest-discount selector never changes the discount of a student
//! product that already has a change scheduled. Staff at the product's
//! location are told instead, in English and Japanese.

use bursar::{
    discounts::UpdateProductDiscount,
    ids::{LocationId, StudentId, StudentProductId, UserId},
    lifecycle::StudentProductLabel,
};
use serde::Serialize;

use crate::outbox::{OutboxEvent, Topic};

/// Roles notified about blocked discount changes.
pub const NOTIFIED_ROLES: &[&str] = &["Centre Manager", "Centre Lead", "HQ Staff"];

/// Localized text of a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationMessage {
    pub language: &'static str,
    pub title: String,
    pub content: String,
}

/// A discount change that could not be applied automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledChangeNotification {
    pub student_id: StudentId,
    pub student_product_id: StudentProductId,
    pub location_id: LocationId,
    pub label: StudentProductLabel,
    pub recipients: Vec<UserId>,
    pub messages: Vec<NotificationMessage>,
}

impl ScheduledChangeNotification {
    #[must_use]
    pub fn new(
        update: &UpdateProductDiscount,
        label: StudentProductLabel,
        recipients: Vec<UserId>,
    ) -> Self {
        let (change_en, change_ja) = describe(label);
        let student = &update.student_id;
        let product = &update.student_product_id;

        Self {
            student_id: update.student_id.clone(),
            student_product_id: update.student_product_id.clone(),
            location_id: update.location_id.clone(),
            label,
            recipients,
            messages: vec![
                NotificationMessage {
                    language: "en",
                    title: "Discount was not updated automatically".to_string(),
                    content: format!(
                        "Student {student} has a {change_en} scheduled for product {product}, so its \
                         discount was not updated. Please review the discount manually."
                    ),
                },
                NotificationMessage {
                    language: "ja",
                    title: "割引が自動更新されませんでした".to_string(),
                    content: format!(
                        "生徒 {student} の商品 {product} は{change_ja}が予定されているため、\
                         割引を自動更新できませんでした。割引を手動で確認してください。"
                    ),
                },
            ],
        }
    }

    /// The outbox event publishing this notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification cannot be serialized.
    pub fn to_event(&self) -> Result<OutboxEvent, serde_json::Error> {
        OutboxEvent::encode(Topic::Notification, self.student_product_id.as_str(), self)
    }
}

fn describe(label: StudentProductLabel) -> (&'static str, &'static str) {
    match label {
        StudentProductLabel::UpdateScheduled => ("product update", "変更"),
        StudentProductLabel::WithdrawalScheduled => ("withdrawal", "退会"),
        StudentProductLabel::GraduationScheduled => ("graduation", "卒業"),
        StudentProductLabel::PauseScheduled => ("pause", "休会"),
        StudentProductLabel::Created | StudentProductLabel::Updated | StudentProductLabel::Paused => {
            ("change", "変更")
        }
    }
}
