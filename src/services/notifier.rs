use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    error::Result,
    models::{post::Post, user::User},
};

/// An outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub from: String,
    pub to_name: String,
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

impl Email {
    /// Tells a subscriber that `post` was published.
    pub fn new_post(from: &str, recipient: &User, post: &Post) -> Self {
        Self {
            from: from.to_string(),
            to_name: recipient.full_name(),
            to_email: recipient.email.clone(),
            subject: "New post on the blog".to_string(),
            body: format!(
                "Hey {}, there is a new post on the blog: {}",
                recipient.first_name, post.title
            ),
        }
    }

    /// Tells the site owner that `member` registered.
    pub fn new_member(from: &str, admin_contact: &str, member: &User) -> Self {
        Self {
            from: from.to_string(),
            to_name: "Administrator".to_string(),
            to_email: admin_contact.to_string(),
            subject: "A new member has joined the blog".to_string(),
            body: format!("{} has created an account", member.full_name()),
        }
    }
}

/// Outbound delivery capability.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: Email) -> Result<()>;
}

/// Writes messages to the log instead of delivering them.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, email: Email) -> Result<()> {
        tracing::info!(
            from = %email.from,
            to = %email.to_email,
            subject = %email.subject,
            "📧 Notification queued"
        );
        Ok(())
    }
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Email>>,
}

impl MemoryNotifier {
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send(&self, email: Email) -> Result<()> {
        self.sent.lock().push(email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::role::Role;
    use chrono::Utc;

    fn user() -> User {
        User {
            id: 3,
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            email: "grace@example.com".into(),
            role: Role::NonPrivileged,
            email_notification: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn post_email_addresses_the_subscriber() {
        let post = Post {
            post_id: 1,
            title: "Compilers".into(),
            content: "...".into(),
            user_id: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            restricted: false,
        };
        let email = Email::new_post("noreply@blog", &user(), &post);
        assert_eq!(email.to_email, "grace@example.com");
        assert_eq!(email.to_name, "Grace Hopper");
        assert!(email.body.contains("Compilers"));
    }

    #[tokio::test]
    async fn memory_notifier_records() {
        let notifier = MemoryNotifier::default();
        notifier
            .send(Email::new_member("noreply@blog", "owner@blog", &user()))
            .await
            .unwrap();
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to_email, "owner@blog");
        assert!(sent[0].body.contains("Grace Hopper"));
    }
}
