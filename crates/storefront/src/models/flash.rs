//! One-shot messages shown on the next rendered page.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use super::session_keys;

/// Severity of a flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    Success,
    Info,
    Error,
}

impl FlashLevel {
    /// CSS modifier used by the toast template.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Error => "error",
        }
    }
}

/// A message queued for the next page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Success,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Info,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Error,
            message: message.into(),
        }
    }

    /// CSS modifier for templates.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        self.level.as_str()
    }

    /// Queue this message. Session failures are logged, not returned.
    pub async fn push(self, session: &Session) {
        let mut queued = session
            .get::<Vec<Self>>(session_keys::FLASH)
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        queued.push(self);
        if let Err(e) = session.insert(session_keys::FLASH, queued).await {
            tracing::warn!(error = %e, "Failed to store flash message");
        }
    }

    /// Remove and return every queued message.
    pub async fn take_all(session: &Session) -> Vec<Self> {
        session
            .remove::<Vec<Self>>(session_keys::FLASH)
            .await
            .ok()
            .flatten()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn test_flashes_are_taken_once() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        Flash::success("Added to cart").push(&session).await;
        Flash::error("Coupon expired").push(&session).await;

        let taken = Flash::take_all(&session).await;
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[1].kind(), "error");
        assert!(Flash::take_all(&session).await.is_empty());
    }
}
