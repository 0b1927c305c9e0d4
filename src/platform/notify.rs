//! Transient user notifications (toasts)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// How long a toast stays on screen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastDuration {
    /// About two seconds
    #[default]
    Short,
    /// About four seconds
    Long,
}

/// Where a toast is anchored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastPosition {
    Top,
    Center,
    #[default]
    Bottom,
}

/// A transient message for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    /// Message text
    pub text: String,
    /// Display duration
    pub duration: ToastDuration,
    /// Screen anchor
    pub position: ToastPosition,
}

/// Notification surface
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Surface name for logs
    fn name(&self) -> &'static str;

    /// Show a toast
    ///
    /// Callers treat this as fire-and-forget; errors are logged, not propagated.
    async fn show(&self, toast: &Toast) -> Result<()>;
}
