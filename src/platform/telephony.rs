//! Telephony capability

use async_trait::async_trait;

use crate::Result;

/// Places outgoing phone calls
#[async_trait]
pub trait Telephony: Send + Sync {
    /// Telephony backend name for logs
    fn name(&self) -> &'static str;

    /// Dial `number`
    ///
    /// When `confirm_prompt` is set the platform asks the user before dialing.
    async fn place_call(&self, number: &str, confirm_prompt: bool) -> Result<()>;
}
