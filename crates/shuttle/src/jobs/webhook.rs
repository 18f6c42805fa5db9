use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::JobError;
use crate::worker::{JobContext, Worker};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliverWebhookArgs {
    pub url: String,
    pub payload: Value,
}

/// POSTs a readiness payload. Timeouts, 429 and 5xx answers are retried.
pub struct DeliverWebhook;

impl Worker for DeliverWebhook {
    type Args = DeliverWebhookArgs;
    const CLASS: &'static str = "DeliverWebhook";

    fn perform(&self, ctx: &JobContext<'_>, args: Self::Args) -> Result<(), JobError> {
        ctx.services().webhooks.post(&args.url, &args.payload)?;
        log::info!("Delivered webhook to {}", args.url);
        Ok(())
    }
}
