//! Feedback command

use super::Connections;
use anyhow::{Context, Result};
use vigil_core::AuthContext;
use vigil_runtime::{CallContext, FeedbackOutcome, FeedbackProcessor, FeedbackRequest, Stores};

pub async fn execute(
    conns: &Connections,
    auth: &AuthContext,
    request: FeedbackRequest,
    ctx: &CallContext,
) -> Result<()> {
    let warehouse = conns.warehouse()?;
    let stores = Stores {
        suites: &conns.storage,
        history: &conns.storage,
        warehouse: warehouse.as_ref(),
    };

    let outcome = FeedbackProcessor::new()
        .process(auth, &request, stores, ctx)
        .await
        .with_context(|| format!("recording feedback for alert {}", request.alert_id))?;

    match outcome {
        FeedbackOutcome::Recorded => println!("Feedback recorded"),
        FeedbackOutcome::ThresholdAdjusted { side, value } => {
            println!("Feedback recorded; {} threshold set to {}", side, value)
        }
        FeedbackOutcome::ThresholdUpdateFailed => {
            println!("Feedback recorded; threshold update failed (see logs)")
        }
    }
    Ok(())
}
