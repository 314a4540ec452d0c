use super::Validator;
use crate::domain::market::Feature;
use crate::domain::requests::TrainingRequest;
use crate::domain::scaling::{scale, scale_single};
use crate::domain::synapse::{BackwardPayload, ForwardPayload, Synapse};
use anyhow::{Context, Result};
use tracing::info;
use uuid::Uuid;

impl Validator {
    /// Sends a historical window to miners, then the closes that followed
    /// it. Nothing is scored and the ledger is untouched.
    pub(super) async fn run_training(&self, request: TrainingRequest, now_ms: i64) -> Result<()> {
        let template = &request.template;
        let symbol = template.stream_type.as_str();
        let stream_id = self.identity.stream_id(symbol);
        let request_uuid = Uuid::new_v4();

        let window = self.planner.lock().await.plan(true, now_ms);
        info!(
            "Training: {} on stream {} over [{}, {})",
            request_uuid, stream_id, window.start_ms, window.end_ms
        );

        let buffer = self.assemble_non_empty(symbol, &window.ranges).await?;
        let (envelope, scaled) = scale(&buffer);

        let targets = self.targets().await?;
        let forward = Synapse::TrainingForward(ForwardPayload {
            request_uuid,
            stream_id: stream_id.clone(),
            topic_id: template.topic_id,
            samples: scaled.columns().to_vec(),
            feature_ids: template.feature_ids.clone(),
            schema_id: template.schema_id,
            prediction_size: template.prediction_size,
        });
        let outcome = self.dispatcher.dispatch(&forward, &targets).await;
        info!(
            "Training: {} valid responses out of {} miners",
            outcome.responses.len(),
            targets.len()
        );

        let results_window = self.target_window(window.end_ms, template.prediction_size);
        let results = self
            .assemble_non_empty(symbol, &[results_window])
            .await
            .context("Failed to fetch training results")?;

        let close = envelope
            .feature(Feature::Close)
            .context("Scaling envelope has no close column")?;
        let backward = Synapse::TrainingBackward(BackwardPayload {
            request_uuid,
            stream_id,
            topic_id: template.topic_id,
            samples: scale_single(results.column(Feature::Close), close.min, close.max),
        });
        self.dispatcher.broadcast(&backward, &targets).await;

        info!("Training: {} complete", request_uuid);
        Ok(())
    }
}
