use super::Validator;
use crate::domain::prediction::PredictionRecord;
use crate::domain::requests::ClientRequest;
use crate::domain::scaling::scale;
use crate::domain::synapse::{ForwardPayload, Synapse};
use anyhow::Result;
use tracing::{debug, error, info};
use uuid::Uuid;

impl Validator {
    /// Asks miners for live predictions and queues every well-formed answer
    /// until its target window has elapsed.
    pub(super) async fn run_client(&self, request: ClientRequest, now_ms: i64) -> Result<()> {
        let template = &request.template;
        let symbol = template.stream_type.as_str();
        let client_id = request
            .client_id
            .clone()
            .unwrap_or_else(|| self.identity.hotkey.clone());
        let stream_id = self.identity.stream_id(symbol);
        let request_uuid = Uuid::new_v4();

        let window = self
            .planner
            .lock()
            .await
            .plan(self.test_only_historical, now_ms);
        if self.test_only_historical {
            debug!("Client: Using a historical window");
        }
        info!(
            "Client: {} for {} on stream {} over [{}, {})",
            request_uuid, client_id, stream_id, window.start_ms, window.end_ms
        );

        let buffer = self.assemble_non_empty(symbol, &window.ranges).await?;
        let (envelope, scaled) = scale(&buffer);

        // registration failures are logged by the service; dispatch goes ahead
        let topic_id = template.topic_id;
        let _ = self
            .ledger
            .update(|ledger| ledger.register_stream(&client_id, &stream_id, topic_id))
            .await;

        let targets = self.targets().await?;
        let forward = Synapse::LiveForward(ForwardPayload {
            request_uuid,
            stream_id: stream_id.clone(),
            topic_id,
            samples: scaled.columns().to_vec(),
            feature_ids: template.feature_ids.clone(),
            schema_id: template.schema_id,
            prediction_size: template.prediction_size,
        });
        let outcome = self.dispatcher.dispatch(&forward, &targets).await;

        let target_window = self.target_window(window.end_ms, template.prediction_size);
        let mut stored = 0usize;
        for response in outcome.responses {
            let record = PredictionRecord {
                client_id: client_id.clone(),
                stream_type: template.stream_type.clone(),
                stream_id: stream_id.clone(),
                topic_id,
                request_uuid,
                miner_id: response.hotkey,
                target_window,
                envelope: envelope.clone(),
                predictions: response.values,
            };
            match self.predictions.put(&record).await {
                Ok(id) => {
                    debug!("Client: Stored {} for {}", id, record.miner_id);
                    stored += 1;
                }
                Err(e) => error!(
                    "Client: Failed to store prediction from {}: {:#}",
                    record.miner_id, e
                ),
            }
        }

        info!(
            "Client: {} stored {} prediction(s), target window [{}, {})",
            request_uuid, stored, target_window.start_ms, target_window.end_ms
        );
        Ok(())
    }
}
