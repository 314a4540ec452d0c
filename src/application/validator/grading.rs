use super::Validator;
use crate::domain::market::Feature;
use crate::domain::requests::PredictionRequest;
use crate::domain::scaling::scale_single;
use crate::domain::scoring::ScoreCard;
use crate::domain::synapse::{BackwardPayload, Synapse};
use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

impl Validator {
    /// Grades the predictions of one elapsed live request.
    ///
    /// Records are acked only once grading has run to completion. A failed
    /// or empty ground-truth fetch leaves them queued for the next tick.
    pub(super) async fn run_grading(&self, request: PredictionRequest) -> Result<()> {
        info!(
            "Grading: {} ({} prediction(s)) for {}",
            request.request_uuid,
            request.predictions.len(),
            request.client_id
        );

        let Some(close) = request.envelope.feature(Feature::Close).copied() else {
            // unrecoverable: retrying would fail the same way forever
            warn!(
                "Grading: {} has no close scale, dropping {} record(s)",
                request.request_uuid,
                request.record_ids.len()
            );
            return self.ack(&request).await;
        };

        let truth = self
            .assemble_non_empty(&request.stream_type, &[request.target_window])
            .await
            .context("Failed to fetch ground truth")?;
        let observed = scale_single(truth.column(Feature::Close), close.min, close.max);

        let targets = self.targets().await?;
        let backward = Synapse::LiveBackward(BackwardPayload {
            request_uuid: request.request_uuid,
            stream_id: request.stream_id.clone(),
            topic_id: request.topic_id,
            samples: observed.clone(),
        });
        self.dispatcher.broadcast(&backward, &targets).await;

        let card = self.scoring.score(&request.predictions, &observed);
        if card.is_empty() {
            info!(
                "Grading: {} has no scoreable predictions",
                request.request_uuid
            );
            return self.ack(&request).await;
        }
        for scored in &card.ranked {
            debug!(
                "Grading: {} raw={:.6} scaled={:.4} weight={:.4}",
                scored.miner_id, scored.raw_score, scored.scaled_score, scored.weight
            );
        }

        self.record_scores(&request, &card).await;
        self.commit_weights(&card).await;
        self.ack(&request).await
    }

    async fn record_scores(&self, request: &PredictionRequest, card: &ScoreCard) {
        let result = self
            .ledger
            .update(|ledger| {
                for scored in &card.ranked {
                    ledger.record(
                        &request.client_id,
                        &request.stream_id,
                        request.topic_id,
                        &scored.miner_id,
                        scored.scaled_score,
                        scored.weight,
                    );
                }
            })
            .await;

        // a lost ledger write does not stop weights from being committed
        if result.is_ok() {
            info!(
                "Grading: Recorded {} score(s), {} winner(s)",
                card.ranked.len(),
                card.winners().len()
            );
        }
    }

    async fn commit_weights(&self, card: &ScoreCard) {
        let metagraph = match self.metagraph.metagraph().await {
            Ok(metagraph) => metagraph,
            Err(e) => {
                error!("Grading: Cannot resolve uids: {:#}", e);
                self.metrics.inc_weight_commit("failed");
                return;
            }
        };

        let weights: Vec<(u16, f64)> = card
            .winners()
            .into_iter()
            .filter_map(|(hotkey, weight)| match metagraph.uid_of(&hotkey) {
                Some(uid) => Some((uid, weight)),
                None => {
                    warn!("Grading: {} is no longer registered, skipping", hotkey);
                    None
                }
            })
            .collect();

        if weights.is_empty() {
            warn!("Grading: No registered winners, nothing to commit");
            self.metrics.inc_weight_commit("skipped");
            return;
        }

        match self
            .weights
            .commit(self.netuid, &self.identity.hotkey, &weights)
            .await
        {
            Ok(()) => {
                info!("Grading: Committed weights for {} miner(s)", weights.len());
                self.metrics.inc_weight_commit("ok");
            }
            Err(e) => {
                error!("Grading: Weight commitment failed: {:#}", e);
                self.metrics.inc_weight_commit("failed");
            }
        }
    }

    async fn ack(&self, request: &PredictionRequest) -> Result<()> {
        self.predictions
            .ack(&request.record_ids)
            .await
            .context("Failed to ack graded predictions")?;
        debug!(
            "Grading: Acked {} record(s) of {}",
            request.record_ids.len(),
            request.request_uuid
        );
        Ok(())
    }
}
