//! NATS message producer for loan decisions

use crate::types::decision::LoanDecision;
use anyhow::Result;
use async_nats::Client;
use tracing::debug;

/// Producer for publishing loan decisions to NATS
#[derive(Clone)]
pub struct DecisionProducer {
    client: Client,
    subject: String,
}

impl DecisionProducer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish a decision
    pub async fn publish(&self, decision: &LoanDecision) -> Result<()> {
        let payload = encode(decision)?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;

        debug!(
            decision_id = %decision.decision_id,
            client_id = ?decision.client_id,
            decision = %decision.decision,
            "Published loan decision"
        );

        Ok(())
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// Encode a decision as a message payload.
pub fn encode(decision: &LoanDecision) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(decision)
}
