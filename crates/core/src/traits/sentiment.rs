//! Optional sentiment collaborator

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SentimentError;

/// Coarse sentiment of one utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

/// Sentiment analysis result attached to journal turns
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SentimentResult {
    pub label: SentimentLabel,
    pub confidence: f32,
}

/// Opaque sentiment backend; failures never block call flow
#[async_trait]
pub trait SentimentAnalyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<SentimentResult, SentimentError>;
}
