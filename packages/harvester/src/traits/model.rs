//! Structuring-model boundary.
//!
//! The hosted model is treated strictly as an untrusted producer: it
//! receives a schema and segmented content and returns JSON text that
//! the structuring engine always re-validates. Correctness guarantees
//! live entirely on our side of this trait.

use async_trait::async_trait;

use crate::error::ClientResult;

/// Zero-shot structuring function backed by a language model.
#[async_trait]
pub trait StructuringModel: Send + Sync {
    /// Produce JSON text conforming (best-effort) to `schema` from the
    /// segmented content.
    async fn structure(&self, schema: &serde_json::Value, content: &str) -> ClientResult<String>;

    fn name(&self) -> &str {
        "unknown"
    }
}
