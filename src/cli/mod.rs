pub mod index;
pub mod search;
pub mod status;

use std::sync::Arc;

use mnemo::config::MnemoConfig;
use mnemo::embedding::{self, EmbeddingProvider};

/// Build the configured embedding provider behind an `Arc` so it can cross into
/// blocking tasks.
pub(crate) fn provider(config: &MnemoConfig) -> Arc<dyn EmbeddingProvider> {
    Arc::from(embedding::create_provider(&config.embedding))
}

/// Format bytes into a human-readable string.
pub(crate) fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
