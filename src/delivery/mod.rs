//! Delivery module: the consumer side of the handoff
//!
//! This module contains:
//! - The `DeliveryChannel` seam and its file and webhook implementations
//! - The `PendingQueue` shared with the crawler
//! - The `Verifier` that posts, confirms and commits entries
//! - The long-running announcer loop

mod channel;
mod file_channel;
mod queue;
mod verifier;
mod webhook;

pub use channel::{ChannelError, ChannelResult, DeliveryChannel, PostedRecord, Receipt};
pub use file_channel::FileChannel;
pub use queue::PendingQueue;
pub use verifier::{DeliveryOutcome, DeliveryReport, Verifier, VerifierSettings};
pub use webhook::WebhookChannel;

use crate::config::{ChannelConfig, Config, UserAgentConfig};
use crate::crawler::build_http_client;
use crate::storage::Storage;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Builds the configured delivery channel
pub fn build_channel(
    config: &ChannelConfig,
    user_agent: &UserAgentConfig,
) -> Result<Arc<dyn DeliveryChannel>> {
    let channel: Arc<dyn DeliveryChannel> = match config {
        ChannelConfig::File {
            directory,
            search_window,
        } => Arc::new(FileChannel::new(directory, *search_window)),
        ChannelConfig::Webhook {
            main_url,
            restricted_url,
            search_window,
        } => Arc::new(WebhookChannel::new(
            build_http_client(user_agent)?,
            main_url.clone(),
            restricted_url.clone(),
            *search_window,
        )),
    };
    Ok(channel)
}

/// Polls the handoff queue until `shutdown` is cancelled
///
/// A pass in progress is finished before stopping. Non-fatal errors are
/// logged and retried on the next poll; fatal ones (storage failures, a
/// suspiciously small seen set) stop the loop.
pub async fn run_announcer<S, C>(
    config: &Config,
    storage: &mut S,
    channel: C,
    shutdown: CancellationToken,
) -> Result<()>
where
    S: Storage + ?Sized,
    C: DeliveryChannel,
{
    let verifier = Verifier::new(channel, VerifierSettings::from(&config.delivery));
    let poll_interval = Duration::from_secs(config.delivery.poll_interval);

    tracing::info!(
        "Announcer started, polling every {}s",
        config.delivery.poll_interval
    );

    loop {
        match verifier.deliver_pending(storage).await {
            Ok(report) if report.drained() > 0 => {
                tracing::debug!("Handled {} entries", report.drained())
            }
            Ok(_) => tracing::debug!("No pending entries"),
            Err(e) if e.is_fatal() => {
                tracing::error!("Announcer stopping: {}", e);
                return Err(e);
            }
            Err(e) => tracing::error!("Delivery pass failed: {}", e),
        }

        if shutdown.is_cancelled() {
            break;
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }

    tracing::info!("Interrupted, announcer shutting down");
    Ok(())
}
