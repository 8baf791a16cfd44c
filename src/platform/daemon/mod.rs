use crate::config::{ChannelMonitorConfig, Config, resolve_channels};
use crate::error::{AuthError, Result as JanitorResult};
use crate::transport::slack::{ChatApi, RtmListener, SlackApiClient};
use anyhow::Result;
use std::sync::Arc;

mod shutdown;
mod supervisor;

pub use shutdown::ShutdownOutcome;
pub use supervisor::{StopReason, Supervisor, SupervisorSettings, WorkerExit, WorkerReport};

/// Connect to Slack, start retention for every configured channel and run
/// until interrupted or a worker reports it cannot continue.
pub async fn run(config: Arc<Config>) -> Result<()> {
    let (client, channels) = connect(&config).await?;
    if channels.is_empty() {
        tracing::warn!("No channels to manage; exiting");
        return Ok(());
    }

    let feed = Box::new(RtmListener::new(Arc::clone(&client), config.ping_interval()));
    let api: Arc<dyn ChatApi> = client;
    let mut supervisor = Supervisor::new(api, feed, SupervisorSettings::from_config(&config));

    for channel in &channels {
        tracing::info!(
            channel = %channel.channel_name,
            channel_id = %channel.channel_id,
            retention = channel.retention_size,
            monitor_size = channel.monitor_size,
            "Managing channel"
        );
        supervisor.monitor_channel(channel).await?;
    }

    let reason = supervisor
        .run_until_stopped(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::error!(%error, "Unable to listen for Ctrl-C");
            }
        })
        .await;
    tracing::info!(?reason, "Shutting down");

    match supervisor.shutdown().await {
        ShutdownOutcome::Completed => {}
        ShutdownOutcome::TimedOut { remaining } => {
            tracing::warn!(remaining, "Exited before every worker stopped");
        }
    }

    if let StopReason::CannotContinue { worker, reason } = reason {
        anyhow::bail!("{worker} cannot continue: {reason}");
    }
    Ok(())
}

/// Startup checks: credentials, identity, the configured user and the
/// channel directory. Any failure here is fatal.
async fn connect(
    config: &Config,
) -> JanitorResult<(Arc<SlackApiClient>, Vec<ChannelMonitorConfig>)> {
    let token = crate::auth::load_slack_token(config)?;
    let client = Arc::new(SlackApiClient::new(&config.slack_api_base, token));

    let identity = client.auth_test().await?;
    tracing::info!(
        user_id = %identity.user_id,
        team = identity.team.as_deref().unwrap_or("-"),
        "Authenticated with Slack"
    );

    let user_id = client
        .find_user_id(&config.username)
        .await?
        .ok_or_else(|| AuthError::UnknownUser {
            username: config.username.clone(),
        })?;
    tracing::info!(username = %config.username, %user_id, "Resolved Slack user");

    let directory = client.list_channels().await?;
    let channels = resolve_channels(&config.channels, &directory);
    Ok((client, channels))
}
