//! Shared-store connection and wall-clock helpers used by the distributed
//! rate limiter and the remote cache.

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use redis::aio::MultiplexedConnection;
use tracing::debug;

use crate::config::RedisConfig;
use crate::{PostPilotError, Result};

/// Open a multiplexed connection and confirm it with `PING`.
///
/// Both steps are bounded by `probe_timeout` so an unreachable host cannot
/// stall startup.
pub(crate) async fn connect(config: &RedisConfig) -> Result<MultiplexedConnection> {
    let client = redis::Client::open(config.url.as_str())?;
    let probe = async {
        let mut conn = client.get_multiplexed_tokio_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        debug!(url = %config.url, %pong, "redis probe succeeded");
        Ok::<_, PostPilotError>(conn)
    };
    tokio::time::timeout(config.probe_timeout(), probe)
        .await
        .map_err(|_| {
            PostPilotError::Unavailable(format!(
                "redis at {} did not answer within {:?}",
                config.url,
                config.probe_timeout()
            ))
        })?
}

/// Run one store operation, failing with [`PostPilotError::Unavailable`]
/// if it does not complete within `limit`.
pub(crate) async fn bounded<T>(limit: Duration, op: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, op).await.map_err(|_| {
        PostPilotError::Unavailable(format!("redis did not answer within {limit:?}"))
    })?
}

/// Seconds since the Unix epoch, with sub-second precision.
pub(crate) fn epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
