use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{AnalysisTask, QueueError, TaskQueue};

/// Extra time the client waits beyond the server-side BLMOVE timeout.
const POP_RESPONSE_GRACE: Duration = Duration::from_secs(2);

/// Redis list used as a reliable work queue (Redis 6.2 or newer).
///
/// Producers `LPUSH` onto `<key>`. A consumer atomically moves the oldest
/// task onto `<key>:processing` with `BLMOVE` and removes it from there with
/// `LREM` once the job has run. Tasks left behind by a crashed consumer are
/// moved back by [`TaskQueue::recover`].
///
/// Pushes and blocking pops use separate connections so a consumer parked
/// in `BLMOVE` never delays a producer multiplexed on the same socket.
pub struct RedisQueue {
    client: ::redis::Client,
    key: String,
    processing_key: String,
    label: String,
    push_connection: Mutex<Option<::redis::aio::MultiplexedConnection>>,
    pop_connection: Mutex<Option<::redis::aio::MultiplexedConnection>>,
    /// Raw payloads of delivered tasks by job id, so `ack` removes the
    /// exact bytes the broker holds.
    in_flight: Mutex<HashMap<String, String>>,
}

impl RedisQueue {
    /// Creates the adapter. Connections are opened lazily on first use.
    pub fn new(url: &str, key: &str) -> Result<Self, QueueError> {
        let client = ::redis::Client::open(url)?;
        Ok(Self {
            client,
            key: key.to_string(),
            processing_key: processing_key(key),
            label: format!("redis {} ({})", crate::sanitize::redact_url(url), key),
            push_connection: Mutex::new(None),
            pop_connection: Mutex::new(None),
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// List holding delivered but unacknowledged tasks.
    pub fn processing_key(&self) -> &str {
        &self.processing_key
    }

    /// Runs a non-blocking command on the push connection, dropping the
    /// connection on error so the next call reconnects.
    async fn command<T: ::redis::FromRedisValue>(
        &self,
        cmd: &::redis::Cmd,
    ) -> Result<T, QueueError> {
        let mut guard = self.push_connection.lock().await;
        self.ensure_connection(&mut guard, None).await?;
        let Some(conn) = guard.as_mut() else {
            return Err(QueueError::Closed);
        };
        match cmd.query_async(conn).await {
            Ok(value) => Ok(value),
            Err(err) => {
                *guard = None;
                Err(QueueError::Broker(err))
            }
        }
    }

    async fn ensure_connection(
        &self,
        connection: &mut Option<::redis::aio::MultiplexedConnection>,
        response_timeout: Option<Duration>,
    ) -> Result<(), QueueError> {
        if connection.is_some() {
            return Ok(());
        }
        let mut config = ::redis::AsyncConnectionConfig::new();
        if response_timeout.is_some() {
            config = config.set_response_timeout(response_timeout);
        }
        *connection = Some(
            self.client
                .get_multiplexed_async_connection_with_config(&config)
                .await?,
        );
        tracing::debug!(queue = %self.label, "Connected to redis");
        Ok(())
    }
}

#[async_trait]
impl TaskQueue for RedisQueue {
    async fn enqueue(&self, task: &AnalysisTask) -> Result<(), QueueError> {
        let payload = task.to_json()?;

        // Try once with the cached connection, then reconnect and retry once.
        let mut last_err: Option<QueueError> = None;
        for attempt in 0..2 {
            let mut guard = self.push_connection.lock().await;
            self.ensure_connection(&mut guard, None).await?;
            let Some(conn) = guard.as_mut() else {
                return Err(QueueError::Closed);
            };

            let result: ::redis::RedisResult<i64> = ::redis::cmd("LPUSH")
                .arg(&self.key)
                .arg(&payload)
                .query_async(conn)
                .await;
            match result {
                Ok(depth) => {
                    log::debug!(
                        "Queued task for job {} (queue depth {})",
                        task.job_id,
                        depth
                    );
                    return Ok(());
                }
                Err(err) => {
                    tracing::warn!(
                        queue = %self.label,
                        attempt = attempt + 1,
                        error = %err,
                        "LPUSH failed; reconnecting"
                    );
                    *guard = None;
                    last_err = Some(QueueError::Broker(err));
                }
            }
        }

        Err(last_err.unwrap_or(QueueError::Closed))
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<AnalysisTask>, QueueError> {
        let block_secs = wait.as_secs().max(1);
        let response_timeout = Duration::from_secs(block_secs) + POP_RESPONSE_GRACE;

        let mut guard = self.pop_connection.lock().await;
        self.ensure_connection(&mut guard, Some(response_timeout))
            .await?;
        let Some(conn) = guard.as_mut() else {
            return Err(QueueError::Closed);
        };

        let result: ::redis::RedisResult<Option<String>> = ::redis::cmd("BLMOVE")
            .arg(&self.key)
            .arg(&self.processing_key)
            .arg("RIGHT")
            .arg("LEFT")
            .arg(block_secs)
            .query_async(conn)
            .await;

        let payload = match result {
            Ok(Some(payload)) => payload,
            Ok(None) => return Ok(None),
            Err(err) => {
                *guard = None;
                return Err(QueueError::Broker(err));
            }
        };
        drop(guard);

        match AnalysisTask::from_json(&payload) {
            Ok(task) => {
                self.in_flight
                    .lock()
                    .await
                    .insert(task.job_id.clone(), payload);
                Ok(Some(task))
            }
            Err(e) => {
                // Undecodable payloads would be redelivered forever.
                tracing::error!(queue = %self.label, error = %e, "Discarding malformed task");
                let _: i64 = self
                    .command(::redis::cmd("LREM").arg(&self.processing_key).arg(1).arg(&payload))
                    .await?;
                Err(e)
            }
        }
    }

    async fn ack(&self, task: &AnalysisTask) -> Result<(), QueueError> {
        let payload = match self.in_flight.lock().await.remove(&task.job_id) {
            Some(payload) => payload,
            None => task.to_json()?,
        };
        let removed: i64 = self
            .command(::redis::cmd("LREM").arg(&self.processing_key).arg(1).arg(&payload))
            .await?;
        if removed == 0 {
            log::debug!("Task for job {} was not in the processing list", task.job_id);
        }
        Ok(())
    }

    async fn recover(&self) -> Result<usize, QueueError> {
        // Newest first onto the consuming end, so the oldest runs first.
        let mut moved = 0;
        loop {
            let payload: Option<String> = self
                .command(
                    ::redis::cmd("LMOVE")
                        .arg(&self.processing_key)
                        .arg(&self.key)
                        .arg("LEFT")
                        .arg("RIGHT"),
                )
                .await?;
            if payload.is_none() {
                break;
            }
            moved += 1;
        }
        if moved > 0 {
            tracing::warn!(queue = %self.label, count = moved, "Requeued unacknowledged tasks");
        }
        Ok(moved)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

fn processing_key(key: &str) -> String {
    format!("{}:processing", key)
}
