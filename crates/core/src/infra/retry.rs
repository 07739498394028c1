//! 指数バックオフ付きの API 呼び出しリトライ。
//!
//! 初回 + `max_retries` 回まで試行し、i 回目の失敗後は `base_delay * 2^i` 待機する。
//! 再試行するのは `ApiError::is_retryable` が真のエラーのみ。

use std::future::Future;
use std::time::Duration;

use super::api::ApiError;

/// リトライポリシー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// 再試行しない
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// `attempt` 回目（0 始まり）の失敗後の待機時間
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(1000))
    }
}

/// リトライ実行器
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryingApiClient {
    policy: RetryPolicy,
}

impl RetryingApiClient {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// `call` を実行し、再試行可能な失敗の間はバックオフして繰り返す。
    ///
    /// 試行回数を使い切った場合は最後のエラーをそのまま返す。
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let max_attempts = self.policy.max_retries.saturating_add(1);
        let mut attempt = 0u32;

        loop {
            log::debug!("API 呼び出し: {operation} (試行 {}/{max_attempts})", attempt + 1);

            let err = match call().await {
                Ok(value) => {
                    if attempt > 0 {
                        log::info!("{operation}: {} 回目の試行で成功", attempt + 1);
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            let retryable = err.is_retryable();
            if !retryable || attempt >= self.policy.max_retries {
                log::warn!(
                    "{operation} 失敗: 試行={}/{max_attempts}, status={:?}, retryable={retryable}, error={err}",
                    attempt + 1,
                    err.status(),
                );
                return Err(err);
            }

            let delay = self.policy.delay_for(attempt);
            log::info!(
                "{operation}: {}ms 後に再試行します ({}/{}): {err}",
                delay.as_millis(),
                attempt + 1,
                self.policy.max_retries
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
