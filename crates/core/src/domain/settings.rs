use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::loading::Operation;

/// 実行環境（ログの既定レベルとリモートログ送信に影響）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// アナライザー設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerSettings {
    /// 分類 API のベース URL（未設定ならシミュレーション分析を使う）
    pub api_base_url: Option<String>,
    /// Bearer トークン
    pub api_key: Option<String>,
    /// HTTP タイムアウト（ミリ秒）
    pub request_timeout_ms: u64,
    /// 画像分析の最大リトライ回数
    pub analyze_max_retries: u32,
    /// 参照データ取得の最大リトライ回数
    pub reference_max_retries: u32,
    /// バックオフの基準遅延（ミリ秒）
    pub retry_base_delay_ms: u64,
    /// 参照データのキャッシュ有効期間（ミリ秒）
    pub cache_duration_ms: u64,
    /// シミュレーション分析の失敗確率 (0.0–1.0)
    pub simulated_failure_rate: f64,
    /// シミュレーション分析の擬似レイテンシ（ミリ秒）
    pub simulated_latency_ms: u64,
    /// 可視化エンジンの受信エンドポイント（None で通知しない）
    pub visualization_endpoint: Option<String>,
    pub notify_timeout_ms: u64,
    pub environment: Environment,
    /// ログレベル（"debug", "info", "warn", "error", "none"）
    pub log_level: Option<String>,
    pub remote_log_endpoint: Option<String>,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            api_base_url: None,
            api_key: None,
            request_timeout_ms: 15_000,
            analyze_max_retries: 2,
            reference_max_retries: 2,
            retry_base_delay_ms: 1_000,
            cache_duration_ms: 3_600_000,
            simulated_failure_rate: 0.05,
            simulated_latency_ms: 2_000,
            visualization_endpoint: Some("http://localhost:9980/osc".to_string()),
            notify_timeout_ms: 3_000,
            environment: Environment::Development,
            log_level: None,
            remote_log_endpoint: None,
        }
    }
}

impl AnalyzerSettings {
    /// 環境変数から読み込む
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// キー → 値の参照関数から読み込む。空文字列は未設定として扱う。
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut settings = Self::default();

        settings.api_base_url = get("PC_API_BASE_URL");
        settings.api_key = get("PC_API_KEY");

        if let Some(endpoint) = get("PC_VIZ_ENDPOINT") {
            settings.visualization_endpoint = match endpoint.as_str() {
                "off" | "none" => None,
                _ => Some(endpoint),
            };
        }

        if let Some(env) = get("PC_ENV") {
            settings.environment = match env.to_ascii_lowercase().as_str() {
                "production" | "prod" => Environment::Production,
                _ => Environment::Development,
            };
        }

        settings.log_level = get("PC_LOG_LEVEL");
        settings.remote_log_endpoint = get("PC_REMOTE_LOG_ENDPOINT").or_else(|| {
            (settings.environment == Environment::Production).then(|| "/api/logs".to_string())
        });

        settings
    }

    pub fn max_retries_for(&self, operation: Operation) -> u32 {
        match operation {
            Operation::AnalyzeImage => self.analyze_max_retries,
            Operation::GetColorTypes => self.reference_max_retries,
        }
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn cache_duration(&self) -> Duration {
        Duration::from_millis(self.cache_duration_ms)
    }

    pub fn simulated_latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_ms)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_service_contract() {
        let s = AnalyzerSettings::default();
        assert_eq!(s.request_timeout(), Duration::from_secs(15));
        assert_eq!(s.retry_base_delay(), Duration::from_millis(1000));
        assert_eq!(s.cache_duration(), Duration::from_secs(3600));
        assert_eq!(s.max_retries_for(Operation::AnalyzeImage), 2);
        assert!(s.api_base_url.is_none());
    }

    #[test]
    fn reads_endpoint_and_key() {
        let s = AnalyzerSettings::from_lookup(lookup(&[
            ("PC_API_BASE_URL", "https://pc.example.com/api"),
            ("PC_API_KEY", "secret"),
        ]));
        assert_eq!(s.api_base_url.as_deref(), Some("https://pc.example.com/api"));
        assert_eq!(s.api_key.as_deref(), Some("secret"));
        assert_eq!(s.environment, Environment::Development);
        assert!(s.remote_log_endpoint.is_none());
    }

    #[test]
    fn blank_values_are_unset() {
        let s = AnalyzerSettings::from_lookup(lookup(&[("PC_API_BASE_URL", "   ")]));
        assert!(s.api_base_url.is_none());
    }

    #[test]
    fn production_enables_remote_logging() {
        let s = AnalyzerSettings::from_lookup(lookup(&[("PC_ENV", "production")]));
        assert_eq!(s.environment, Environment::Production);
        assert_eq!(s.remote_log_endpoint.as_deref(), Some("/api/logs"));
    }

    #[test]
    fn visualization_can_be_disabled() {
        let s = AnalyzerSettings::from_lookup(lookup(&[("PC_VIZ_ENDPOINT", "off")]));
        assert!(s.visualization_endpoint.is_none());
    }
}
