//! プロセス全体のロガー。
//!
//! コンソール出力は `env_logger` に任せ、Warn 以上はリモートの収集エンドポイントへも転送する。

use chrono::Utc;
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::domain::settings::{AnalyzerSettings, Environment};

/// ロガー設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    pub level: LevelFilter,
    pub console: bool,
    /// Warn/Error の転送先（絶対 URL）
    pub remote_endpoint: Option<String>,
}

impl LoggerConfig {
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Development => Self {
                level: LevelFilter::Debug,
                console: true,
                remote_endpoint: None,
            },
            Environment::Production => Self {
                level: LevelFilter::Warn,
                console: true,
                remote_endpoint: None,
            },
        }
    }

    pub fn from_settings(settings: &AnalyzerSettings) -> Self {
        let mut config = Self::for_environment(settings.environment);

        if let Some(level) = settings.log_level.as_deref() {
            match parse_level(level) {
                Some(level) => config.level = level,
                None => eprintln!("不明なログレベルを無視します: {level}"),
            }
        }

        config.remote_endpoint = settings.remote_log_endpoint.as_deref().and_then(|endpoint| {
            if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
                return Some(endpoint.to_string());
            }
            // 相対パスは API のベース URL 基準
            settings
                .api_base_url
                .as_deref()
                .map(|base| format!("{}/{}", base.trim_end_matches('/'), endpoint.trim_start_matches('/')))
        });

        config
    }
}

/// ログレベル文字列を解釈する（"none" は出力なし）
pub fn parse_level(value: &str) -> Option<LevelFilter> {
    match value.trim().to_ascii_lowercase().as_str() {
        "trace" => Some(LevelFilter::Trace),
        "debug" => Some(LevelFilter::Debug),
        "info" => Some(LevelFilter::Info),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "error" => Some(LevelFilter::Error),
        "none" | "off" => Some(LevelFilter::Off),
        _ => None,
    }
}

// ─── Remote sink ─────────────────────────────────────────────────

/// リモートへ送るログレコード
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteLogRecord {
    pub level: String,
    pub message: String,
    pub target: String,
    pub timestamp: String,
}

impl RemoteLogRecord {
    fn from_record(record: &Record<'_>) -> Self {
        Self {
            level: record.level().as_str().to_ascii_lowercase(),
            message: record.args().to_string(),
            target: record.target().to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// バックグラウンドで POST するリモートシンク
struct RemoteSink {
    tx: mpsc::UnboundedSender<RemoteLogRecord>,
}

impl RemoteSink {
    /// tokio ランタイム内でのみ起動できる
    fn spawn(endpoint: String) -> Option<Self> {
        let handle = tokio::runtime::Handle::try_current().ok()?;
        let (tx, mut rx) = mpsc::unbounded_channel::<RemoteLogRecord>();

        handle.spawn(async move {
            let client = reqwest::Client::new();
            while let Some(record) = rx.recv().await {
                // 送信失敗は無視（ログ送信でログを出すとループする）
                let _ = client.post(&endpoint).json(&record).send().await;
            }
        });

        Some(Self { tx })
    }

    fn send(&self, record: RemoteLogRecord) {
        let _ = self.tx.send(record);
    }
}

/// HTTP クライアント自身のログは転送しない
fn is_forwardable(record: &Record<'_>) -> bool {
    let target = record.target();
    record.level() <= Level::Warn
        && !["reqwest", "hyper", "h2", "rustls"]
            .iter()
            .any(|prefix| target.starts_with(prefix))
}

// ─── AppLogger ───────────────────────────────────────────────────

pub struct AppLogger {
    console: Option<env_logger::Logger>,
    remote: Option<RemoteSink>,
}

impl AppLogger {
    pub fn new(config: &LoggerConfig) -> Self {
        // レベル判定は log::max_level に一本化する
        let console = config.console.then(|| {
            env_logger::Builder::new()
                .filter_level(LevelFilter::Trace)
                .format_timestamp_millis()
                .build()
        });

        let remote = config.remote_endpoint.clone().and_then(|endpoint| {
            let sink = RemoteSink::spawn(endpoint);
            if sink.is_none() {
                eprintln!("非同期ランタイム外のためリモートログ送信を無効化します");
            }
            sink
        });

        Self { console, remote }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }
}

impl Log for AppLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(console) = &self.console {
            console.log(record);
        }
        if let Some(remote) = &self.remote {
            if is_forwardable(record) {
                remote.send(RemoteLogRecord::from_record(record));
            }
        }
    }

    fn flush(&self) {
        if let Some(console) = &self.console {
            console.flush();
        }
    }
}

/// グローバルロガーを設定する。2 回目以降はエラーを返す。
pub fn init(config: &LoggerConfig) -> Result<(), SetLoggerError> {
    log::set_boxed_logger(Box::new(AppLogger::new(config)))?;
    log::set_max_level(config.level);
    Ok(())
}

/// 実行中にログレベルを変更する
pub fn set_level(level: LevelFilter) {
    log::set_max_level(level);
}
