//! 可視化シンク（ローカルのインスタレーション用エンドポイント）への通知。
//!
//! 配信はベストエフォート。失敗はログに残すだけで呼び出し元には返さない。

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::domain::season::Season;
use crate::domain::types::ClassificationResult;

/// ラベルを解決できなかった場合のシーズンコード（春）
pub const FALLBACK_SEASON_CODE: u8 = 1;

/// シーズンラベルを整数コードに変換する。
///
/// 全体で解決できなければ先頭の語で再試行し、それでも駄目なら 1 を返す。
pub fn season_code(label: &str) -> u8 {
    if let Some(season) = Season::resolve(label) {
        return season.code();
    }
    if let Some(season) = label.split_whitespace().next().and_then(Season::resolve) {
        return season.code();
    }
    log::warn!("シーズンを判別できないため既定値を使用: label={label}");
    FALLBACK_SEASON_CODE
}

/// シンクへ送るペイロード
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizationPayload {
    pub season: u8,
    pub season_name: String,
    pub selected_color_index: Option<u32>,
    pub selected_paint: Value,
}

impl VisualizationPayload {
    pub fn from_result(
        result: &ClassificationResult,
        selected_color_index: Option<u32>,
        selected_paint: Value,
    ) -> Self {
        Self {
            season: result.season.code(),
            season_name: result.season.korean_label().to_string(),
            selected_color_index,
            selected_paint,
        }
    }

    /// 未分析のラベル（思い出の季節など）から生成する
    pub fn from_label(label: &str, selected_paint: Value) -> Self {
        Self {
            season: season_code(label),
            season_name: label.to_string(),
            selected_color_index: None,
            selected_paint,
        }
    }
}

/// 通知エラー
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Visualization sink unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Visualization sink rejected payload: HTTP {0}")]
    Rejected(u16),
}

/// 可視化シンク trait（テストでは記録用の実装に差し替える）
pub trait VisualizationSink: Send + Sync {
    /// ペイロードを送る。完了を待たず、失敗も返さない。
    fn notify(&self, payload: VisualizationPayload);

    fn name(&self) -> &str;
}

/// HTTP で JSON を POST する通知器
#[derive(Clone)]
pub struct VisualizationNotifier {
    client: reqwest::Client,
    endpoint: String,
}

impl VisualizationNotifier {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("通知用 HTTP クライアントの設定に失敗したため既定値を使用: {e}");
                reqwest::Client::new()
            });

        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 送信して結果を待つ
    pub async fn send(&self, payload: &VisualizationPayload) -> Result<(), NotifyError> {
        let response = self.client.post(&self.endpoint).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        log::debug!(
            "可視化シンクへ送信: season={}, index={:?}",
            payload.season,
            payload.selected_color_index
        );
        Ok(())
    }
}

impl VisualizationSink for VisualizationNotifier {
    fn notify(&self, payload: VisualizationPayload) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            log::warn!("非同期ランタイム外のため可視化通知をスキップ");
            return;
        };

        let notifier = self.clone();
        handle.spawn(async move {
            if let Err(e) = notifier.send(&payload).await {
                log::warn!("可視化シンクへの送信に失敗: endpoint={}, {e}", notifier.endpoint);
            }
        });
    }

    fn name(&self) -> &str {
        "http"
    }
}
