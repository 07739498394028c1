//! 撮影 → 分析 → 結果表示 の画面遷移フロー（UI を除いた部分）。

use std::sync::Arc;

use serde_json::Value;

use super::analysis_service::{ColorAnalysisService, ImageInput};
use crate::domain::error::AnalysisError;
use crate::domain::image::{CapturedImage, ImageSource};
use crate::domain::season::Season;
use crate::domain::settings::AnalyzerSettings;
use crate::domain::types::{
    ImageOrigin, MemoryContext, PendingCapture, ReferenceColorType, SessionResult,
};
use crate::infra::image_codec::ImageCodec;
use crate::infra::notifier::{VisualizationNotifier, VisualizationPayload, VisualizationSink};
use crate::infra::session_store::SessionResultStore;

/// フローの結果。UI はこれを見て遷移先を決める。
#[derive(Debug, Clone, PartialEq)]
pub enum FlowOutcome {
    /// 分析完了（結果はセッションに保存済み）
    Completed(SessionResult),
    /// 思い出の季節を分析せずに可視化シンクへ送った
    MemoryRelayed { season_name: String },
    /// 入力が無いので撮影画面へ戻る
    RedirectToCapture,
    /// 再試行ボタン付きでメッセージを表示する
    Failed(AnalysisError),
}

/// 結果画面の表示データ
#[derive(Debug, Clone, PartialEq)]
pub struct ResultView {
    pub session: SessionResult,
    pub reference: Option<ReferenceColorType>,
}

pub struct AnalysisFlow {
    service: Arc<ColorAnalysisService>,
    store: SessionResultStore,
    sink: Option<Arc<dyn VisualizationSink>>,
    codec: ImageCodec,
}

impl AnalysisFlow {
    pub fn new(
        service: Arc<ColorAnalysisService>,
        store: SessionResultStore,
        sink: Option<Arc<dyn VisualizationSink>>,
    ) -> Self {
        Self {
            service,
            store,
            sink,
            codec: ImageCodec::new(),
        }
    }

    /// 設定から構築する（セッションはメモリ上）
    pub fn from_settings(settings: AnalyzerSettings) -> reqwest::Result<Self> {
        let sink = settings.visualization_endpoint.as_ref().map(|endpoint| {
            Arc::new(VisualizationNotifier::new(endpoint.clone(), settings.notify_timeout()))
                as Arc<dyn VisualizationSink>
        });
        let service = Arc::new(ColorAnalysisService::from_settings(settings)?);
        Ok(Self::new(service, SessionResultStore::in_memory(), sink))
    }

    pub fn service(&self) -> &Arc<ColorAnalysisService> {
        &self.service
    }

    pub fn store(&self) -> &SessionResultStore {
        &self.store
    }

    fn relay(&self, payload: VisualizationPayload) {
        if let Some(sink) = &self.sink {
            sink.notify(payload);
        }
    }

    // ─── Capture ─────────────────────────────────────────────────

    /// 撮影/アップロード画像を検証して分析待ちとして保存する
    pub async fn capture(
        &self,
        source: ImageSource,
        origin: ImageOrigin,
        outfit_description: Option<String>,
    ) -> Result<(), AnalysisError> {
        let image = self.codec.encode(source).await?;
        self.store.save_pending(&PendingCapture {
            image: Some(image),
            origin: Some(origin),
            outfit_description,
            ..Default::default()
        })?;
        Ok(())
    }

    /// 思い出の季節を選ぶ（画像は任意）
    pub fn choose_memory(
        &self,
        season_label: impl Into<String>,
        selected_image_data: Option<Value>,
        outfit_description: Option<String>,
    ) -> Result<(), AnalysisError> {
        self.store.save_pending(&PendingCapture {
            origin: Some(ImageOrigin::Memory),
            selected_season: Some(season_label.into()),
            selected_image_data,
            outfit_description,
            ..Default::default()
        })?;
        Ok(())
    }

    // ─── Analysis ────────────────────────────────────────────────

    /// 画像を分析し、結果を保存して可視化シンクへ通知する
    pub async fn submit(
        &self,
        image: impl Into<ImageInput>,
        context: Option<MemoryContext>,
    ) -> FlowOutcome {
        let image: CapturedImage = match image.into() {
            ImageInput::Captured(image) => image,
            ImageInput::Raw(source) => match self.codec.encode(source).await {
                Ok(image) => image,
                Err(e) => return FlowOutcome::Failed(e.into()),
            },
        };
        let context = context.filter(|c| !c.is_empty());
        let text = context.as_ref().and_then(|c| c.outfit_description.clone());

        let analyzed = if self.service.has_live_endpoint() {
            self.service.analyze_image(image.clone(), text).await
        } else {
            self.service.analyze_image_simulated(image.clone()).await
        };
        let result = match analyzed {
            Ok(result) => result,
            Err(e) => return FlowOutcome::Failed(e),
        };

        if let Err(e) = self.store.save(&result, &image, context.as_ref()) {
            log::error!("分析結果の保存に失敗: {e}");
            return FlowOutcome::Failed(e.into());
        }

        let paint = result
            .recommend
            .first()
            .and_then(|swatch| serde_json::to_value(swatch).ok())
            .unwrap_or(Value::Null);
        self.relay(VisualizationPayload::from_result(&result, None, paint));

        FlowOutcome::Completed(SessionResult {
            result,
            image,
            context,
        })
    }

    /// 保存済みの入力から分析画面の処理を再開する
    pub async fn resume_pending(&self) -> FlowOutcome {
        let pending = self.store.load_pending();

        if let (Some(label), None) = (&pending.selected_season, &pending.image) {
            let label = label.clone();
            self.relay(VisualizationPayload::from_label(
                &label,
                self.memory_paint(&label).await,
            ));
            self.store.clear_pending();
            log::info!("思い出の季節を送信: {label}");
            return FlowOutcome::MemoryRelayed { season_name: label };
        }

        let Some(image) = pending.image else {
            log::warn!("分析待ちの画像がありません");
            return FlowOutcome::RedirectToCapture;
        };

        let context = MemoryContext {
            selected_season: pending.selected_season,
            selected_image_data: pending.selected_image_data,
            outfit_description: pending.outfit_description,
        };
        let outcome = self.submit(image, Some(context)).await;
        if matches!(outcome, FlowOutcome::Completed(_)) {
            self.store.clear_pending();
        }
        outcome
    }

    /// 季節の代表色（参照データの先頭の推奨色）
    async fn memory_paint(&self, label: &str) -> Value {
        let Some(season) = Season::resolve(label)
            .or_else(|| label.split_whitespace().next().and_then(Season::resolve))
        else {
            return Value::Null;
        };

        match self.service.reference_color_types().await {
            Ok(snapshot) => snapshot
                .get(season)
                .and_then(|t| t.recommended_colors.first())
                .map(|hex| serde_json::json!({ "colorHex": hex }))
                .unwrap_or(Value::Null),
            Err(e) => {
                log::warn!("参照データを取得できないため色なしで送信: {e}");
                Value::Null
            }
        }
    }

    // ─── Result ──────────────────────────────────────────────────

    /// 結果画面のデータを読み込む。結果が無ければ `None`（撮影画面へ戻す）。
    pub async fn load_result_view(&self) -> Option<ResultView> {
        let session = self.store.load()?;
        let reference = match self.service.reference_color_types().await {
            Ok(snapshot) => snapshot.get(session.result.season).cloned(),
            Err(e) => {
                log::warn!("参照データなしで結果を表示: {e}");
                None
            }
        };
        Some(ResultView { session, reference })
    }

    /// 推奨色の選択を可視化シンクへ送る。該当色が無ければ false。
    pub fn select_color(&self, index: usize) -> bool {
        let Some(session) = self.store.load() else {
            return false;
        };
        let Some(swatch) = session.result.recommend.get(index) else {
            return false;
        };
        let Ok(index) = u32::try_from(index) else {
            return false;
        };

        let paint = serde_json::to_value(swatch).unwrap_or(Value::Null);
        self.relay(VisualizationPayload::from_result(
            &session.result,
            Some(index),
            paint,
        ));
        true
    }

    /// セッションの結果と分析待ちの入力を破棄する
    pub fn reset(&self) {
        self.store.clear();
        self.store.clear_pending();
    }
}
