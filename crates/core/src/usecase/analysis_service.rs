use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};

use crate::domain::error::AnalysisError;
use crate::domain::image::{CapturedImage, ClassificationRequest, ImageSource};
use crate::domain::loading::{LoadingEvent, LoadingState, Operation};
use crate::domain::settings::AnalyzerSettings;
use crate::domain::types::{ClassificationResult, ReferenceSnapshot};
use crate::infra::api::{ClassificationApi, HttpClassificationApi, SimulatedClassificationApi};
use crate::infra::cache::{CacheKey, ReferenceCache};
use crate::infra::image_codec::ImageCodec;
use crate::infra::normalizer::ResultNormalizer;
use crate::infra::retry::{RetryPolicy, RetryingApiClient};

/// 分析対象の画像（エンコード済み or 未検証の生データ）
#[derive(Debug, Clone)]
pub enum ImageInput {
    Captured(CapturedImage),
    Raw(ImageSource),
}

impl From<CapturedImage> for ImageInput {
    fn from(image: CapturedImage) -> Self {
        Self::Captured(image)
    }
}

impl From<ImageSource> for ImageInput {
    fn from(source: ImageSource) -> Self {
        Self::Raw(source)
    }
}

/// パーソナルカラー分析のサービス層。
///
/// 画像検証 → 送信（リトライ付き） → 正規化 の順に処理し、
/// 失敗はすべて `AnalysisError` に変換して返す。ロード状態と参照データの
/// キャッシュはインスタンスごとに持つ。
pub struct ColorAnalysisService {
    settings: AnalyzerSettings,
    api: Arc<dyn ClassificationApi>,
    simulator: Arc<dyn ClassificationApi>,
    codec: ImageCodec,
    normalizer: ResultNormalizer,
    loading: LoadingState,
    cache: Mutex<ReferenceCache>,
}

impl ColorAnalysisService {
    pub fn new(
        settings: AnalyzerSettings,
        api: Arc<dyn ClassificationApi>,
        simulator: Arc<dyn ClassificationApi>,
    ) -> Self {
        Self {
            settings,
            api,
            simulator,
            codec: ImageCodec::new(),
            normalizer: ResultNormalizer::new(),
            loading: LoadingState::new(),
            cache: Mutex::new(ReferenceCache::new()),
        }
    }

    /// 同じ API を実分析とシミュレーションの両方に使う
    pub fn with_api(settings: AnalyzerSettings, api: Arc<dyn ClassificationApi>) -> Self {
        Self::new(settings, api.clone(), api)
    }

    /// 設定から構築する。ベース URL が無ければシミュレーションのみ。
    pub fn from_settings(settings: AnalyzerSettings) -> reqwest::Result<Self> {
        let simulator: Arc<dyn ClassificationApi> = Arc::new(SimulatedClassificationApi::new(
            settings.simulated_failure_rate,
            settings.simulated_latency(),
        ));

        let api: Arc<dyn ClassificationApi> = match &settings.api_base_url {
            Some(base_url) => {
                log::info!("分類 API: {base_url}");
                Arc::new(HttpClassificationApi::new(
                    base_url.clone(),
                    settings.api_key.clone(),
                    settings.request_timeout(),
                )?)
            }
            None => {
                log::info!("分類 API が未設定のためシミュレーションを使用");
                simulator.clone()
            }
        };

        Ok(Self::new(settings, api, simulator))
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    /// 実エンドポイントが設定されているか
    pub fn has_live_endpoint(&self) -> bool {
        self.settings.api_base_url.is_some()
    }

    fn retry_policy(&self, operation: Operation) -> RetryPolicy {
        RetryPolicy::new(
            self.settings.max_retries_for(operation),
            self.settings.retry_base_delay(),
        )
    }

    // ─── Analysis ────────────────────────────────────────────────

    /// 画像を分析する
    pub async fn analyze_image(
        &self,
        image: impl Into<ImageInput>,
        context: Option<String>,
    ) -> Result<ClassificationResult, AnalysisError> {
        let _loading = self.loading.begin(Operation::AnalyzeImage);
        let policy = self.retry_policy(Operation::AnalyzeImage);
        self.classify_with(self.api.as_ref(), policy, image.into(), context)
            .await
    }

    /// シミュレーション分析。戻り値の契約は `analyze_image` と同じ。
    pub async fn analyze_image_simulated(
        &self,
        image: impl Into<ImageInput>,
    ) -> Result<ClassificationResult, AnalysisError> {
        let _loading = self.loading.begin(Operation::AnalyzeImage);
        self.classify_with(self.simulator.as_ref(), RetryPolicy::none(), image.into(), None)
            .await
    }

    async fn classify_with(
        &self,
        api: &dyn ClassificationApi,
        policy: RetryPolicy,
        image: ImageInput,
        context: Option<String>,
    ) -> Result<ClassificationResult, AnalysisError> {
        let image = match image {
            ImageInput::Captured(image) => image,
            ImageInput::Raw(source) => self.codec.encode(source).await.map_err(|e| {
                log::warn!("画像の検証に失敗: {e}");
                AnalysisError::from(e)
            })?,
        };

        let request = ClassificationRequest { image, context };
        let raw = RetryingApiClient::new(policy)
            .execute(Operation::AnalyzeImage.as_str(), || api.classify(&request))
            .await
            .map_err(|e| {
                log::error!("画像分析に失敗 ({}): {e}", api.name());
                AnalysisError::from(e)
            })?;

        let result = self.normalizer.normalize(&raw).map_err(|e| {
            log::error!("分析結果の正規化に失敗: {e}, payload={raw}");
            AnalysisError::from(e)
        })?;

        log::info!(
            "分析完了: season={}, confidence={}",
            result.season,
            result.confidence
        );
        Ok(result)
    }

    // ─── Reference data ──────────────────────────────────────────

    /// シーズン別参照データを取得する。新鮮なキャッシュがあればそれを返す。
    pub async fn get_reference_color_types(
        &self,
        use_cache: bool,
        cache_duration: Duration,
    ) -> Result<Arc<ReferenceSnapshot>, AnalysisError> {
        let _loading = self.loading.begin(Operation::GetColorTypes);

        // 取得中はロックを保持し、同時呼び出しでの重複取得を防ぐ
        let mut cache = self.cache.lock().await;
        if use_cache {
            if let Some(snapshot) = cache.get_fresh(cache_duration) {
                log::debug!("参照データをキャッシュから返却");
                return Ok(snapshot);
            }
        }

        let policy = self.retry_policy(Operation::GetColorTypes);
        let raw = RetryingApiClient::new(policy)
            .execute(Operation::GetColorTypes.as_str(), || self.api.fetch_color_types())
            .await
            .map_err(|e| {
                log::error!("参照データの取得に失敗: {e}");
                AnalysisError::from(e).with_message("컬러 타입 정보를 가져오는데 실패했습니다. 나중에 다시 시도해주세요.")
            })?;

        let snapshot = self.normalizer.normalize_reference(&raw).map_err(|e| {
            log::error!("参照データの正規化に失敗: {e}, payload={raw}");
            AnalysisError::from(e)
        })?;

        log::debug!("参照データを更新: {} 件", snapshot.len());
        Ok(cache.store(snapshot))
    }

    /// 設定のキャッシュ期間で参照データを取得する
    pub async fn reference_color_types(&self) -> Result<Arc<ReferenceSnapshot>, AnalysisError> {
        self.get_reference_color_types(true, self.settings.cache_duration())
            .await
    }

    /// キャッシュを削除する（`None` なら全件）
    pub async fn clear_cache(&self, key: Option<CacheKey>) {
        match key {
            Some(CacheKey::ColorTypes) | None => self.cache.lock().await.clear(),
        }
        log::info!("キャッシュを削除: {key:?}");
    }

    // ─── Loading state ───────────────────────────────────────────

    pub fn is_loading(&self, operation: Operation) -> bool {
        self.loading.is_loading(operation)
    }

    pub fn subscribe_loading(&self) -> broadcast::Receiver<LoadingEvent> {
        self.loading.subscribe()
    }
}
