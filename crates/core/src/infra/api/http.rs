use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde_json::Value;

use super::{handle_response, ApiError, ClassificationApi};
use crate::domain::image::ClassificationRequest;
use crate::infra::validator::{Schema, ANALYZE_RESPONSE, COLOR_TYPES_RESPONSE};

/// 分類バックエンドへの HTTP クライアント
pub struct HttpClassificationApi {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpClassificationApi {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header("x-request-id", uuid::Uuid::new_v4().to_string());
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send(
        &self,
        endpoint: &str,
        builder: reqwest::RequestBuilder,
        schema: &Schema,
    ) -> Result<Value, ApiError> {
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|e| transport_error(endpoint, e))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(endpoint, e))?;

        handle_response(endpoint, status, &body, schema)
    }
}

fn transport_error(endpoint: &str, err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        log::error!("API タイムアウト: endpoint={endpoint}");
        ApiError::Timeout
    } else {
        log::error!("API 応答なし: endpoint={endpoint}, error={err}");
        ApiError::NoResponse(err.to_string())
    }
}

#[async_trait]
impl ClassificationApi for HttpClassificationApi {
    async fn classify(&self, request: &ClassificationRequest) -> Result<Value, ApiError> {
        let image = &request.image;
        let part = multipart::Part::bytes(image.data().to_vec())
            .file_name(format!("image.{}", image.mime().extension()))
            .mime_str(image.mime().as_str())
            .map_err(|e| ApiError::NoResponse(format!("invalid multipart: {e}")))?;

        let mut form = multipart::Form::new().part("image", part);
        if let Some(context) = &request.context {
            form = form.text("context", context.clone());
        }

        let url = format!("{}/analyze", self.base_url);
        log::info!("画像分析リクエスト送信: size={} bytes", image.size());
        self.send("/analyze", self.client.post(url).multipart(form), &ANALYZE_RESPONSE)
            .await
    }

    async fn fetch_color_types(&self) -> Result<Value, ApiError> {
        let url = format!("{}/colorTypes", self.base_url);
        self.send("/colorTypes", self.client.get(url), &COLOR_TYPES_RESPONSE)
            .await
    }

    fn name(&self) -> &str {
        "http"
    }
}
