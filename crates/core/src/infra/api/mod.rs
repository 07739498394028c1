pub mod http;
pub(crate) mod palette;
pub mod simulated;

pub use http::HttpClassificationApi;
pub use simulated::SimulatedClassificationApi;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::error::AnalysisError;
use crate::domain::image::ClassificationRequest;
use crate::infra::validator::{self, Schema};

/// 分類 API のトランスポート層エラー
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// 応答なし（接続失敗など）
    #[error("No response from server: {0}")]
    NoResponse(String),
    #[error("Request timed out")]
    Timeout,
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    /// 2xx だがボディが解釈できない
    #[error("Malformed response: {0}")]
    Malformed(String),
    /// 2xx だがサーバーが失敗を報告した
    #[error("Service error: {0}")]
    Service(String),
}

impl ApiError {
    /// 応答なし・タイムアウト・5xx・429 のみ再試行する
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NoResponse(_) | Self::Timeout => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Malformed(_) | Self::Service(_) => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// パーソナルカラー分類バックエンド
#[async_trait]
pub trait ClassificationApi: Send + Sync {
    /// 画像を送信し、検証済みレスポンスボディを返す
    async fn classify(&self, request: &ClassificationRequest) -> Result<Value, ApiError>;

    /// シーズン別リファレンスデータを取得する
    async fn fetch_color_types(&self) -> Result<Value, ApiError>;

    fn name(&self) -> &str;
}

/// HTTP レスポンスを検証し、成功ボディを返す
pub fn handle_response(
    endpoint: &str,
    status: u16,
    body: &str,
    schema: &Schema,
) -> Result<Value, ApiError> {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    if !(200..300).contains(&status) {
        let message = parsed
            .as_ref()
            .and_then(|v| v.get("message").or_else(|| v.get("error")))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {status}"));
        log::error!("API エラー応答: endpoint={endpoint}, status={status}, message={message}");
        return Err(ApiError::Status { status, message });
    }

    let value = match parsed {
        Some(v) if !v.is_null() => v,
        _ => {
            log::error!("API 応答を解析できません: endpoint={endpoint}");
            return Err(ApiError::Malformed("empty or non-JSON body".to_string()));
        }
    };

    if let Some(error) = value.get("error").filter(|e| is_truthy(e)) {
        let message = error
            .as_str()
            .map(str::to_string)
            .or_else(|| error.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| error.to_string());
        log::error!("API がエラーを報告: endpoint={endpoint}, error={message}");
        return Err(ApiError::Service(message));
    }

    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("request was not successful")
            .to_string();
        log::error!("API が失敗を報告: endpoint={endpoint}, message={message}");
        return Err(ApiError::Service(message));
    }

    validator::validate(&value, schema).map_err(|e| {
        log::error!("API 応答のスキーマ検証に失敗: endpoint={endpoint}, {e}");
        ApiError::Malformed(e.to_string())
    })?;

    Ok(value)
}

/// `false` / `""` / `0` / `null` はエラー扱いしない
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl From<ApiError> for AnalysisError {
    fn from(err: ApiError) -> Self {
        let cause = err.to_string();
        match &err {
            ApiError::NoResponse(_) | ApiError::Timeout => AnalysisError::transport(
                "서버 응답이 없습니다. 네트워크 연결을 확인하거나 나중에 다시 시도해주세요.",
                cause,
            ),
            ApiError::Status { status, .. } => match *status {
                413 => AnalysisError::validation(
                    "이미지 크기가 너무 큽니다. 더 작은 이미지를 사용해주세요.",
                    cause,
                ),
                400 | 415 | 422 => AnalysisError::validation(
                    "이미지 분석에 실패했습니다. 다른 이미지로 다시 시도해주세요.",
                    cause,
                ),
                429 => AnalysisError::server(
                    "요청이 너무 많습니다. 잠시 후 다시 시도해주세요.",
                    Some(*status),
                    cause,
                ),
                s if s >= 500 => AnalysisError::server(
                    "서버 오류가 발생했습니다. 잠시 후 다시 시도해주세요.",
                    Some(s),
                    cause,
                ),
                s => AnalysisError::server("요청을 처리할 수 없습니다. 다시 시도해주세요.", Some(s), cause)
                    .non_recoverable(),
            },
            ApiError::Malformed(_) => {
                AnalysisError::schema("서버 응답 형식이 올바르지 않습니다.", cause)
            }
            ApiError::Service(message) => AnalysisError::server(message.clone(), None, cause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::ErrorCategory;
    use crate::infra::validator::ANALYZE_RESPONSE;

    #[test]
    fn retryable_classification() {
        assert!(ApiError::Timeout.is_retryable());
        assert!(ApiError::NoResponse("refused".into()).is_retryable());
        assert!(ApiError::Status { status: 503, message: String::new() }.is_retryable());
        assert!(ApiError::Status { status: 429, message: String::new() }.is_retryable());
        assert!(!ApiError::Status { status: 400, message: String::new() }.is_retryable());
        assert!(!ApiError::Status { status: 404, message: String::new() }.is_retryable());
        assert!(!ApiError::Malformed("x".into()).is_retryable());
        assert!(!ApiError::Service("x".into()).is_retryable());
    }

    #[test]
    fn non_2xx_uses_body_message() {
        let err = handle_response("/analyze", 503, r#"{"message":"down"}"#, &ANALYZE_RESPONSE)
            .unwrap_err();
        assert_eq!(err, ApiError::Status { status: 503, message: "down".into() });

        let err = handle_response("/analyze", 502, "<html>", &ANALYZE_RESPONSE).unwrap_err();
        assert_eq!(err.status(), Some(502));
    }

    #[test]
    fn error_field_is_service_error() {
        let err = handle_response(
            "/analyze",
            200,
            r#"{"success":true,"data":{},"error":"no face detected"}"#,
            &ANALYZE_RESPONSE,
        )
        .unwrap_err();
        assert_eq!(err, ApiError::Service("no face detected".into()));
    }

    #[test]
    fn falsy_error_field_is_not_a_failure() {
        for error in ["false", r#""""#, "0", "null"] {
            let body = format!(
                r#"{{"success":true,"data":{{"season":"겨울 쿨톤"}},"error":{error}}}"#
            );
            let value = handle_response("/analyze", 200, &body, &ANALYZE_RESPONSE).unwrap();
            assert_eq!(value["data"]["season"], "겨울 쿨톤");
        }
    }

    #[test]
    fn truthy_error_field_variants_are_service_errors() {
        let err = handle_response("/analyze", 200, r#"{"error":true}"#, &ANALYZE_RESPONSE)
            .unwrap_err();
        assert_eq!(err, ApiError::Service("true".into()));

        let err = handle_response(
            "/analyze",
            200,
            r#"{"error":{"message":"얼굴을 찾을 수 없습니다"}}"#,
            &ANALYZE_RESPONSE,
        )
        .unwrap_err();
        assert_eq!(err, ApiError::Service("얼굴을 찾을 수 없습니다".into()));
    }

    #[test]
    fn success_false_is_service_error() {
        let err = handle_response(
            "/analyze",
            200,
            r#"{"success":false,"message":"quota"}"#,
            &ANALYZE_RESPONSE,
        )
        .unwrap_err();
        assert_eq!(err, ApiError::Service("quota".into()));
    }

    #[test]
    fn empty_or_invalid_body_is_malformed() {
        assert!(matches!(
            handle_response("/analyze", 200, "", &ANALYZE_RESPONSE),
            Err(ApiError::Malformed(_))
        ));
        assert!(matches!(
            handle_response("/analyze", 200, "null", &ANALYZE_RESPONSE),
            Err(ApiError::Malformed(_))
        ));
    }

    #[test]
    fn schema_violation_is_malformed() {
        let err = handle_response("/analyze", 200, r#"{"success":true,"data":"x"}"#, &ANALYZE_RESPONSE)
            .unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));
    }

    #[test]
    fn valid_body_passes() {
        let value = handle_response(
            "/analyze",
            200,
            r#"{"success":true,"data":{"season":"봄 웜톤"}}"#,
            &ANALYZE_RESPONSE,
        )
        .unwrap();
        assert_eq!(value["data"]["season"], "봄 웜톤");
    }

    #[test]
    fn maps_to_analysis_categories() {
        let cases = [
            (ApiError::Timeout, ErrorCategory::Transport, true),
            (ApiError::Status { status: 500, message: String::new() }, ErrorCategory::Server, true),
            (ApiError::Status { status: 413, message: String::new() }, ErrorCategory::Validation, false),
            (ApiError::Status { status: 403, message: String::new() }, ErrorCategory::Server, false),
            (ApiError::Malformed("x".into()), ErrorCategory::Schema, true),
        ];
        for (api, category, recoverable) in cases {
            let err: AnalysisError = api.into();
            assert_eq!(err.category, category);
            assert_eq!(err.recoverable, recoverable);
        }

        let err: AnalysisError = ApiError::Status { status: 413, message: String::new() }.into();
        assert_eq!(err.message, "이미지 크기가 너무 큽니다. 더 작은 이미지를 사용해주세요.");

        let err: AnalysisError = ApiError::Timeout.into();
        assert!(err.message.starts_with("서버 응답이 없습니다"));

        let err: AnalysisError = ApiError::Service("얼굴을 찾을 수 없습니다".into()).into();
        assert_eq!(err.message, "얼굴을 찾을 수 없습니다");
    }
}
