use serde::Serialize;

/// 分析失敗のカテゴリ（UI はこの値でメッセージを選ぶ）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCategory {
    /// 入力画像の不備（形式・サイズ）。リトライしない。
    #[serde(rename = "E_VALIDATION")]
    Validation,
    /// ネットワーク不通・タイムアウト
    #[serde(rename = "E_TRANSPORT")]
    Transport,
    /// 上流の 5xx / 429 / サービスエラー
    #[serde(rename = "E_SERVER")]
    Server,
    /// レスポンスが解釈できない
    #[serde(rename = "E_SCHEMA")]
    Schema,
}

/// サービス境界で返す構造化エラー（UI 表示用ペイロード兼用）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisError {
    pub category: ErrorCategory,
    /// ユーザー向けメッセージ
    pub message: String,
    /// 上流の HTTP ステータス（あれば）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// 元のエラー内容（ログ・デバッグ用）
    pub cause: String,
    /// 再試行ボタンを出すべきか
    pub recoverable: bool,
}

impl AnalysisError {
    pub fn validation(message: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            category: ErrorCategory::Validation,
            message: message.into(),
            status: None,
            cause: cause.into(),
            recoverable: false,
        }
    }

    pub fn transport(message: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            category: ErrorCategory::Transport,
            message: message.into(),
            status: None,
            cause: cause.into(),
            recoverable: true,
        }
    }

    pub fn server(message: impl Into<String>, status: Option<u16>, cause: impl Into<String>) -> Self {
        Self {
            category: ErrorCategory::Server,
            message: message.into(),
            status,
            cause: cause.into(),
            recoverable: true,
        }
    }

    pub fn schema(message: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            category: ErrorCategory::Schema,
            message: message.into(),
            status: None,
            cause: cause.into(),
            recoverable: true,
        }
    }

    /// ユーザー向けメッセージだけを差し替える
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn non_recoverable(mut self) -> Self {
        self.recoverable = false;
        self
    }
}

impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {} ({})", self.category, self.message, self.cause)
    }
}

impl std::error::Error for AnalysisError {}
