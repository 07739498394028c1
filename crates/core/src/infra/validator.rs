//! ペイロード形状の簡易バリデーション（必須フィールド + 型チェック）。

use serde_json::Value;

/// JSON フィールドの期待型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 検証スキーマ
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub required: &'static [&'static str],
    /// 値が存在する場合のみ型を検査する
    pub types: &'static [(&'static str, FieldType)],
}

/// `/analyze` レスポンス。旧形式はエンベロープを持たないため必須項目なし。
pub const ANALYZE_RESPONSE: Schema = Schema {
    required: &[],
    types: &[
        ("success", FieldType::Boolean),
        ("data", FieldType::Object),
        ("message", FieldType::String),
    ],
};

/// `/colorTypes` レスポンス
pub const COLOR_TYPES_RESPONSE: Schema = Schema {
    required: &["success", "data"],
    types: &[("success", FieldType::Boolean), ("data", FieldType::Object)],
};

/// バリデーションエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("payload is empty")]
    Empty,
    #[error("required field '{0}' is missing")]
    MissingField(String),
    #[error("field '{field}' has wrong type: expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        actual: &'static str,
    },
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// スキーマに従ってペイロードを検証する
pub fn validate(data: &Value, schema: &Schema) -> Result<(), ValidationError> {
    if data.is_null() {
        return Err(ValidationError::Empty);
    }

    let field = |name: &str| data.get(name).filter(|v| !v.is_null());

    for name in schema.required {
        if field(*name).is_none() {
            return Err(ValidationError::MissingField(name.to_string()));
        }
    }

    for (name, expected) in schema.types {
        if let Some(value) = field(*name) {
            if !expected.matches(value) {
                return Err(ValidationError::TypeMismatch {
                    field: name.to_string(),
                    expected: *expected,
                    actual: kind_of(value),
                });
            }
        }
    }

    Ok(())
}
