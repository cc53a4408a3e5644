//! 配置解析与序列化
//!
//! TOML 为主要格式，JSON 用于工具链输出 (`validate --json` 等)。

use contracts::{ContractError, SessionBlueprint};

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式 (大小写不敏感)
    pub fn from_extension(ext: &str) -> Option<Self> {
        if ext.eq_ignore_ascii_case("toml") {
            Some(Self::Toml)
        } else if ext.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else {
            None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
        }
    }
}

/// 解析会话配置；缺省的表按默认值补齐
pub fn parse(content: &str, format: ConfigFormat) -> Result<SessionBlueprint, ContractError> {
    let parsed: Result<SessionBlueprint, BoxedError> = match format {
        ConfigFormat::Toml => toml::from_str(content).map_err(Into::into),
        ConfigFormat::Json => serde_json::from_str(content).map_err(Into::into),
    };

    parsed.map_err(|source| ContractError::ConfigParse {
        message: format!("{} parse error: {source}", format.name()),
        source: Some(source),
    })
}

/// 序列化会话配置
pub fn render(blueprint: &SessionBlueprint, format: ConfigFormat) -> Result<String, ContractError> {
    let rendered: Result<String, BoxedError> = match format {
        ConfigFormat::Toml => toml::to_string_pretty(blueprint).map_err(Into::into),
        ConfigFormat::Json => serde_json::to_string_pretty(blueprint).map_err(Into::into),
    };

    rendered.map_err(|e| ContractError::config_parse(format!("{} serialize error: {e}", format.name())))
}
