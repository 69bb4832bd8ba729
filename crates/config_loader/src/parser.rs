//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。
//! 先解析为无类型的值树，检查模板占位符，再反序列化为 `LoggerBlueprint`。

use contracts::{ContractError, LoggerBlueprint, CONFIG_PLACEHOLDER};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<LoggerBlueprint, ContractError> {
    let table: toml::Table = toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })?;

    for (section, value) in &table {
        check_toml_placeholder(section, "", value)?;
    }

    toml::Value::Table(table)
        .try_into()
        .map_err(|e| ContractError::ConfigParse {
            message: format!("TOML parse error: {e}"),
            source: Some(Box::new(e)),
        })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<LoggerBlueprint, ContractError> {
    let value: serde_json::Value =
        serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
            message: format!("JSON parse error: {e}"),
            source: Some(Box::new(e)),
        })?;

    if let serde_json::Value::Object(map) = &value {
        for (section, inner) in map {
            check_json_placeholder(section, "", inner)?;
        }
    }

    serde_json::from_value(value).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<LoggerBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// 递归查找仍为占位符的字符串值
fn check_toml_placeholder(
    section: &str,
    key: &str,
    value: &toml::Value,
) -> Result<(), ContractError> {
    match value {
        toml::Value::String(s) if s == CONFIG_PLACEHOLDER => {
            Err(ContractError::config_placeholder(section, key))
        }
        toml::Value::Table(table) => {
            for (k, v) in table {
                check_toml_placeholder(section, &join_key(key, k), v)?;
            }
            Ok(())
        }
        toml::Value::Array(items) => {
            for (idx, v) in items.iter().enumerate() {
                check_toml_placeholder(section, &join_key(key, &idx.to_string()), v)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn check_json_placeholder(
    section: &str,
    key: &str,
    value: &serde_json::Value,
) -> Result<(), ContractError> {
    match value {
        serde_json::Value::String(s) if s == CONFIG_PLACEHOLDER => {
            Err(ContractError::config_placeholder(section, key))
        }
        serde_json::Value::Object(map) => {
            for (k, v) in map {
                check_json_placeholder(section, &join_key(key, k), v)?;
            }
            Ok(())
        }
        serde_json::Value::Array(items) => {
            for (idx, v) in items.iter().enumerate() {
                check_json_placeholder(section, &join_key(key, &idx.to_string()), v)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
