//! 配置管理
//!
//! 加载顺序（后加载的会覆盖先加载的同名配置项）：
//! 1. 内置默认值
//! 2. config/default.toml
//! 3. config/logic-engine.toml
//! 4. 环境变量（LOGIC_ENGINE_ 前缀，嵌套字段用 `__` 分隔，
//!    如 LOGIC_ENGINE_MAX_DEPTH、LOGIC_ENGINE_OBSERVABILITY__LOG_LEVEL）

use crate::evaluator::DEFAULT_MAX_DEPTH;
use crate::graph::Direction;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// 服务名，同时决定服务特定配置文件名
pub const SERVICE_NAME: &str = "logic-engine";

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

/// 引擎配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 表达式求值的递归深度上限
    pub max_depth: usize,
    /// 未指定方向时使用的传播视图
    pub default_direction: Direction,
    pub observability: ObservabilityConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            default_direction: Direction::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl EngineConfig {
    /// 从配置目录（`CONFIG_DIR`，默认 `config`）和环境变量加载
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
        Self::load_from(Path::new(&config_dir))
    }

    /// 从指定目录加载，文件缺失时使用默认值
    pub fn load_from(config_dir: &Path) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(
                File::from(config_dir.join(format!("{}.toml", SERVICE_NAME))).required(false),
            )
            .add_source(
                Environment::with_prefix("LOGIC_ENGINE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("logic-engine-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_defaults_without_files() {
        let dir = scratch_dir("empty");
        let config = EngineConfig::load_from(&dir).unwrap();
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(config.default_direction, Direction::Undirected);
        assert_eq!(config.observability.log_level, "info");
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_service_file_overrides_default_file() {
        let dir = scratch_dir("layered");
        fs::write(
            dir.join("default.toml"),
            "max_depth = 64\n[observability]\nlog_format = \"json\"\n",
        )
        .unwrap();
        fs::write(
            dir.join("logic-engine.toml"),
            "max_depth = 32\ndefault_direction = \"backward\"\n",
        )
        .unwrap();

        let config = EngineConfig::load_from(&dir).unwrap();
        assert_eq!(config.max_depth, 32);
        assert_eq!(config.default_direction, Direction::Backward);
        assert_eq!(config.observability.log_format, "json");
        assert_eq!(config.observability.log_level, "info");
        fs::remove_dir_all(dir).ok();
    }
}
