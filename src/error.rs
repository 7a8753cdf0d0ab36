use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器自动化错误
    #[error("浏览器错误: {0}")]
    Driver(#[from] DriverError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 存储错误
    #[error("存储错误: {0}")]
    Storage(#[from] StorageError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 浏览器自动化错误
///
/// 元素不存在不是错误（返回 `None`），这里只表示驱动本身的故障。
#[derive(Debug, Error)]
pub enum DriverError {
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {message}")]
    ConnectionFailed { port: u16, message: String },
    /// 导航失败
    #[error("导航到 {url} 失败: {message}")]
    NavigationFailed { url: String, message: String },
    /// CDP 协议调用失败
    #[error("CDP 调用失败: {0}")]
    Cdp(String),
    /// 执行脚本失败
    #[error("执行脚本失败: {0}")]
    Script(String),
    /// 元素句柄已失效（页面已切换）
    #[error("元素已失效: {0}")]
    StaleElement(String),
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("API调用失败 (模型: {model}): {message}")]
    ApiCallFailed { model: String, message: String },
    /// 请求构建失败
    #[error("请求构建失败: {0}")]
    RequestBuild(String),
    /// 返回内容为空
    #[error("LLM 返回内容为空 (模型: {model})")]
    EmptyResponse { model: String },
}

/// 存储错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite 操作失败
    #[error("SQLite 操作失败: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// JSON 序列化失败
    #[error("JSON 序列化失败: {0}")]
    Json(#[from] serde_json::Error),
    /// 文件系统错误
    #[error("文件操作失败: {0}")]
    Io(#[from] std::io::Error),
    /// 数据库中的数据无法解析
    #[error("记录 {job_id} 数据损坏: {message}")]
    CorruptRecord { job_id: String, message: String },
    /// 连接锁被污染
    #[error("数据库连接不可用")]
    ConnectionPoisoned,
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置值不合法
    #[error("配置项 {field} 不合法: {message}")]
    Invalid { field: String, message: String },
}

/// 单个表单字段的提取错误
///
/// 只影响当前字段，不会中断整页提取。
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// 找不到任何可用的标签
    #[error("字段没有可识别的标签")]
    NoLabel,
    /// 单选组没有可区分的选项
    #[error("单选组 '{0}' 没有可用选项")]
    NoOptions(String),
    /// 探测元素时驱动出错
    #[error("探测字段失败: {0}")]
    Driver(#[from] DriverError),
}

// ========== 便捷构造函数 ==========

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<chromiumoxide::error::CdpError> for DriverError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        DriverError::Cdp(err.to_string())
    }
}

impl From<serde_json::Error> for DriverError {
    fn from(err: serde_json::Error) -> Self {
        DriverError::Script(format!("脚本返回值无法解析: {}", err))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_error_wraps_into_app_error() {
        let err: AppError = DriverError::StaleElement("p0:n3".into()).into();
        assert!(matches!(err, AppError::Driver(DriverError::StaleElement(_))));
        assert!(err.to_string().contains("p0:n3"));
    }

    #[test]
    fn config_error_message_names_the_variable() {
        let err = ConfigError::EnvVarParseFailed {
            var_name: "DAILY_LIMIT".into(),
            value: "abc".into(),
            expected_type: "u32".into(),
        };
        assert!(err.to_string().contains("DAILY_LIMIT"));
        assert!(err.to_string().contains("abc"));
    }
}
