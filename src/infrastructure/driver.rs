//! 浏览器自动化驱动接口
//!
//! 流程层只依赖这个 trait，不直接接触 chromiumoxide。
//! 找不到元素是正常结果（`None` / 空列表），`Err` 只表示驱动故障。

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::DriverError;

/// 元素句柄
///
/// 对驱动而言是不透明的定位串，页面切换后可能失效。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 轮询等待元素出现的间隔
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[async_trait]
pub trait AutomationDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    async fn current_url(&self) -> Result<String, DriverError>;

    /// 在 `scope` 内（`None` 为整页）查找所有匹配元素，按文档顺序返回
    async fn find_all(
        &self,
        scope: Option<&ElementHandle>,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, DriverError>;

    /// 最近的匹配祖先（包括自身）
    async fn closest(
        &self,
        handle: &ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>, DriverError>;

    /// 最近的前置兄弟 label / span
    async fn preceding_label(
        &self,
        handle: &ElementHandle,
    ) -> Result<Option<ElementHandle>, DriverError>;

    async fn click(&self, handle: &ElementHandle) -> Result<(), DriverError>;

    /// 清空后输入文本
    async fn type_text(&self, handle: &ElementHandle, text: &str) -> Result<(), DriverError>;

    /// 按显示文本选择 `<select>` 的选项，找不到选项时返回 `false`
    async fn select_option(
        &self,
        handle: &ElementHandle,
        option_text: &str,
    ) -> Result<bool, DriverError>;

    /// 直接给文件输入框绑定文件，不弹出系统对话框
    async fn set_file_input(&self, handle: &ElementHandle, path: &Path) -> Result<(), DriverError>;

    async fn get_attribute(
        &self,
        handle: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError>;

    async fn inner_text(&self, handle: &ElementHandle) -> Result<String, DriverError>;

    async fn input_value(&self, handle: &ElementHandle) -> Result<String, DriverError>;

    async fn is_checked(&self, handle: &ElementHandle) -> Result<bool, DriverError>;

    async fn is_visible(&self, handle: &ElementHandle) -> Result<bool, DriverError>;

    /// 关闭当前展开的浮层（下拉框等）
    async fn press_escape(&self) -> Result<(), DriverError>;

    async fn find_element(&self, selector: &str) -> Result<Option<ElementHandle>, DriverError> {
        Ok(self.find_all(None, selector).await?.into_iter().next())
    }

    async fn find_in(
        &self,
        scope: &ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>, DriverError> {
        Ok(self.find_all(Some(scope), selector).await?.into_iter().next())
    }

    /// 在限定时间内等待元素出现，超时返回 `None`
    async fn wait_for_element(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<Option<ElementHandle>, DriverError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(handle) = self.find_element(selector).await? {
                return Ok(Some(handle));
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }
}
