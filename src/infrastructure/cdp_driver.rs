//! 基于 chromiumoxide 的自动化驱动
//!
//! 元素句柄是 `[data-ea-ref="N"]` 形式的选择器：查询时给命中的元素打上
//! 递增编号，之后的操作都通过这个编号重新定位元素。点击和输入走 CDP 的
//! 真实输入事件，其余读操作通过 `JsExecutor` 执行脚本。

use std::path::Path;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::element::Element;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::DriverError;
use crate::infrastructure::driver::{AutomationDriver, ElementHandle};
use crate::infrastructure::JsExecutor;

/// 给元素打编号的脚本前缀
const TAG_PRELUDE: &str = r#"
const __eaTag = (el) => {
    if (!el) return null;
    if (!el.dataset.eaRef) {
        window.__eaRefSeq = (window.__eaRefSeq || 0) + 1;
        el.dataset.eaRef = String(window.__eaRefSeq);
    }
    return el.dataset.eaRef;
};
"#;

#[derive(Deserialize)]
struct Envelope {
    stale: bool,
    #[serde(default)]
    value: JsonValue,
}

pub struct CdpDriver {
    executor: JsExecutor,
}

impl CdpDriver {
    pub fn new(executor: JsExecutor) -> Self {
        Self { executor }
    }

    fn handle_for(reference: &str) -> ElementHandle {
        ElementHandle::new(format!("[data-ea-ref=\"{}\"]", reference))
    }

    /// 在句柄对应的元素上求值表达式 `expr`（表达式中可使用 `el`）
    async fn eval_on<T: DeserializeOwned>(
        &self,
        handle: &ElementHandle,
        expr: &str,
    ) -> Result<T, DriverError> {
        let script = format!(
            r#"(() => {{
                {prelude}
                const el = document.querySelector({locator});
                if (!el) return {{ stale: true }};
                return {{ stale: false, value: ({expr}) }};
            }})()"#,
            prelude = TAG_PRELUDE,
            locator = serde_json::to_string(handle.as_str())?,
            expr = expr,
        );

        let envelope: Envelope = self.executor.eval_as(script).await?;
        if envelope.stale {
            return Err(DriverError::StaleElement(handle.to_string()));
        }
        Ok(serde_json::from_value(envelope.value)?)
    }

    async fn element(&self, handle: &ElementHandle) -> Result<Element, DriverError> {
        self.executor
            .page()
            .find_element(handle.as_str())
            .await
            .map_err(|_| DriverError::StaleElement(handle.to_string()))
    }
}

#[async_trait]
impl AutomationDriver for CdpDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        debug!("导航到: {}", url);
        self.executor
            .page()
            .goto(url)
            .await
            .map_err(|e| DriverError::NavigationFailed {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.executor.page().url().await?.unwrap_or_default())
    }

    async fn find_all(
        &self,
        scope: Option<&ElementHandle>,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        let scope_locator = match scope {
            Some(handle) => serde_json::to_string(handle.as_str())?,
            None => "null".to_string(),
        };
        let script = format!(
            r#"(() => {{
                {prelude}
                const scope = {scope};
                const root = scope === null ? document : document.querySelector(scope);
                if (!root) return [];
                return Array.from(root.querySelectorAll({selector})).map(__eaTag);
            }})()"#,
            prelude = TAG_PRELUDE,
            scope = scope_locator,
            selector = serde_json::to_string(selector)?,
        );

        let refs: Vec<String> = self.executor.eval_as(script).await?;
        Ok(refs.iter().map(|r| Self::handle_for(r)).collect())
    }

    async fn closest(
        &self,
        handle: &ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>, DriverError> {
        let expr = format!("__eaTag(el.closest({}))", serde_json::to_string(selector)?);
        let reference: Option<String> = self.eval_on(handle, &expr).await?;
        Ok(reference.as_deref().map(Self::handle_for))
    }

    async fn preceding_label(
        &self,
        handle: &ElementHandle,
    ) -> Result<Option<ElementHandle>, DriverError> {
        let expr = r#"(() => {
            let prev = el.previousElementSibling;
            while (prev) {
                if (prev.tagName === 'LABEL' || prev.tagName === 'SPAN') return __eaTag(prev);
                prev = prev.previousElementSibling;
            }
            return null;
        })()"#;
        let reference: Option<String> = self.eval_on(handle, expr).await?;
        Ok(reference.as_deref().map(Self::handle_for))
    }

    async fn click(&self, handle: &ElementHandle) -> Result<(), DriverError> {
        self.element(handle).await?.click().await?;
        Ok(())
    }

    async fn type_text(&self, handle: &ElementHandle, text: &str) -> Result<(), DriverError> {
        let element = self.element(handle).await?;
        element.click().await?;
        let _: bool = self
            .eval_on(
                handle,
                "(() => { el.value = ''; el.dispatchEvent(new Event('input', { bubbles: true })); return true; })()",
            )
            .await?;
        element.type_str(text).await?;
        Ok(())
    }

    async fn select_option(
        &self,
        handle: &ElementHandle,
        option_text: &str,
    ) -> Result<bool, DriverError> {
        let expr = format!(
            r#"(() => {{
                const target = {}.trim().toLowerCase();
                const opt = Array.from(el.options || []).find(o => o.text.trim().toLowerCase() === target);
                if (!opt) return false;
                el.value = opt.value;
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()"#,
            serde_json::to_string(option_text)?
        );
        self.eval_on(handle, &expr).await
    }

    async fn set_file_input(&self, handle: &ElementHandle, path: &Path) -> Result<(), DriverError> {
        let element = self.element(handle).await?;
        let params = SetFileInputFilesParams::builder()
            .files(vec![path.to_string_lossy().into_owned()])
            .backend_node_id(element.backend_node_id)
            .build()
            .map_err(DriverError::Cdp)?;
        self.executor.page().execute(params).await?;
        Ok(())
    }

    async fn get_attribute(
        &self,
        handle: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let expr = format!("el.getAttribute({})", serde_json::to_string(name)?);
        self.eval_on(handle, &expr).await
    }

    async fn inner_text(&self, handle: &ElementHandle) -> Result<String, DriverError> {
        self.eval_on(handle, "(el.innerText || el.textContent || '').trim()")
            .await
    }

    async fn input_value(&self, handle: &ElementHandle) -> Result<String, DriverError> {
        self.eval_on(
            handle,
            "(el.value === undefined || el.value === null) ? '' : String(el.value)",
        )
        .await
    }

    async fn is_checked(&self, handle: &ElementHandle) -> Result<bool, DriverError> {
        self.eval_on(handle, "!!el.checked").await
    }

    async fn is_visible(&self, handle: &ElementHandle) -> Result<bool, DriverError> {
        self.eval_on(
            handle,
            "!el.hidden && el.getClientRects().length > 0 && getComputedStyle(el).visibility !== 'hidden'",
        )
        .await
    }

    async fn press_escape(&self) -> Result<(), DriverError> {
        self.executor
            .eval(
                r#"(() => {
                    const target = document.activeElement || document.body;
                    target.dispatchEvent(new KeyboardEvent('keydown', { key: 'Escape', bubbles: true }));
                    return true;
                })()"#,
            )
            .await?;
        Ok(())
    }
}
