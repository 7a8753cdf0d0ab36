//! 字段填写服务 - 业务能力层
//!
//! 只负责把已经确定的值写进页面，不关心值从哪里来

use std::fmt;
use std::ops::AddAssign;
use std::time::Duration;

use tracing::debug;

use crate::error::DriverError;
use crate::infrastructure::selectors;
use crate::infrastructure::{AutomationDriver, ElementHandle};
use crate::models::{FieldInput, FormField};
use crate::services::answer_resolver::ResolvedValue;
use crate::services::opsec::Pacer;

/// 下拉框展开后等待选项渲染的时间
const DROPDOWN_SETTLE: Duration = Duration::from_millis(500);

/// 填写统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillReport {
    pub filled: usize,
    pub skipped: usize,
    /// 填写失败或 LLM 调用失败的字段
    pub errored: usize,
    /// 提取阶段丢弃的字段
    pub discarded: usize,
    pub tokens_used: u32,
}

impl AddAssign for FillReport {
    fn add_assign(&mut self, other: Self) {
        self.filled += other.filled;
        self.skipped += other.skipped;
        self.errored += other.errored;
        self.discarded += other.discarded;
        self.tokens_used += other.tokens_used;
    }
}

impl fmt::Display for FillReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "填写 {} / 跳过 {} / 出错 {} / 丢弃 {}",
            self.filled, self.skipped, self.errored, self.discarded
        )
    }
}

/// 自定义下拉框展开后的一个选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropdownOption {
    pub text: String,
    pub handle: ElementHandle,
}

/// 字段填写器
pub struct FieldFiller<'a> {
    driver: &'a dyn AutomationDriver,
    pacer: Pacer,
}

impl<'a> FieldFiller<'a> {
    pub fn new(driver: &'a dyn AutomationDriver, pacer: Pacer) -> Self {
        Self { driver, pacer }
    }

    /// 展开自定义下拉框并读取浮层中的选项
    ///
    /// 没有读到选项时会按 Escape 收起。
    pub async fn expand_dropdown(
        &self,
        field: &FormField,
    ) -> Result<Vec<DropdownOption>, DriverError> {
        self.driver.click(&field.handle).await?;
        tokio::time::sleep(DROPDOWN_SETTLE).await;

        let mut options = Vec::new();
        for handle in self.driver.find_all(None, selectors::LISTBOX_OPTION).await? {
            let text = self.driver.inner_text(&handle).await?.trim().to_string();
            if !text.is_empty() {
                options.push(DropdownOption { text, handle });
            }
        }

        if options.is_empty() {
            self.driver.press_escape().await?;
        }
        Ok(options)
    }

    /// 写入字段值，返回是否真正写入
    ///
    /// `dropdown` 为 `expand_dropdown` 读到的浮层选项（其他字段类型忽略）。
    pub async fn fill(
        &self,
        field: &FormField,
        value: &ResolvedValue,
        dropdown: &[DropdownOption],
    ) -> Result<bool, DriverError> {
        self.pacer.wait_before_action().await;

        match (&field.input, value) {
            (FieldInput::Text | FieldInput::Textarea, ResolvedValue::Text(text)) => {
                self.driver.type_text(&field.handle, text).await?;
                Ok(true)
            }
            (FieldInput::Select { .. }, ResolvedValue::Choice { option, .. }) => {
                self.driver.select_option(&field.handle, option).await
            }
            (FieldInput::Radio { options }, ResolvedValue::Choice { index, .. }) => {
                match options.get(*index) {
                    Some(radio) => {
                        self.driver.click(&radio.input).await?;
                        Ok(true)
                    }
                    None => Ok(false),
                }
            }
            (FieldInput::Dropdown { .. }, ResolvedValue::Choice { option, .. }) => {
                match dropdown.iter().find(|o| o.text == *option) {
                    Some(target) => {
                        self.driver.click(&target.handle).await?;
                        Ok(true)
                    }
                    None => {
                        self.driver.press_escape().await?;
                        Ok(false)
                    }
                }
            }
            (FieldInput::File, ResolvedValue::File(path)) => {
                self.driver.set_file_input(&field.handle, path).await?;
                Ok(true)
            }
            (input, value) => {
                debug!("字段类型与答案不匹配: {:?} / {:?}", input, value);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_accumulate() {
        let mut total = FillReport::default();
        total += FillReport {
            filled: 2,
            skipped: 1,
            tokens_used: 30,
            ..FillReport::default()
        };
        total += FillReport {
            filled: 1,
            errored: 1,
            discarded: 2,
            tokens_used: 12,
            ..FillReport::default()
        };
        assert_eq!(total.filled, 3);
        assert_eq!(total.errored, 1);
        assert_eq!(total.discarded, 2);
        assert_eq!(total.tokens_used, 42);
        assert_eq!(total.to_string(), "填写 3 / 跳过 1 / 出错 1 / 丢弃 2");
    }
}
