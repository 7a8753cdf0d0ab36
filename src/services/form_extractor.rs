//! 表单字段提取服务 - 业务能力层
//!
//! 只负责"这一页有哪些需要填的字段"，不负责回答和填写
//!
//! 每个候选元素单独探测，探测结果是 `Result<Option<FormField>, ExtractionError>`：
//! - `Ok(Some)`: 需要填写的字段
//! - `Ok(None)`: 不可见或已有值，不需要处理
//! - `Err`: 字段无法识别，丢弃并计数，不影响其他字段

use std::collections::HashSet;

use phf::phf_set;
use tracing::debug;

use crate::error::{DriverError, ExtractionError};
use crate::infrastructure::selectors;
use crate::infrastructure::{AutomationDriver, ElementHandle};
use crate::models::{FieldInput, FormField, RadioOption};

/// 选项列表里的占位项（小写比较）
static PLACEHOLDER_OPTIONS: phf::Set<&'static str> = phf_set! {
    "select an option",
    "select one",
    "select",
    "selecione uma opção",
    "selecione",
    "seleccione una opción",
    "choose",
    "choose an option",
    "--",
    "",
};

/// 一页的提取结果
#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub fields: Vec<FormField>,
    /// 被丢弃的字段数（无标签、无选项、探测出错）
    pub discarded: usize,
}

/// 表单字段提取器
pub struct FormExtractor<'a> {
    driver: &'a dyn AutomationDriver,
}

impl<'a> FormExtractor<'a> {
    pub fn new(driver: &'a dyn AutomationDriver) -> Self {
        Self { driver }
    }

    /// 提取 `container` 内（`None` 为整页）所有需要填写的字段
    ///
    /// 只有查找候选元素本身失败时才返回错误。
    pub async fn extract(
        &self,
        container: Option<&ElementHandle>,
    ) -> Result<ExtractionReport, DriverError> {
        let mut report = ExtractionReport::default();

        let scans: [(&str, fn() -> FieldInput); 3] = [
            (selectors::TEXT_INPUT, || FieldInput::Text),
            (selectors::TEXTAREA, || FieldInput::Textarea),
            (selectors::SELECT, || FieldInput::Select {
                options: Vec::new(),
            }),
        ];
        for (selector, make_input) in scans {
            for handle in self.driver.find_all(container, selector).await? {
                let probed = self.probe_input(&handle, make_input()).await;
                collect(&mut report, probed);
            }
        }

        for probed in self.probe_radio_groups(container).await? {
            collect(&mut report, probed);
        }

        for handle in self.driver.find_all(container, selectors::DROPDOWN).await? {
            let probed = self.probe_dropdown(&handle).await;
            collect(&mut report, probed);
        }

        for handle in self.driver.find_all(container, selectors::FILE_INPUT).await? {
            let probed = self.probe_input(&handle, FieldInput::File).await;
            collect(&mut report, probed);
        }

        debug!(
            "提取到 {} 个待填字段，丢弃 {} 个",
            report.fields.len(),
            report.discarded
        );
        Ok(report)
    }

    /// 文本框 / 多行文本 / 原生下拉框 / 文件上传
    async fn probe_input(
        &self,
        handle: &ElementHandle,
        input: FieldInput,
    ) -> Result<Option<FormField>, ExtractionError> {
        let is_file = matches!(input, FieldInput::File);

        // 文件输入框通常是隐藏的，由自定义按钮触发
        if !is_file && !self.driver.is_visible(handle).await? {
            return Ok(None);
        }

        let input = match input {
            FieldInput::Select { .. } => FieldInput::Select {
                options: self.select_options(handle).await?,
            },
            other => other,
        };

        let current_value = if is_file {
            String::new()
        } else {
            self.driver.input_value(handle).await?.trim().to_string()
        };
        if !current_value.is_empty() && !is_placeholder_option(&current_value) {
            return Ok(None);
        }

        let label = self.resolve_label(handle).await?;
        if let FieldInput::Select { options } = &input {
            if options.is_empty() {
                return Err(ExtractionError::NoOptions(label));
            }
        }

        Ok(Some(FormField {
            input,
            label,
            name: self.attr(handle, "name").await?,
            placeholder: self.attr(handle, "placeholder").await?,
            required: self.is_required(handle).await?,
            current_value,
            handle: handle.clone(),
        }))
    }

    /// 单选组：先按 fieldset / radiogroup 容器分组，剩下的按 name 聚类
    async fn probe_radio_groups(
        &self,
        container: Option<&ElementHandle>,
    ) -> Result<Vec<Result<Option<FormField>, ExtractionError>>, DriverError> {
        let mut results = Vec::new();
        let mut grouped: HashSet<ElementHandle> = HashSet::new();

        for group in self.driver.find_all(container, selectors::RADIO_GROUP).await? {
            let radios = self.driver.find_all(Some(&group), selectors::RADIO_INPUT).await?;
            if radios.is_empty() {
                continue;
            }
            grouped.extend(radios.iter().cloned());
            results.push(self.probe_radio_group(&group, &radios, true).await);
        }

        // 不在容器里的单选按钮按 name 聚类，保持出现顺序
        let mut clusters: Vec<(String, Vec<ElementHandle>)> = Vec::new();
        for radio in self.driver.find_all(container, selectors::RADIO_INPUT).await? {
            if grouped.contains(&radio) {
                continue;
            }
            let name = self
                .driver
                .get_attribute(&radio, "name")
                .await?
                .unwrap_or_default();
            match clusters.iter_mut().find(|(n, _)| !name.is_empty() && *n == name) {
                Some((_, members)) => members.push(radio),
                None => clusters.push((name, vec![radio])),
            }
        }
        for (_, radios) in clusters {
            results.push(self.probe_radio_group(&radios[0], &radios, false).await);
        }

        Ok(results)
    }

    async fn probe_radio_group(
        &self,
        anchor: &ElementHandle,
        radios: &[ElementHandle],
        is_container: bool,
    ) -> Result<Option<FormField>, ExtractionError> {
        let mut current_value = String::new();
        let mut options: Vec<RadioOption> = Vec::new();

        for radio in radios {
            let text = self.radio_option_text(radio).await?;
            if self.driver.is_checked(radio).await? {
                current_value = text.clone();
            }
            if is_placeholder_option(&text) || options.iter().any(|o| o.text == text) {
                continue;
            }
            options.push(RadioOption {
                text,
                input: radio.clone(),
            });
        }

        if !current_value.is_empty() {
            return Ok(None);
        }

        // 散落的单选按钮自身的 label 是选项文本，只能用 name 作为问题
        let label = if is_container {
            self.group_label(anchor).await?
        } else {
            None
        };
        let name = self.attr(&radios[0], "name").await?;
        let label = match label {
            Some(label) => label,
            None => humanize(&name).ok_or(ExtractionError::NoLabel)?,
        };

        if options.is_empty() {
            return Err(ExtractionError::NoOptions(label));
        }

        let mut required = false;
        for radio in radios {
            required |= self.is_required(radio).await?;
        }

        Ok(Some(FormField {
            input: FieldInput::Radio { options },
            label,
            name,
            placeholder: String::new(),
            required,
            current_value,
            handle: anchor.clone(),
        }))
    }

    /// 自定义下拉框，选项可能要展开后才出现
    async fn probe_dropdown(
        &self,
        handle: &ElementHandle,
    ) -> Result<Option<FormField>, ExtractionError> {
        if !self.driver.is_visible(handle).await? {
            return Ok(None);
        }

        // 显示值优先，其次是 aria-selected 的选项
        let mut current_value = clean_text(&self.driver.input_value(handle).await?);
        let mut options = Vec::new();
        for option in self
            .driver
            .find_all(Some(handle), selectors::DROPDOWN_OPTION)
            .await?
        {
            let text = clean_text(&self.driver.inner_text(&option).await?);
            if current_value.is_empty()
                && self
                    .driver
                    .get_attribute(&option, "aria-selected")
                    .await?
                    .is_some_and(|v| v.eq_ignore_ascii_case("true"))
            {
                current_value = text.clone();
            }
            if !is_placeholder_option(&text) && !options.contains(&text) {
                options.push(text);
            }
        }
        if !current_value.is_empty() && !is_placeholder_option(&current_value) {
            return Ok(None);
        }

        Ok(Some(FormField {
            input: FieldInput::Dropdown { options },
            label: self.resolve_label(handle).await?,
            name: self.attr(handle, "name").await?,
            placeholder: String::new(),
            required: self.is_required(handle).await?,
            current_value: String::new(),
            handle: handle.clone(),
        }))
    }

    /// 依次尝试：aria-label → label[for] → 外层 label → 前置 label → placeholder → name
    pub async fn resolve_label(&self, handle: &ElementHandle) -> Result<String, ExtractionError> {
        if let Some(label) = self.attr_text(handle, "aria-label").await? {
            return Ok(label);
        }

        if let Some(id) = self.attr_text(handle, "id").await? {
            if let Some(label) = self.driver.find_element(&selectors::label_for(&id)).await? {
                if let Some(text) = self.text_of(&label).await? {
                    return Ok(text);
                }
            }
        }

        if let Some(label) = self.driver.closest(handle, selectors::LABEL).await? {
            if let Some(text) = self.text_of(&label).await? {
                return Ok(text);
            }
        }

        if let Some(label) = self.driver.preceding_label(handle).await? {
            if let Some(text) = self.text_of(&label).await? {
                return Ok(text);
            }
        }

        if let Some(placeholder) = self.attr_text(handle, "placeholder").await? {
            return Ok(placeholder);
        }

        let name = self.attr(handle, "name").await?;
        humanize(&name).ok_or(ExtractionError::NoLabel)
    }

    /// 单选组自身的标签：legend → aria-label
    async fn group_label(&self, group: &ElementHandle) -> Result<Option<String>, ExtractionError> {
        if let Some(legend) = self.driver.find_in(group, selectors::LEGEND).await? {
            if let Some(text) = self.text_of(&legend).await? {
                return Ok(Some(text));
            }
        }
        Ok(self.attr_text(group, "aria-label").await?)
    }

    async fn radio_option_text(&self, radio: &ElementHandle) -> Result<String, ExtractionError> {
        if let Some(id) = self.attr_text(radio, "id").await? {
            if let Some(label) = self.driver.find_element(&selectors::label_for(&id)).await? {
                if let Some(text) = self.text_of(&label).await? {
                    return Ok(text);
                }
            }
        }
        if let Some(label) = self.driver.closest(radio, selectors::LABEL).await? {
            if let Some(text) = self.text_of(&label).await? {
                return Ok(text);
            }
        }
        if let Some(text) = self.attr_text(radio, "aria-label").await? {
            return Ok(text);
        }
        Ok(self.attr(radio, "value").await?)
    }

    async fn select_options(&self, handle: &ElementHandle) -> Result<Vec<String>, DriverError> {
        let mut options = Vec::new();
        for option in self
            .driver
            .find_all(Some(handle), selectors::SELECT_OPTION)
            .await?
        {
            let text = clean_text(&self.driver.inner_text(&option).await?);
            if !is_placeholder_option(&text) && !options.contains(&text) {
                options.push(text);
            }
        }
        Ok(options)
    }

    async fn is_required(&self, handle: &ElementHandle) -> Result<bool, DriverError> {
        if self.driver.get_attribute(handle, "required").await?.is_some() {
            return Ok(true);
        }
        Ok(self
            .driver
            .get_attribute(handle, "aria-required")
            .await?
            .is_some_and(|v| v.eq_ignore_ascii_case("true")))
    }

    async fn attr(&self, handle: &ElementHandle, name: &str) -> Result<String, DriverError> {
        Ok(self.attr_text(handle, name).await?.unwrap_or_default())
    }

    /// 去掉空白后非空的属性值
    async fn attr_text(
        &self,
        handle: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        Ok(self
            .driver
            .get_attribute(handle, name)
            .await?
            .map(|v| clean_text(&v))
            .filter(|v| !v.is_empty()))
    }

    async fn text_of(&self, handle: &ElementHandle) -> Result<Option<String>, DriverError> {
        let text = clean_text(&self.driver.inner_text(handle).await?);
        Ok((!text.is_empty()).then_some(text))
    }
}

fn collect(report: &mut ExtractionReport, probed: Result<Option<FormField>, ExtractionError>) {
    match probed {
        Ok(Some(field)) => report.fields.push(field),
        Ok(None) => {}
        Err(e) => {
            debug!("丢弃字段: {}", e);
            report.discarded += 1;
        }
    }
}

/// 合并连续空白
fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_placeholder_option(text: &str) -> bool {
    PLACEHOLDER_OPTIONS.contains(text.trim().to_lowercase().as_str())
}

/// 把字段 name 转成可读文本，例如 `years_of_experience` → `Years of experience`
fn humanize(name: &str) -> Option<String> {
    let words: Vec<&str> = name
        .split(|c: char| c == '_' || c == '-' || c == '.' || c == '[' || c == ']')
        .filter(|w| !w.is_empty())
        .collect();
    let joined = words.join(" ");
    let mut chars = joined.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn humanize_field_names() {
        assert_eq!(
            humanize("years_of_experience").as_deref(),
            Some("Years of experience")
        );
        assert_eq!(humanize("city-name").as_deref(), Some("City name"));
        assert_eq!(humanize("q[12]").as_deref(), Some("Q 12"));
        assert_eq!(humanize(""), None);
        assert_eq!(humanize("__"), None);
    }

    #[test]
    fn placeholder_options_are_recognised() {
        assert!(is_placeholder_option("Select an option"));
        assert!(is_placeholder_option("  Selecione uma opção "));
        assert!(!is_placeholder_option("Yes"));
    }

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  Do you\n  have a\tlicense? "), "Do you have a license?");
    }
}
