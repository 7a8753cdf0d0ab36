//! 表单字段
//!
//! 每次解析表单页时重新创建，填写完成或申请结束后丢弃。

use std::fmt;

use crate::infrastructure::ElementHandle;

/// 字段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,
    Textarea,
    Select,
    Radio,
    Dropdown,
    File,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Text => "text",
            FieldKind::Textarea => "textarea",
            FieldKind::Select => "select",
            FieldKind::Radio => "radio",
            FieldKind::Dropdown => "dropdown",
            FieldKind::File => "file",
        };
        f.write_str(name)
    }
}

/// 单选按钮的一个选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioOption {
    pub text: String,
    pub input: ElementHandle,
}

/// 字段的类型及其附带数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldInput {
    Text,
    Textarea,
    Select { options: Vec<String> },
    Radio { options: Vec<RadioOption> },
    /// 自定义下拉框，选项可能要展开后才可见
    Dropdown { options: Vec<String> },
    File,
}

/// 表单页上检测到的一个可填写字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub input: FieldInput,
    pub label: String,
    pub name: String,
    pub placeholder: String,
    pub required: bool,
    pub current_value: String,
    /// 字段本身（单选组为容器）的元素句柄
    pub handle: ElementHandle,
}

impl FormField {
    pub fn kind(&self) -> FieldKind {
        match self.input {
            FieldInput::Text => FieldKind::Text,
            FieldInput::Textarea => FieldKind::Textarea,
            FieldInput::Select { .. } => FieldKind::Select,
            FieldInput::Radio { .. } => FieldKind::Radio,
            FieldInput::Dropdown { .. } => FieldKind::Dropdown,
            FieldInput::File => FieldKind::File,
        }
    }

    /// 可选项文本（非选项类字段为空）
    pub fn options(&self) -> Vec<String> {
        match &self.input {
            FieldInput::Select { options } | FieldInput::Dropdown { options } => options.clone(),
            FieldInput::Radio { options } => options.iter().map(|o| o.text.clone()).collect(),
            FieldInput::Text | FieldInput::Textarea | FieldInput::File => Vec::new(),
        }
    }
}
