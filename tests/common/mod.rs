//! 集成测试共用的假驱动和假 LLM
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use easy_apply_submit::error::{DriverError, LlmError};
use easy_apply_submit::infrastructure::selectors;
use easy_apply_submit::infrastructure::{AutomationDriver, ElementHandle};
use easy_apply_submit::models::{Candidate, JobListing};
use easy_apply_submit::services::{
    AnswerOracle, AnswerResolver, OracleAnswer, Pacer, Prompt,
};
use easy_apply_submit::workflow::FlowSettings;

/// 每次 LLM 调用计的 token
pub const TOKENS_PER_CALL: u32 = 10;

// ========== 假页面 ==========

/// 点击元素的效果
#[derive(Debug, Clone)]
pub enum OnClick {
    /// 切换到另一个页面
    Goto(usize),
    /// 抛出驱动错误
    Fail,
}

#[derive(Debug, Clone)]
pub struct FakeNode {
    pub key: String,
    selectors: Vec<&'static str>,
    attrs: HashMap<String, String>,
    text: String,
    value: String,
    checked: bool,
    visible: bool,
    parent: Option<usize>,
    preceding_label: Option<usize>,
    on_click: Option<OnClick>,
}

impl FakeNode {
    /// `selector` 为 `selectors` 模块里的常量，节点只匹配登记过的选择器
    pub fn new(key: &str, selector: &'static str) -> Self {
        Self {
            key: key.to_string(),
            selectors: vec![selector],
            attrs: HashMap::new(),
            text: String::new(),
            value: String::new(),
            checked: false,
            visible: true,
            parent: None,
            preceding_label: None,
            on_click: None,
        }
    }

    pub fn also(mut self, selector: &'static str) -> Self {
        self.selectors.push(selector);
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn checked(mut self) -> Self {
        self.checked = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn inside(mut self, parent: usize) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn after_label(mut self, label: usize) -> Self {
        self.preceding_label = Some(label);
        self
    }

    pub fn on_click(mut self, effect: OnClick) -> Self {
        self.on_click = Some(effect);
        self
    }
}

#[derive(Debug, Clone)]
pub struct FakePage {
    pub url: String,
    nodes: Vec<FakeNode>,
}

impl FakePage {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            nodes: Vec::new(),
        }
    }

    /// 添加节点，返回节点下标（用于 `inside` / `after_label`）
    pub fn add(&mut self, node: FakeNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// 申请弹窗容器
    pub fn modal(&mut self) -> usize {
        self.add(FakeNode::new("modal", selectors::MODAL_CONTENT))
    }

    pub fn button(&mut self, key: &str, selector: &'static str, effect: OnClick) -> usize {
        self.add(FakeNode::new(key, selector).on_click(effect))
    }
}

struct DriverState {
    pages: Vec<FakePage>,
    current: usize,
    routes: Vec<(String, usize)>,
    calls: Vec<String>,
}

/// 按选择器常量匹配的假浏览器
///
/// 句柄格式为 `p{page}:n{node}`，页面切换后旧句柄返回 `StaleElement`。
pub struct FakeDriver {
    state: Mutex<DriverState>,
}

impl FakeDriver {
    pub fn new(pages: Vec<FakePage>) -> Self {
        Self {
            state: Mutex::new(DriverState {
                pages,
                current: 0,
                routes: Vec::new(),
                calls: Vec::new(),
            }),
        }
    }

    /// 导航到包含 `fragment` 的地址时切换到 `page`
    pub fn route(self, fragment: &str, page: usize) -> Self {
        self.lock().routes.push((fragment.to_string(), page));
        self
    }

    /// 记录下来的操作，例如 `click submit`、`type phone=+55 11`
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn clicked(&self, key: &str) -> bool {
        self.calls().contains(&format!("click {}", key))
    }

    pub fn typed(&self, key: &str) -> Option<String> {
        let prefix = format!("type {}=", key);
        self.calls()
            .iter()
            .find_map(|c| c.strip_prefix(&prefix).map(str::to_string))
    }

    pub fn current_page(&self) -> usize {
        self.lock().current
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DriverState> {
        self.state.lock().unwrap()
    }

    fn handle(page: usize, node: usize) -> ElementHandle {
        ElementHandle::new(format!("p{}:n{}", page, node))
    }

    fn parse(state: &DriverState, handle: &ElementHandle) -> Result<usize, DriverError> {
        let stale = || DriverError::StaleElement(handle.to_string());
        let (page, node) = handle
            .as_str()
            .strip_prefix('p')
            .and_then(|rest| rest.split_once(":n"))
            .ok_or_else(stale)?;
        let page: usize = page.parse().map_err(|_| stale())?;
        let node: usize = node.parse().map_err(|_| stale())?;
        if page != state.current || node >= state.pages[page].nodes.len() {
            return Err(stale());
        }
        Ok(node)
    }

    fn matches(node: &FakeNode, selector: &str) -> bool {
        if let Some(id) = selector
            .strip_prefix("label[for=\"")
            .and_then(|rest| rest.strip_suffix("\"]"))
        {
            return node.selectors.contains(&selectors::LABEL)
                && node.attrs.get("for").map(String::as_str) == Some(id);
        }
        node.selectors.iter().any(|s| *s == selector)
    }

    fn is_descendant(nodes: &[FakeNode], mut node: usize, ancestor: usize) -> bool {
        while let Some(parent) = nodes[node].parent {
            if parent == ancestor {
                return true;
            }
            node = parent;
        }
        false
    }
}

#[async_trait]
impl AutomationDriver for FakeDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let mut state = self.lock();
        state.calls.push(format!("navigate {}", url));
        if let Some(page) = state
            .routes
            .iter()
            .find(|(fragment, _)| url.contains(fragment.as_str()))
            .map(|(_, page)| *page)
        {
            state.current = page;
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        let state = self.lock();
        Ok(state.pages[state.current].url.clone())
    }

    async fn find_all(
        &self,
        scope: Option<&ElementHandle>,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        let state = self.lock();
        let scope = scope.map(|s| Self::parse(&state, s)).transpose()?;
        let nodes = &state.pages[state.current].nodes;
        Ok(nodes
            .iter()
            .enumerate()
            .filter(|(i, node)| {
                Self::matches(node, selector)
                    && scope.map_or(true, |s| Self::is_descendant(nodes, *i, s))
            })
            .map(|(i, _)| Self::handle(state.current, i))
            .collect())
    }

    async fn closest(
        &self,
        handle: &ElementHandle,
        selector: &str,
    ) -> Result<Option<ElementHandle>, DriverError> {
        let state = self.lock();
        let mut node = Some(Self::parse(&state, handle)?);
        let nodes = &state.pages[state.current].nodes;
        while let Some(i) = node {
            if Self::matches(&nodes[i], selector) {
                return Ok(Some(Self::handle(state.current, i)));
            }
            node = nodes[i].parent;
        }
        Ok(None)
    }

    async fn preceding_label(
        &self,
        handle: &ElementHandle,
    ) -> Result<Option<ElementHandle>, DriverError> {
        let state = self.lock();
        let node = Self::parse(&state, handle)?;
        Ok(state.pages[state.current].nodes[node]
            .preceding_label
            .map(|label| Self::handle(state.current, label)))
    }

    async fn click(&self, handle: &ElementHandle) -> Result<(), DriverError> {
        let mut state = self.lock();
        let node = Self::parse(&state, handle)?;
        let current = state.current;
        let key = state.pages[current].nodes[node].key.clone();
        state.calls.push(format!("click {}", key));

        match state.pages[current].nodes[node].on_click.clone() {
            Some(OnClick::Goto(page)) => state.current = page,
            Some(OnClick::Fail) => return Err(DriverError::Cdp(format!("点击 {} 失败", key))),
            None => {
                if state.pages[current].nodes[node]
                    .selectors
                    .contains(&selectors::RADIO_INPUT)
                {
                    state.pages[current].nodes[node].checked = true;
                }
            }
        }
        Ok(())
    }

    async fn type_text(&self, handle: &ElementHandle, text: &str) -> Result<(), DriverError> {
        let mut state = self.lock();
        let node = Self::parse(&state, handle)?;
        let current = state.current;
        let target = &mut state.pages[current].nodes[node];
        target.value = text.to_string();
        let call = format!("type {}={}", target.key, text);
        state.calls.push(call);
        Ok(())
    }

    async fn select_option(
        &self,
        handle: &ElementHandle,
        option_text: &str,
    ) -> Result<bool, DriverError> {
        let mut state = self.lock();
        let node = Self::parse(&state, handle)?;
        let current = state.current;
        let nodes = &state.pages[current].nodes;
        let found = nodes.iter().enumerate().any(|(i, option)| {
            option.selectors.contains(&selectors::SELECT_OPTION)
                && Self::is_descendant(nodes, i, node)
                && option.text.trim() == option_text
        });
        if found {
            let target = &mut state.pages[current].nodes[node];
            target.value = option_text.to_string();
            let call = format!("select {}={}", target.key, option_text);
            state.calls.push(call);
        }
        Ok(found)
    }

    async fn set_file_input(&self, handle: &ElementHandle, path: &Path) -> Result<(), DriverError> {
        let mut state = self.lock();
        let node = Self::parse(&state, handle)?;
        let key = state.pages[state.current].nodes[node].key.clone();
        state.calls.push(format!("file {}={}", key, path.display()));
        Ok(())
    }

    async fn get_attribute(
        &self,
        handle: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, DriverError> {
        let state = self.lock();
        let node = Self::parse(&state, handle)?;
        Ok(state.pages[state.current].nodes[node].attrs.get(name).cloned())
    }

    async fn inner_text(&self, handle: &ElementHandle) -> Result<String, DriverError> {
        let state = self.lock();
        let node = Self::parse(&state, handle)?;
        Ok(state.pages[state.current].nodes[node].text.clone())
    }

    async fn input_value(&self, handle: &ElementHandle) -> Result<String, DriverError> {
        let state = self.lock();
        let node = Self::parse(&state, handle)?;
        Ok(state.pages[state.current].nodes[node].value.clone())
    }

    async fn is_checked(&self, handle: &ElementHandle) -> Result<bool, DriverError> {
        let state = self.lock();
        let node = Self::parse(&state, handle)?;
        Ok(state.pages[state.current].nodes[node].checked)
    }

    async fn is_visible(&self, handle: &ElementHandle) -> Result<bool, DriverError> {
        let state = self.lock();
        let node = Self::parse(&state, handle)?;
        Ok(state.pages[state.current].nodes[node].visible)
    }

    async fn press_escape(&self) -> Result<(), DriverError> {
        self.lock().calls.push("escape".to_string());
        Ok(())
    }
}

// ========== 假 LLM ==========

/// 按提示词中的片段返回固定回答，没有命中时返回空字符串
#[derive(Default)]
pub struct ScriptedOracle {
    replies: Vec<(String, Result<String, String>)>,
    calls: Mutex<usize>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, fragment: &str, answer: &str) -> Self {
        self.replies
            .push((fragment.to_string(), Ok(answer.to_string())));
        self
    }

    pub fn fail(mut self, fragment: &str) -> Self {
        self.replies
            .push((fragment.to_string(), Err("服务不可用".to_string())));
        self
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    fn answer(&self, prompt: &Prompt) -> Result<OracleAnswer, LlmError> {
        *self.calls.lock().unwrap() += 1;
        let reply = self
            .replies
            .iter()
            .find(|(fragment, _)| prompt.user.contains(fragment.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| Ok(String::new()));
        match reply {
            Ok(text) => Ok(OracleAnswer {
                text,
                tokens: TOKENS_PER_CALL,
            }),
            Err(message) => Err(LlmError::ApiCallFailed {
                model: "scripted".to_string(),
                message,
            }),
        }
    }
}

#[async_trait]
impl AnswerOracle for ScriptedOracle {
    async fn complete_text(&self, prompt: &Prompt) -> Result<OracleAnswer, LlmError> {
        self.answer(prompt)
    }

    async fn complete_choice(
        &self,
        prompt: &Prompt,
        _options: &[String],
    ) -> Result<OracleAnswer, LlmError> {
        self.answer(prompt)
    }
}

// ========== 测试数据 ==========

pub fn candidate() -> Candidate {
    Candidate {
        name: "Ana Souza".into(),
        email: "ana@example.com".into(),
        phone: "+55 11 91234-5678".into(),
        resume_text: "Backend engineer, 6 years of Rust and Go.".into(),
        skills: vec!["Rust".into(), "PostgreSQL".into()],
        experience_years: 6,
        ..Default::default()
    }
}

pub fn resolver(oracle: ScriptedOracle) -> (Arc<ScriptedOracle>, AnswerResolver) {
    let oracle = Arc::new(oracle);
    let resolver = AnswerResolver::new(oracle.clone(), candidate(), 2000);
    (oracle, resolver)
}

pub fn job(job_id: &str) -> JobListing {
    JobListing {
        job_id: job_id.to_string(),
        title: "Senior Rust Engineer".into(),
        company: "Acme".into(),
        location: "Remote".into(),
        description: "We build storage engines in Rust.".into(),
        url: format!("https://www.linkedin.com/jobs/view/{}/", job_id),
        is_remote: true,
    }
}

pub fn flow_settings() -> FlowSettings {
    FlowSettings {
        max_form_pages: 5,
        apply_button_wait: Duration::from_millis(300),
    }
}

pub fn pacer() -> Pacer {
    Pacer::instant()
}
