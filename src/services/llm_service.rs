//! LLM 服务 - 业务能力层
//!
//! 只负责"回答表单问题"能力，不关心流程
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型
//! - 兼容 OpenAI API 的服务（如 Azure, Gemini, Doubao 等）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::LlmError;
use crate::services::prompt_builder::Prompt;

/// 文本回答的最大 token 数
const TEXT_MAX_TOKENS: u32 = 150;
/// 选项回答的最大 token 数
const CHOICE_MAX_TOKENS: u32 = 60;

/// LLM 的一次回答
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OracleAnswer {
    pub text: String,
    /// 本次调用消耗的 token
    pub tokens: u32,
}

/// 回答表单问题的能力
///
/// 上游返回格式不对时应尽量降级为原始文本，`Err` 只表示调用本身失败。
#[async_trait]
pub trait AnswerOracle: Send + Sync {
    /// 自由文本回答
    async fn complete_text(&self, prompt: &Prompt) -> Result<OracleAnswer, LlmError>;

    /// 从 `options` 中挑一个，返回的文本不保证与选项完全一致
    async fn complete_choice(
        &self,
        prompt: &Prompt,
        options: &[String],
    ) -> Result<OracleAnswer, LlmError>;
}

/// LLM 服务
///
/// 职责：
/// - 调用兼容 OpenAI 的接口回答单个字段
/// - 统计 token 消耗
/// - 不认识表单页 / 职位流程
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        let client = Client::with_config(openai_config);

        Self {
            client,
            model_name: config.llm_model_name.clone(),
        }
    }

    /// 通用的 LLM 调用函数
    ///
    /// 返回去掉首尾空白的回答和本次消耗的 token 数
    pub async fn send_to_llm(
        &self,
        prompt: &Prompt,
        max_tokens: u32,
    ) -> Result<OracleAnswer, LlmError> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", prompt.user.len());

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(prompt.system.as_str())
            .build()
            .map_err(|e| LlmError::RequestBuild(e.to_string()))?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt.user.as_str())
            .build()
            .map_err(|e| LlmError::RequestBuild(e.to_string()))?;

        let messages = vec![
            ChatCompletionRequestMessage::System(system_msg),
            ChatCompletionRequestMessage::User(user_msg),
        ];

        // 构建请求
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.3)
            .max_tokens(max_tokens)
            .build()
            .map_err(|e| LlmError::RequestBuild(e.to_string()))?;

        // 调用 API
        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            LlmError::ApiCallFailed {
                model: self.model_name.clone(),
                message: e.to_string(),
            }
        })?;

        let tokens = response
            .usage
            .as_ref()
            .map(|usage| usage.total_tokens)
            .unwrap_or(0);

        // 提取响应内容
        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| LlmError::EmptyResponse {
                model: self.model_name.clone(),
            })?;

        debug!("LLM API 调用成功，消耗 {} tokens", tokens);

        Ok(OracleAnswer {
            text: content.trim().to_string(),
            tokens,
        })
    }
}

#[async_trait]
impl AnswerOracle for LlmService {
    async fn complete_text(&self, prompt: &Prompt) -> Result<OracleAnswer, LlmError> {
        let answer = self.send_to_llm(prompt, TEXT_MAX_TOKENS).await?;
        Ok(OracleAnswer {
            text: strip_quotes(&answer.text).to_string(),
            tokens: answer.tokens,
        })
    }

    async fn complete_choice(
        &self,
        prompt: &Prompt,
        options: &[String],
    ) -> Result<OracleAnswer, LlmError> {
        debug!("请求 LLM 从 {} 个选项中选择", options.len());
        let answer = self.send_to_llm(prompt, CHOICE_MAX_TOKENS).await?;
        Ok(OracleAnswer {
            text: parse_choice_reply(&answer.text),
            tokens: answer.tokens,
        })
    }
}

#[derive(Deserialize)]
struct ChoiceReply {
    selected_option: String,
}

/// 解析选项回答
///
/// 优先读取 `{"selected_option": ...}`（允许外面包着代码块或说明文字），
/// 解析不了就退回原始文本，交给调用方做模糊匹配。
pub fn parse_choice_reply(raw: &str) -> String {
    let trimmed = raw.trim();

    let json_slice = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => Some(&trimmed[start..=end]),
        _ => None,
    };

    if let Some(slice) = json_slice {
        match serde_json::from_str::<ChoiceReply>(slice) {
            Ok(reply) => return reply.selected_option.trim().to_string(),
            Err(e) => debug!("选项回答不是合法 JSON ({}), 使用原始文本", e),
        }
    }

    strip_quotes(trimmed).to_string()
}

fn strip_quotes(text: &str) -> &str {
    text.trim().trim_matches(|c| c == '"' || c == '\'').trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json_reply() {
        assert_eq!(parse_choice_reply(r#"{"selected_option": "Yes"}"#), "Yes");
    }

    #[test]
    fn parses_json_inside_code_fence() {
        let raw = "```json\n{\"selected_option\": \" 3-5 years \"}\n```";
        assert_eq!(parse_choice_reply(raw), "3-5 years");
    }

    #[test]
    fn malformed_reply_degrades_to_raw_text() {
        assert_eq!(parse_choice_reply("\"No\""), "No");
        assert_eq!(parse_choice_reply("{oops}"), "{oops}");
        assert_eq!(parse_choice_reply(r#"{"answer": "Yes"}"#), r#"{"answer": "Yes"}"#);
    }

    /// 测试真实 API 调用
    ///
    /// 运行方式：
    /// ```bash
    /// OPENAI_API_KEY=... cargo test test_live_choice -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_live_choice() {
        let _ = tracing_subscriber::fmt::try_init();

        let config = Config::from_env().expect("配置加载失败");
        let service = LlmService::new(&config);
        let prompt = Prompt {
            system: "Answer with JSON.".into(),
            user: r#"Pick one of: Yes, No. Respond as {"selected_option": "..."}"#.into(),
        };
        let options = vec!["Yes".to_string(), "No".to_string()];

        let answer = service
            .complete_choice(&prompt, &options)
            .await
            .expect("LLM 调用失败");
        println!("LLM 响应: {} ({} tokens)", answer.text, answer.tokens);
        assert!(!answer.text.is_empty());
    }
}
