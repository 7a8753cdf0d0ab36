//! 答案解析服务 - 业务能力层
//!
//! 只负责"这个字段该填什么"，不负责真正填写
//!
//! 规则优先于 LLM：身份字段（姓名/邮箱/电话）永远使用候选人资料中的值，
//! 薪资字段在 LLM 给不出有效答案时使用固定默认值，选项字段永远不留空。

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use phf::phf_set;
use tracing::{debug, warn};

use crate::models::{Candidate, FieldKind, FormField, JobListing};
use crate::services::llm_service::AnswerOracle;
use crate::services::prompt_builder::PromptBuilder;

static NAME_KEYWORDS: phf::Set<&'static str> = phf_set! {
    "nome", "name", "full name", "nombre",
};

static EMAIL_KEYWORDS: phf::Set<&'static str> = phf_set! {
    "email", "e-mail", "correo",
};

static PHONE_KEYWORDS: phf::Set<&'static str> = phf_set! {
    "phone", "telefone", "celular", "mobile", "teléfono",
};

static SALARY_KEYWORDS: phf::Set<&'static str> = phf_set! {
    "salário", "salario", "salary", "pretensão", "compensation", "remuneração",
};

/// 视为"没有回答"的占位答案
static EMPTY_ANSWERS: phf::Set<&'static str> = phf_set! {
    "n/a", "na", "none",
};

/// 薪资字段的默认答案
pub const NEGOTIABLE: &str = "Negotiable";

/// 确定要填写的值
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedValue {
    Text(String),
    /// 选中的选项（`index` 为在选项列表中的位置）
    Choice { option: String, index: usize },
    File(PathBuf),
}

impl fmt::Display for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedValue::Text(text) => f.write_str(text),
            ResolvedValue::Choice { option, .. } => f.write_str(option),
            ResolvedValue::File(path) => write!(f, "📎 {}", path.display()),
        }
    }
}

/// 一个字段的解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// `None` 表示跳过该字段
    pub value: Option<ResolvedValue>,
    pub tokens_used: u32,
    /// LLM 调用失败时的错误信息（此时结果来自降级规则）
    pub oracle_error: Option<String>,
}

impl Resolution {
    fn skip() -> Self {
        Self {
            value: None,
            tokens_used: 0,
            oracle_error: None,
        }
    }
}

/// 答案解析器
pub struct AnswerResolver {
    oracle: Arc<dyn AnswerOracle>,
    prompts: PromptBuilder,
    candidate: Candidate,
}

impl AnswerResolver {
    pub fn new(oracle: Arc<dyn AnswerOracle>, candidate: Candidate, description_budget: usize) -> Self {
        Self {
            oracle,
            prompts: PromptBuilder::new(&candidate, description_budget),
            candidate,
        }
    }

    pub fn candidate(&self) -> &Candidate {
        &self.candidate
    }

    /// 解析字段的值
    ///
    /// `options` 为字段当前可选的选项（下拉框可能需要展开后才拿得到，
    /// 所以由调用方传入），非选项字段传空切片即可。
    pub async fn resolve(
        &self,
        field: &FormField,
        options: &[String],
        job: Option<&JobListing>,
    ) -> Resolution {
        match field.kind() {
            FieldKind::File => self.resolve_file(field),
            FieldKind::Text | FieldKind::Textarea => self.resolve_text(field, job).await,
            FieldKind::Select | FieldKind::Radio | FieldKind::Dropdown => {
                self.resolve_choice(field, options, job).await
            }
        }
    }

    fn resolve_file(&self, field: &FormField) -> Resolution {
        match &self.candidate.resume_path {
            Some(path) => Resolution {
                value: Some(ResolvedValue::File(path.clone())),
                ..Resolution::skip()
            },
            None => {
                debug!("没有配置简历文件，跳过上传字段 '{}'", field.label);
                Resolution::skip()
            }
        }
    }

    async fn resolve_text(&self, field: &FormField, job: Option<&JobListing>) -> Resolution {
        let prompt = self.prompts.text_prompt(field, job);

        match self.oracle.complete_text(&prompt).await {
            Ok(answer) => {
                let text = self.apply_overrides(&field.label, answer.text.trim());
                Resolution {
                    value: (!text.is_empty()).then_some(ResolvedValue::Text(text)),
                    tokens_used: answer.tokens,
                    oracle_error: None,
                }
            }
            Err(e) => {
                warn!("字段 '{}' LLM 调用失败: {}", field.label, e);
                // 身份/薪资字段仍可以用规则填写，其余字段跳过
                let text = self.apply_overrides(&field.label, "");
                Resolution {
                    value: (!text.is_empty()).then_some(ResolvedValue::Text(text)),
                    tokens_used: 0,
                    oracle_error: Some(e.to_string()),
                }
            }
        }
    }

    async fn resolve_choice(
        &self,
        field: &FormField,
        options: &[String],
        job: Option<&JobListing>,
    ) -> Resolution {
        if options.is_empty() {
            debug!("字段 '{}' 没有可选项，跳过", field.label);
            return Resolution::skip();
        }

        let prompt = self.prompts.choice_prompt(field, options, job);
        let (answer, tokens_used, oracle_error) =
            match self.oracle.complete_choice(&prompt, options).await {
                Ok(answer) => (answer.text, answer.tokens, None),
                Err(e) => {
                    warn!("字段 '{}' LLM 调用失败，使用第一个选项: {}", field.label, e);
                    (String::new(), 0, Some(e.to_string()))
                }
            };

        let index = match match_option(&answer, options) {
            Some(index) => index,
            None => {
                if oracle_error.is_none() {
                    debug!(
                        "回答 '{}' 与选项都不匹配，使用第一个选项 '{}'",
                        answer, options[0]
                    );
                }
                0
            }
        };

        Resolution {
            value: Some(ResolvedValue::Choice {
                option: options[index].clone(),
                index,
            }),
            tokens_used,
            oracle_error,
        }
    }

    /// 规则覆盖：身份字段用真实资料，薪资字段兜底
    pub fn apply_overrides(&self, label: &str, answer: &str) -> String {
        let label = label.to_lowercase();
        let candidate = &self.candidate;

        let identity = [
            (&NAME_KEYWORDS, &candidate.name),
            (&EMAIL_KEYWORDS, &candidate.email),
            (&PHONE_KEYWORDS, &candidate.phone),
        ];
        for (keywords, value) in identity {
            if matches_keyword(&label, keywords) && !value.trim().is_empty() {
                return value.clone();
            }
        }

        if matches_keyword(&label, &SALARY_KEYWORDS) {
            let normalized = answer.trim().to_lowercase();
            if normalized.chars().count() < 3 || EMPTY_ANSWERS.contains(normalized.as_str()) {
                return NEGOTIABLE.to_string();
            }
        }

        answer.to_string()
    }
}

fn matches_keyword(label_lower: &str, keywords: &phf::Set<&'static str>) -> bool {
    keywords.iter().any(|kw| label_lower.contains(kw))
}

/// 把回答匹配到选项
///
/// 先做忽略大小写的完全匹配，再做双向包含匹配，都取第一个命中的选项。
pub fn match_option(answer: &str, options: &[String]) -> Option<usize> {
    let answer = answer.trim().to_lowercase();
    if answer.is_empty() {
        return None;
    }

    let normalized: Vec<String> = options.iter().map(|o| o.trim().to_lowercase()).collect();

    if let Some(index) = normalized.iter().position(|opt| *opt == answer) {
        return Some(index);
    }

    normalized
        .iter()
        .position(|opt| !opt.is_empty() && (answer.contains(opt.as_str()) || opt.contains(&answer)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::infrastructure::ElementHandle;
    use crate::models::FieldInput;
    use crate::services::llm_service::OracleAnswer;
    use crate::services::prompt_builder::Prompt;
    use async_trait::async_trait;

    /// 固定回答的 LLM
    struct FixedOracle(Result<&'static str, ()>);

    #[async_trait]
    impl AnswerOracle for FixedOracle {
        async fn complete_text(&self, _prompt: &Prompt) -> Result<OracleAnswer, LlmError> {
            self.answer()
        }

        async fn complete_choice(
            &self,
            _prompt: &Prompt,
            _options: &[String],
        ) -> Result<OracleAnswer, LlmError> {
            self.answer()
        }
    }

    impl FixedOracle {
        fn answer(&self) -> Result<OracleAnswer, LlmError> {
            match self.0 {
                Ok(text) => Ok(OracleAnswer {
                    text: text.to_string(),
                    tokens: 7,
                }),
                Err(()) => Err(LlmError::ApiCallFailed {
                    model: "test".into(),
                    message: "timeout".into(),
                }),
            }
        }
    }

    fn candidate() -> Candidate {
        Candidate {
            name: "Ana Souza".into(),
            email: "a@b.com".into(),
            phone: "+55 11 99999-0000".into(),
            resume_text: "Rust developer".into(),
            resume_path: Some(PathBuf::from("/tmp/resume.pdf")),
            ..Candidate::default()
        }
    }

    fn resolver(reply: Result<&'static str, ()>) -> AnswerResolver {
        AnswerResolver::new(Arc::new(FixedOracle(reply)), candidate(), 2000)
    }

    fn field(label: &str, input: FieldInput) -> FormField {
        FormField {
            input,
            label: label.into(),
            name: String::new(),
            placeholder: String::new(),
            required: true,
            current_value: String::new(),
            handle: ElementHandle::new("#f"),
        }
    }

    fn options(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_match_wins_over_containment() {
        let opts = options(&["Not sure", "No", "Yes"]);
        assert_eq!(match_option("no", &opts), Some(1));
        assert_eq!(match_option("  YES ", &opts), Some(2));
    }

    #[test]
    fn containment_matches_both_directions() {
        let opts = options(&["Yes", "No"]);
        assert_eq!(match_option("yes please", &opts), Some(0));

        let opts = options(&["3-5 years of experience", "More than 5 years"]);
        assert_eq!(match_option("3-5 years", &opts), Some(0));
    }

    #[test]
    fn no_match_for_empty_or_unrelated_answer() {
        let opts = options(&["Yes", "No"]);
        assert_eq!(match_option("", &opts), None);
        assert_eq!(match_option("maybe", &opts), None);
        assert_eq!(match_option("x", &options(&["", "Yes"])), None);
    }

    #[tokio::test]
    async fn select_answer_is_matched_by_substring() {
        let opts = options(&["Yes", "No"]);
        let f = field(
            "Do you have a driver's license?",
            FieldInput::Select {
                options: opts.clone(),
            },
        );
        let resolution = resolver(Ok("yes please")).resolve(&f, &opts, None).await;
        assert_eq!(
            resolution.value,
            Some(ResolvedValue::Choice {
                option: "Yes".into(),
                index: 0
            })
        );
        assert_eq!(resolution.tokens_used, 7);
    }

    #[tokio::test]
    async fn choice_falls_back_to_first_option() {
        let opts = options(&["Brazil", "Portugal"]);
        let f = field("Country", FieldInput::Dropdown { options: opts.clone() });

        let unmatched = resolver(Ok("Atlantis")).resolve(&f, &opts, None).await;
        assert!(matches!(
            unmatched.value,
            Some(ResolvedValue::Choice { index: 0, .. })
        ));
        assert!(unmatched.oracle_error.is_none());

        let failed = resolver(Err(())).resolve(&f, &opts, None).await;
        assert!(matches!(failed.value, Some(ResolvedValue::Choice { index: 0, .. })));
        assert!(failed.oracle_error.is_some());
        assert_eq!(failed.tokens_used, 0);
    }

    #[tokio::test]
    async fn email_is_never_taken_from_the_oracle() {
        let f = field("Email", FieldInput::Text);
        let resolution = resolver(Ok("unknown@example.com"))
            .resolve(&f, &[], None)
            .await;
        assert_eq!(resolution.value, Some(ResolvedValue::Text("a@b.com".into())));
    }

    #[tokio::test]
    async fn identity_override_survives_oracle_failure() {
        let f = field("Telefone celular", FieldInput::Text);
        let resolution = resolver(Err(())).resolve(&f, &[], None).await;
        assert_eq!(
            resolution.value,
            Some(ResolvedValue::Text("+55 11 99999-0000".into()))
        );
        assert!(resolution.oracle_error.is_some());

        let other = field("Why do you want this job?", FieldInput::Textarea);
        assert_eq!(resolver(Err(())).resolve(&other, &[], None).await.value, None);
    }

    #[tokio::test]
    async fn salary_placeholder_answers_become_negotiable() {
        let f = field("Pretensão salarial", FieldInput::Text);
        for reply in ["N/A", "na", "-", ""] {
            let resolution = resolver(Ok(reply)).resolve(&f, &[], None).await;
            assert_eq!(resolution.value, Some(ResolvedValue::Text(NEGOTIABLE.into())));
        }

        let concrete = resolver(Ok("R$ 10.000")).resolve(&f, &[], None).await;
        assert_eq!(concrete.value, Some(ResolvedValue::Text("R$ 10.000".into())));
    }

    #[tokio::test]
    async fn file_fields_bypass_the_oracle() {
        let f = field("Resume", FieldInput::File);
        let resolution = resolver(Err(())).resolve(&f, &[], None).await;
        assert_eq!(
            resolution.value,
            Some(ResolvedValue::File(PathBuf::from("/tmp/resume.pdf")))
        );
        assert!(resolution.oracle_error.is_none());
    }
}
