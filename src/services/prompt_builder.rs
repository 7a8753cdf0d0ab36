//! 提示词构建 - 业务能力层
//!
//! 把候选人资料、职位信息和表单字段拼成发给 LLM 的消息

use crate::models::{Candidate, FormField, JobListing};

const SYSTEM_PROMPT_BASE: &str = "You help a job candidate answer questions on job application forms.\n\
You receive the candidate profile, the job posting and one form question.\n\
Answer professionally and concisely using only facts from the candidate profile.\n\
Never invent information that is not in the profile.\n\
Answer in the same language as the question.";

const SYSTEM_PROMPT_JSON: &str = "\n\nRespond ONLY with valid JSON, without any extra text. \
The JSON must follow exactly the schema given in the question.";

/// 发给 LLM 的一组消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// 提示词构建器
pub struct PromptBuilder {
    candidate_context: String,
    description_budget: usize,
}

impl PromptBuilder {
    /// `description_budget` 为职位描述保留的最大字符数
    pub fn new(candidate: &Candidate, description_budget: usize) -> Self {
        Self {
            candidate_context: candidate.context_for_ai(),
            description_budget,
        }
    }

    /// 自由文本字段的提示词
    pub fn text_prompt(&self, field: &FormField, job: Option<&JobListing>) -> Prompt {
        let mut parts = vec![
            "## CANDIDATE PROFILE".to_string(),
            self.candidate_context.clone(),
        ];

        if let Some(job) = job {
            parts.push("\n## JOB".to_string());
            parts.push(format!("Company: {}", job.company));
            parts.push(format!("Title: {}", job.title));
            parts.push(format!("Location: {}", job.location));
            if !job.description.trim().is_empty() {
                parts.push(format!(
                    "\nDescription:\n{}",
                    truncate_chars(&job.description, self.description_budget)
                ));
            }
        }

        parts.push("\n## FORM FIELD".to_string());
        parts.extend(field_lines(field));

        parts.push(
            "\n## INSTRUCTIONS\n\
             Give the best answer for this field based on the candidate profile.\n\
             - Use the exact name, email and phone from the profile.\n\
             - For years of experience, use the number from the profile.\n\
             - For salary expectations without data in the profile, answer \"Negotiable\".\n\
             - For availability or start date without data, answer \"Immediately\".\n\
             Respond with ONLY the answer text. No explanations."
                .to_string(),
        );

        Prompt {
            system: SYSTEM_PROMPT_BASE.to_string(),
            user: parts.join("\n"),
        }
    }

    /// 受限选项字段的提示词，要求 LLM 返回 JSON
    pub fn choice_prompt(
        &self,
        field: &FormField,
        options: &[String],
        job: Option<&JobListing>,
    ) -> Prompt {
        let mut parts = vec![
            "## CANDIDATE PROFILE".to_string(),
            self.candidate_context.clone(),
        ];

        if let Some(job) = job {
            parts.push("\n## JOB".to_string());
            parts.push(format!("Company: {}", job.company));
            parts.push(format!("Title: {}", job.title));
        }

        parts.push("\n## FORM FIELD".to_string());
        parts.extend(field_lines(field));

        parts.push("\n## AVAILABLE OPTIONS".to_string());
        parts.extend(options.iter().map(|opt| format!("- {}", opt)));

        parts.push("\n## RESPONSE FORMAT".to_string());
        parts.push("Respond ONLY with JSON in this format:".to_string());
        parts.push(r#"{"selected_option": "the chosen option exactly as listed above"}"#.to_string());

        Prompt {
            system: format!("{}{}", SYSTEM_PROMPT_BASE, SYSTEM_PROMPT_JSON),
            user: parts.join("\n"),
        }
    }
}

fn field_lines(field: &FormField) -> Vec<String> {
    let mut lines = vec![format!("Question: {}", field.label)];
    if !field.placeholder.trim().is_empty() {
        lines.push(format!("Hint: {}", field.placeholder));
    }
    if field.required {
        lines.push("This field is REQUIRED.".to_string());
    }
    lines
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
