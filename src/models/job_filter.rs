//! 职位搜索条件

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 每页搜索结果数量（站点固定值）
pub const RESULTS_PER_PAGE: usize = 25;

/// 职位搜索条件
///
/// 创建后不可修改，只能整体替换。关键词保持输入顺序并去重。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "JobFilterDef")]
pub struct JobFilter {
    keywords: Vec<String>,
    location: String,
    remote_only: bool,
}

#[derive(Deserialize)]
struct JobFilterDef {
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    location: String,
    #[serde(default)]
    remote_only: bool,
}

impl From<JobFilterDef> for JobFilter {
    fn from(def: JobFilterDef) -> Self {
        JobFilter::new(def.keywords, def.location, def.remote_only)
    }
}

impl JobFilter {
    pub fn new<I, S>(keywords: I, location: impl Into<String>, remote_only: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique: Vec<String> = Vec::new();
        for kw in keywords {
            let kw = kw.as_ref().trim();
            if kw.is_empty() {
                continue;
            }
            if !unique.iter().any(|k| k.eq_ignore_ascii_case(kw)) {
                unique.push(kw.to_string());
            }
        }

        Self {
            keywords: unique,
            location: location.into().trim().to_string(),
            remote_only,
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn remote_only(&self) -> bool {
        self.remote_only
    }

    /// 是否设置了任何条件
    pub fn is_configured(&self) -> bool {
        !self.keywords.is_empty() || !self.location.is_empty()
    }

    /// 构建搜索结果页 URL
    ///
    /// `page` 从 0 开始，只搜索支持 Easy Apply 的职位。
    pub fn search_url(&self, base_url: &str, page: usize) -> Result<String, ConfigError> {
        let endpoint = format!("{}/jobs/search/", base_url.trim_end_matches('/'));

        let mut params: Vec<(&str, String)> = vec![("keywords", self.keywords.join(" "))];
        if !self.location.is_empty() {
            params.push(("location", self.location.clone()));
        }
        if self.remote_only {
            params.push(("f_WRA", "1".to_string()));
        }
        params.push(("f_AL", "true".to_string()));
        if page > 0 {
            params.push(("start", (page * RESULTS_PER_PAGE).to_string()));
        }

        let url = Url::parse_with_params(&endpoint, &params)
            .map_err(|e| ConfigError::invalid("TARGET_URL", e.to_string()))?;
        Ok(url.to_string())
    }
}
