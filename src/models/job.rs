//! 职位信息

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// 远程职位的关键词（多语言）
const REMOTE_KEYWORDS: &[&str] = &["remote", "remoto", "home office", "trabalho remoto"];

/// 已打开的职位详情
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobListing {
    /// 站点上的职位唯一 ID
    pub job_id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub url: String,
    pub is_remote: bool,
}

impl JobListing {
    /// 用于日志显示的名称
    pub fn display_name(&self) -> String {
        format!("{} @ {}", self.title, self.company)
    }

    /// 根据描述和地点判断是否远程
    pub fn detect_remote(description: &str, location: &str) -> bool {
        let haystack = format!("{} {}", description, location).to_lowercase();
        REMOTE_KEYWORDS.iter().any(|kw| haystack.contains(kw))
    }
}

/// 从职位 URL 中提取职位 ID
///
/// 支持 `/jobs/view/<id>` 和 `currentJobId=<id>` 两种形式。
pub fn job_id_from_url(url: &str) -> Option<String> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        [r"/jobs/view/(\d+)", r"currentJobId=(\d+)"]
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    });

    patterns
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_id_from_view_url() {
        assert_eq!(
            job_id_from_url("https://www.linkedin.com/jobs/view/3748192301/?refId=abc"),
            Some("3748192301".to_string())
        );
    }

    #[test]
    fn extracts_id_from_search_url() {
        assert_eq!(
            job_id_from_url("https://www.linkedin.com/jobs/search/?currentJobId=42&keywords=rust"),
            Some("42".to_string())
        );
    }

    #[test]
    fn no_id_in_feed_url() {
        assert_eq!(job_id_from_url("https://www.linkedin.com/feed/"), None);
    }

    #[test]
    fn remote_detection_is_case_insensitive() {
        assert!(JobListing::detect_remote("Fully REMOTE team", "Lisbon"));
        assert!(JobListing::detect_remote("", "Trabalho remoto - Brasil"));
        assert!(!JobListing::detect_remote("On-site", "Berlin"));
    }
}
