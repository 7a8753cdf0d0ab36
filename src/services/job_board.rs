//! 职位站点服务 - 业务能力层
//!
//! 只负责"登录 / 搜索 / 打开职位"能力，不关心投递流程

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{AppError, DriverError};
use crate::infrastructure::selectors;
use crate::infrastructure::AutomationDriver;
use crate::models::{job_id_from_url, JobFilter, JobListing};
use crate::services::opsec::Pacer;

/// 等待页面主要元素出现的时间
const PAGE_WAIT: Duration = Duration::from_secs(10);

/// 登录凭据
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// 当前地址是否是登录墙
pub fn is_login_url(url: &str) -> bool {
    let url = url.to_lowercase();
    url.contains("login") || url.contains("authwall")
}

/// 职位站点
pub struct JobBoard<'a> {
    driver: &'a dyn AutomationDriver,
    base_url: String,
    pacer: Pacer,
}

impl<'a> JobBoard<'a> {
    pub fn new(driver: &'a dyn AutomationDriver, base_url: &str, pacer: Pacer) -> Self {
        Self {
            driver,
            base_url: base_url.trim_end_matches('/').to_string(),
            pacer,
        }
    }

    /// 确认已登录，必要时用凭据登录
    pub async fn ensure_logged_in(
        &self,
        credentials: Option<&Credentials>,
    ) -> Result<bool, DriverError> {
        self.driver
            .navigate(&format!("{}/feed/", self.base_url))
            .await?;
        if !is_login_url(&self.driver.current_url().await?) {
            info!("✓ 已登录");
            return Ok(true);
        }

        let Some(credentials) = credentials else {
            warn!("⚠️ 未登录且没有配置登录凭据，请先在浏览器中手动登录");
            return Ok(false);
        };

        info!("🔐 正在使用凭据登录: {}", credentials.username);
        self.driver
            .navigate(&format!("{}/login", self.base_url))
            .await?;

        let Some(email) = self
            .driver
            .wait_for_element(selectors::LOGIN_EMAIL, PAGE_WAIT)
            .await?
        else {
            warn!("⚠️ 找不到登录表单");
            return Ok(false);
        };
        self.driver.type_text(&email, &credentials.username).await?;
        self.pacer.wait_before_action().await;

        if let Some(password) = self.driver.find_element(selectors::LOGIN_PASSWORD).await? {
            self.driver
                .type_text(&password, &credentials.password)
                .await?;
        }
        self.pacer.wait_before_action().await;

        if let Some(button) = self.driver.find_element(selectors::LOGIN_BUTTON).await? {
            self.driver.click(&button).await?;
        }
        tokio::time::sleep(Duration::from_secs(3)).await;

        let logged_in = !is_login_url(&self.driver.current_url().await?);
        if logged_in {
            info!("✓ 登录成功");
        } else {
            warn!("⚠️ 登录失败（可能需要验证码或二次验证）");
        }
        Ok(logged_in)
    }

    /// 读取某一页搜索结果中的职位链接
    ///
    /// 返回去重后的规范化职位地址，保持页面顺序。
    pub async fn collect_job_urls(
        &self,
        filter: &JobFilter,
        page: usize,
    ) -> Result<Vec<String>, AppError> {
        let url = filter.search_url(&self.base_url, page)?;
        debug!("搜索地址: {}", url);
        self.driver.navigate(&url).await?;

        if self
            .driver
            .wait_for_element(selectors::JOB_CARD_LINK, PAGE_WAIT)
            .await?
            .is_none()
        {
            return Ok(Vec::new());
        }

        let mut job_ids: Vec<String> = Vec::new();
        for link in self.driver.find_all(None, selectors::JOB_CARD_LINK).await? {
            let Some(href) = self.driver.get_attribute(&link, "href").await? else {
                continue;
            };
            if let Some(id) = job_id_from_url(&href) {
                if !job_ids.contains(&id) {
                    job_ids.push(id);
                }
            }
        }

        Ok(job_ids
            .into_iter()
            .map(|id| format!("{}/jobs/view/{}/", self.base_url, id))
            .collect())
    }

    /// 打开职位详情页并读取信息
    pub async fn open_listing(&self, url: &str) -> Result<JobListing, DriverError> {
        self.driver.navigate(url).await?;
        self.driver
            .wait_for_element(selectors::JOB_TITLE, PAGE_WAIT)
            .await?;

        let job_id = match job_id_from_url(url) {
            Some(id) => id,
            None => match self.driver.find_element(selectors::JOB_ID_NODE).await? {
                Some(node) => self
                    .driver
                    .get_attribute(&node, "data-job-id")
                    .await?
                    .unwrap_or_default(),
                None => String::new(),
            },
        };

        let title = self.text_of(selectors::JOB_TITLE).await?;
        let company = self.text_of(selectors::JOB_COMPANY).await?;
        let location = self.text_of(selectors::JOB_LOCATION).await?;
        let description = self.text_of(selectors::JOB_DESCRIPTION).await?;
        let is_remote = JobListing::detect_remote(&description, &location);

        Ok(JobListing {
            job_id,
            title,
            company,
            location,
            description,
            url: url.to_string(),
            is_remote,
        })
    }

    async fn text_of(&self, selector: &str) -> Result<String, DriverError> {
        match self.driver.find_element(selector).await? {
            Some(handle) => Ok(self.driver.inner_text(&handle).await?.trim().to_string()),
            None => Ok(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_walls_are_detected() {
        assert!(is_login_url("https://www.linkedin.com/login?from=feed"));
        assert!(is_login_url("https://www.linkedin.com/authwall?trk=x"));
        assert!(!is_login_url("https://www.linkedin.com/feed/"));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let credentials = Credentials {
            username: "ana@example.com".into(),
            password: "hunter2".into(),
        };
        let printed = format!("{:?}", credentials);
        assert!(printed.contains("ana@example.com"));
        assert!(!printed.contains("hunter2"));
    }
}
