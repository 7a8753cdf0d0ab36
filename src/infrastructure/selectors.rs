//! 目标站点的 DOM 选择器

// ---- 申请弹窗 ----
pub const MODAL_CONTENT: &str = ".artdeco-modal__content, .jobs-easy-apply-content";
pub const TEXT_INPUT: &str = "input[type=\"text\"], input[type=\"email\"], input[type=\"tel\"], \
                              input[type=\"number\"], input:not([type])";
pub const TEXTAREA: &str = "textarea";
pub const SELECT: &str = "select";
pub const SELECT_OPTION: &str = "option";
pub const FILE_INPUT: &str = "input[type=\"file\"]";
pub const RADIO_GROUP: &str = "fieldset, [role=\"radiogroup\"]";
pub const RADIO_INPUT: &str = "input[type=\"radio\"]";
pub const LEGEND: &str = "legend";
pub const LABEL: &str = "label";
pub const DROPDOWN: &str = "[data-test-text-entity-list-form-component], .artdeco-dropdown";
pub const DROPDOWN_OPTION: &str = "[role=\"option\"], .artdeco-dropdown__option";
/// 下拉框展开后的浮层选项
pub const LISTBOX_OPTION: &str =
    "[role=\"listbox\"] [role=\"option\"], .artdeco-dropdown__content-inner li";

// ---- 流程按钮 ----
pub const EASY_APPLY_BUTTON: &str = "button.jobs-apply-button";
pub const NEXT_BUTTON: &str = "button[aria-label=\"Continue to next step\"]";
pub const REVIEW_BUTTON: &str = "button[aria-label=\"Review your application\"]";
pub const SUBMIT_BUTTON: &str = "button[aria-label=\"Submit application\"]";
pub const DISMISS_BUTTON: &str = "button[aria-label=\"Dismiss\"]";
pub const DISCARD_BUTTON: &str = "button[data-control-name=\"discard_application_confirm_btn\"]";
/// 页面上"已申请"的提示
pub const APPLIED_INDICATOR: &str = ".jobs-s-apply .artdeco-inline-feedback--success";

// ---- 职位详情 ----
pub const JOB_TITLE: &str = "h1.job-title, h1.jobs-unified-top-card__job-title, \
                             .job-details-jobs-unified-top-card__job-title h1";
pub const JOB_COMPANY: &str = ".job-company-name, .jobs-unified-top-card__company-name, \
                               .job-details-jobs-unified-top-card__company-name";
pub const JOB_LOCATION: &str = ".job-location, .jobs-unified-top-card__bullet, \
                                .job-details-jobs-unified-top-card__primary-description-container";
pub const JOB_DESCRIPTION: &str = ".job-description, .jobs-description__content, #job-details";
pub const JOB_ID_NODE: &str = "[data-job-id]";

// ---- 搜索结果 ----
pub const JOB_CARD_LINK: &str = "a.job-card-container__link, a.job-card-list__title";

// ---- 登录 ----
pub const LOGIN_EMAIL: &str = "input[name=\"session_key\"]";
pub const LOGIN_PASSWORD: &str = "input[name=\"session_password\"]";
pub const LOGIN_BUTTON: &str = "button[type=\"submit\"]";

/// 与指定 id 绑定的 `<label for=...>`
pub fn label_for(element_id: &str) -> String {
    format!(
        "label[for=\"{}\"]",
        element_id.replace('\\', "\\\\").replace('"', "\\\"")
    )
}
