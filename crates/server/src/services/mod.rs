pub mod filters;
pub mod mailer;
pub mod matcher;
pub mod oauth;
pub mod storage;
