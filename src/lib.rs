pub mod app;
pub mod config;
pub mod http;
pub mod i18n;
pub mod notify;
pub mod security;
pub mod storage;
