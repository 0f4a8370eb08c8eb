use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Mail address error: {0}")]
    MailAddress(#[from] lettre::address::AddressError),
    #[error("Mail building error: {0}")]
    MailBuild(#[from] lettre::error::Error),
    #[error("Worker pool is closed")]
    PoolClosed,
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}
