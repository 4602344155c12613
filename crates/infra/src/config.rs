//! Process configuration, read once from the environment at startup.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

use campusdesk_auth::PolicyTable;

use crate::mail::MailTemplates;
use crate::seed::Seed;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEV_JWT_SECRET: &str = "dev-secret";
const DEFAULT_ISSUER: &str = "campusdesk";
const DEFAULT_MAIL_FROM: &str = "noreply@campusdesk.local";
const DEFAULT_NEWS_EXPIRY_DAYS: u32 = 7;

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub policy_path: Option<PathBuf>,
    pub mail_templates_path: Option<PathBuf>,
    pub mail_from: String,
    pub seed_path: Option<PathBuf>,
    /// How long a news post stays on the board.
    pub news_expiry_days: u32,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let bind_addr = lookup("CAMPUSDESK_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("CAMPUSDESK_BIND_ADDR is not a socket address")?;

        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let news_expiry_days = match lookup("CAMPUSDESK_NEWS_EXPIRY_DAYS") {
            Some(raw) => raw
                .parse::<u32>()
                .context("CAMPUSDESK_NEWS_EXPIRY_DAYS is not a day count")?,
            None => DEFAULT_NEWS_EXPIRY_DAYS,
        };

        Ok(Self {
            bind_addr,
            jwt_secret,
            jwt_issuer: lookup("JWT_ISSUER").unwrap_or_else(|| DEFAULT_ISSUER.to_string()),
            policy_path: lookup("CAMPUSDESK_POLICY_PATH").map(PathBuf::from),
            mail_templates_path: lookup("CAMPUSDESK_MAIL_TEMPLATES_PATH").map(PathBuf::from),
            mail_from: lookup("CAMPUSDESK_MAIL_FROM")
                .unwrap_or_else(|| DEFAULT_MAIL_FROM.to_string()),
            seed_path: lookup("CAMPUSDESK_SEED_PATH").map(PathBuf::from),
            news_expiry_days,
        })
    }

    /// The override file if one is configured, else the built-in table.
    pub fn load_policy(&self) -> anyhow::Result<PolicyTable> {
        match &self.policy_path {
            Some(path) => {
                let document = std::fs::read_to_string(path)
                    .with_context(|| format!("reading policy file {}", path.display()))?;
                let table = PolicyTable::from_json(&document)
                    .with_context(|| format!("parsing policy file {}", path.display()))?;
                tracing::info!(path = %path.display(), "loaded policy override");
                Ok(table)
            }
            None => Ok(PolicyTable::builtin().clone()),
        }
    }

    pub fn load_mail_templates(&self) -> anyhow::Result<MailTemplates> {
        match &self.mail_templates_path {
            Some(path) => {
                let document = std::fs::read_to_string(path)
                    .with_context(|| format!("reading mail templates {}", path.display()))?;
                MailTemplates::from_json(&document)
                    .with_context(|| format!("parsing mail templates {}", path.display()))
            }
            None => MailTemplates::builtin().context("built-in mail templates"),
        }
    }

    /// Seed fixtures, when a seed file is configured.
    pub fn load_seed(&self) -> anyhow::Result<Option<Seed>> {
        let Some(path) = &self.seed_path else {
            return Ok(None);
        };
        let document = std::fs::read_to_string(path)
            .with_context(|| format!("reading seed file {}", path.display()))?;
        Seed::from_json(&document).map(Some)
    }
}
