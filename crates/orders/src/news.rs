//! Notice-board news posted by staff and shown to every user until it
//! expires.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use campusdesk_core::{DomainError, DomainResult, Entity, InstituteId, NewsId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct News {
    #[serde(rename = "_id")]
    pub id: NewsId,
    pub message: String,
    pub created_on: DateTime<Utc>,
    pub created_by: InstituteId,
}

impl Entity for News {
    type Id = NewsId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Body of a news post or edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsDraft {
    pub message: String,
}

impl NewsDraft {
    pub fn touched_fields(&self) -> Vec<&'static str> {
        vec!["message"]
    }

    fn checked_message(&self) -> DomainResult<String> {
        let message = self.message.trim();
        if message.is_empty() {
            return Err(DomainError::validation("news message must not be empty"));
        }
        Ok(message.to_string())
    }
}

impl News {
    pub fn post(draft: &NewsDraft, by: InstituteId, at: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id: NewsId::new(),
            message: draft.checked_message()?,
            created_on: at,
            created_by: by,
        })
    }

    /// Replace the message. Author and posting time are kept.
    pub fn edit(&mut self, draft: &NewsDraft) -> DomainResult<()> {
        self.message = draft.checked_message()?;
        Ok(())
    }

    pub fn is_authored_by(&self, user: &InstituteId) -> bool {
        &self.created_by == user
    }

    /// Posted within the last `window`, up to and including `now`.
    pub fn is_current(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.created_on >= now - window && self.created_on <= now
    }
}

/// Newest first.
pub fn sort_newest_first(news: &mut [News]) {
    news.sort_by(|a, b| b.created_on.cmp(&a.created_on));
}
