use chrono::Utc;
use serde_json::Value as JsonValue;

use campusdesk_auth::{Action, Principal, Resource, Scope, ScopedGrant};
use campusdesk_core::{ExpectedVersion, NewsId};
use campusdesk_orders::{sort_newest_first, News, NewsDraft};

use super::{check_writable, shape, Workflow, WorkflowError, WorkflowResult};

impl Workflow {
    /// The news board: posts younger than the news window, newest first.
    /// Posts are broadcast, so any read grant sees every author's posts.
    #[tracing::instrument(skip(self, principal), fields(actor = %principal.institute_id), err)]
    pub async fn list_news(&self, principal: &Principal) -> WorkflowResult<JsonValue> {
        let scoped = self.widest(principal, Resource::News, Action::Read)?;
        let (now, window) = (Utc::now(), self.news_window);
        let mut news = self
            .persistence
            .news
            .find(&move |n: &News| n.is_current(now, window))
            .await?;
        sort_newest_first(&mut news);
        shape(&news, &scoped.grant)
    }

    #[tracing::instrument(
        skip(self, principal),
        fields(actor = %principal.institute_id, news_id = %id),
        err
    )]
    pub async fn get_news(&self, principal: &Principal, id: NewsId) -> WorkflowResult<JsonValue> {
        let scoped = self.widest(principal, Resource::News, Action::Read)?;
        let news = self.load_news(&id).await?;
        shape(&news, &scoped.grant)
    }

    /// The caller's own current posts, newest first.
    #[tracing::instrument(skip(self, principal), fields(actor = %principal.institute_id), err)]
    pub async fn list_my_news(&self, principal: &Principal) -> WorkflowResult<JsonValue> {
        let grant = self.require(principal, Resource::News, Action::Read, Scope::Own)?;
        let (now, window) = (Utc::now(), self.news_window);
        let me = principal.institute_id.clone();
        let mut news = self
            .persistence
            .news
            .find(&move |n: &News| n.is_authored_by(&me) && n.is_current(now, window))
            .await?;
        sort_newest_first(&mut news);
        shape(&news, &grant)
    }

    #[tracing::instrument(skip(self, principal, draft), fields(actor = %principal.institute_id), err)]
    pub async fn add_news(
        &self,
        principal: &Principal,
        draft: NewsDraft,
    ) -> WorkflowResult<JsonValue> {
        let grant = self.require(principal, Resource::News, Action::Create, Scope::Own)?;
        check_writable(&grant, &draft.touched_fields())?;

        let news = News::post(&draft, principal.institute_id.clone(), Utc::now())?;
        let news = self.persistence.news.create(news).await?;
        tracing::info!(news_id = %news.id, "news posted");

        let read = self.widest(principal, Resource::News, Action::Read)?;
        shape(&news, &read.grant)
    }

    /// Edit the message of a post. Own-scope editors reach only their posts.
    #[tracing::instrument(
        skip(self, principal, draft),
        fields(actor = %principal.institute_id, news_id = %id),
        err
    )]
    pub async fn update_news(
        &self,
        principal: &Principal,
        id: NewsId,
        draft: NewsDraft,
    ) -> WorkflowResult<JsonValue> {
        let scoped = self.widest(principal, Resource::News, Action::Update)?;
        check_writable(&scoped.grant, &draft.touched_fields())?;

        let mut news = self.load_reachable_news(principal, &scoped, &id).await?;
        news.edit(&draft)?;
        let news = self
            .persistence
            .news
            .save(news, ExpectedVersion::Any)
            .await?;

        let read = self.widest(principal, Resource::News, Action::Read)?;
        shape(&news, &read.grant)
    }

    #[tracing::instrument(
        skip(self, principal),
        fields(actor = %principal.institute_id, news_id = %id),
        err
    )]
    pub async fn delete_news(&self, principal: &Principal, id: NewsId) -> WorkflowResult<()> {
        let scoped = self.widest(principal, Resource::News, Action::Delete)?;
        self.load_reachable_news(principal, &scoped, &id).await?;
        if !self.persistence.news.delete(&id).await? {
            return Err(WorkflowError::NotFound("news".into()));
        }
        Ok(())
    }

    /// Clear the board. Returns how many posts were removed.
    #[tracing::instrument(skip(self, principal), fields(actor = %principal.institute_id), err)]
    pub async fn delete_all_news(&self, principal: &Principal) -> WorkflowResult<usize> {
        self.require(principal, Resource::News, Action::Delete, Scope::Any)?;
        let all = self.persistence.news.find(&|_: &News| true).await?;
        self.remove_news(all).await
    }

    /// Remove every post the caller authored, expired ones included.
    #[tracing::instrument(skip(self, principal), fields(actor = %principal.institute_id), err)]
    pub async fn delete_my_news(&self, principal: &Principal) -> WorkflowResult<usize> {
        self.require(principal, Resource::News, Action::Delete, Scope::Own)?;
        let me = principal.institute_id.clone();
        let mine = self
            .persistence
            .news
            .find(&move |n: &News| n.is_authored_by(&me))
            .await?;
        self.remove_news(mine).await
    }

    async fn load_news(&self, id: &NewsId) -> WorkflowResult<News> {
        self.persistence
            .news
            .find_by_id(id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound("news".into()))
    }

    /// Load a post for writing; someone else's post is invisible to an
    /// own-scope writer.
    async fn load_reachable_news(
        &self,
        principal: &Principal,
        scoped: &ScopedGrant,
        id: &NewsId,
    ) -> WorkflowResult<News> {
        let news = self.load_news(id).await?;
        if scoped.is_own_only() && !news.is_authored_by(&principal.institute_id) {
            return Err(WorkflowError::NotFound("news".into()));
        }
        Ok(news)
    }

    async fn remove_news(&self, news: Vec<News>) -> WorkflowResult<usize> {
        let mut removed = 0;
        for item in news {
            if self.persistence.news.delete(&item.id).await? {
                removed += 1;
            }
        }
        tracing::info!(removed, "news removed");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use campusdesk_auth::Principal;
    use campusdesk_core::{InstituteId, NewsId};
    use campusdesk_orders::{News, NewsDraft};

    use crate::workflow::testkit::{super_admin, Kit, STUDENT};
    use crate::workflow::WorkflowError;

    fn draft(message: &str) -> NewsDraft {
        NewsDraft {
            message: message.into(),
        }
    }

    async fn post(kit: &Kit, by: &Principal, message: &str) -> NewsId {
        let body = kit.workflow.add_news(by, draft(message)).await.unwrap();
        body["_id"].as_str().unwrap().parse().unwrap()
    }

    async fn stored(kit: &Kit, message: &str, days_ago: i64) {
        let at = chrono::Utc::now() - Duration::days(days_ago);
        let news = News::post(&draft(message), InstituteId::new("archive"), at).unwrap();
        kit.workflow.persistence.news.create(news).await.unwrap();
    }

    #[tokio::test]
    async fn board_shows_current_news_newest_first() {
        let kit = Kit::new();
        let chief = super_admin("admin01");
        let student = kit.student(STUDENT).await;
        stored(&kit, "Convocation schedule", 3).await;
        stored(&kit, "Old fee notice", 30).await;
        post(&kit, &chief, "Registry closed on Friday").await;

        let board = kit.workflow.list_news(&student).await.unwrap();
        let messages: Vec<_> = board
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["message"].as_str().unwrap())
            .collect();
        assert_eq!(messages, ["Registry closed on Friday", "Convocation schedule"]);
    }

    #[tokio::test]
    async fn readers_see_only_their_allowed_fields() {
        let kit = Kit::new();
        let chief = super_admin("admin01");
        let student = kit.student(STUDENT).await;
        let id = post(&kit, &chief, "Library hours extended").await;

        let seen = kit.workflow.get_news(&student, id).await.unwrap();
        assert!(seen.get("_id").is_none());
        assert!(seen.get("createdBy").is_none());
        assert_eq!(seen["message"], "Library hours extended");

        let admin_view = kit.workflow.get_news(&chief, id).await.unwrap();
        assert_eq!(admin_view["_id"], id.to_string());
    }

    #[tokio::test]
    async fn only_super_admins_post_news() {
        let kit = Kit::new();
        let student = kit.student(STUDENT).await;
        let staff = kit.admin().await;

        for who in [&student, &staff] {
            let err = kit.workflow.add_news(who, draft("hello")).await.unwrap_err();
            assert!(matches!(err, WorkflowError::Forbidden(_)));
        }

        let err = kit
            .workflow
            .add_news(&super_admin("admin01"), draft("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn own_posts_listing_skips_other_authors() {
        let kit = Kit::new();
        let me = super_admin("admin01");
        let other = super_admin("admin02");
        post(&kit, &me, "mine").await;
        post(&kit, &other, "theirs").await;

        let mine = kit.workflow.list_my_news(&me).await.unwrap();
        let mine = mine.as_array().unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0]["message"], "mine");
    }

    #[tokio::test]
    async fn editing_replaces_the_message() {
        let kit = Kit::new();
        let chief = super_admin("admin01");
        let id = post(&kit, &chief, "Fee deadline 10th").await;

        let updated = kit
            .workflow
            .update_news(&chief, id, draft("Fee deadline 12th"))
            .await
            .unwrap();
        assert_eq!(updated["message"], "Fee deadline 12th");

        let student = kit.student(STUDENT).await;
        let err = kit
            .workflow
            .update_news(&student, id, draft("hacked"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Forbidden(_)));
    }

    #[tokio::test]
    async fn deleting_missing_news_is_not_found() {
        let kit = Kit::new();
        let err = kit
            .workflow
            .delete_news(&super_admin("admin01"), NewsId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
    }

    #[tokio::test]
    async fn bulk_deletes_respect_authorship() {
        let kit = Kit::new();
        let me = super_admin("admin01");
        let other = super_admin("admin02");
        post(&kit, &me, "one").await;
        post(&kit, &me, "two").await;
        let kept = post(&kit, &other, "three").await;

        assert_eq!(kit.workflow.delete_my_news(&me).await.unwrap(), 2);
        assert!(kit.workflow.get_news(&me, kept).await.is_ok());

        let student = kit.student(STUDENT).await;
        assert!(matches!(
            kit.workflow.delete_all_news(&student).await,
            Err(WorkflowError::Forbidden(_))
        ));
        assert_eq!(kit.workflow.delete_all_news(&me).await.unwrap(), 1);
        assert!(matches!(
            kit.workflow.get_news(&me, kept).await,
            Err(WorkflowError::NotFound(_))
        ));
    }
}
