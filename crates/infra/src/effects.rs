//! Post-commit side effects.
//!
//! Workflow steps collect notifications and mail here while they decide and
//! write; [`PostCommit::run`] executes them only after the authoritative
//! writes succeeded, in the order they were queued.

use campusdesk_orders::Notification;

use crate::mail::{MailTemplates, Mailer, TemplateKey};
use crate::store::Persistence;
use crate::workflow::WorkflowError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    Notify(Notification),
    Mail {
        to: String,
        template: TemplateKey,
        tags: Vec<(&'static str, String)>,
    },
}

#[derive(Debug, Default)]
#[must_use = "queued side effects do nothing until run"]
pub struct PostCommit {
    tasks: Vec<SideEffect>,
}

impl PostCommit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&mut self, notification: Notification) {
        self.tasks.push(SideEffect::Notify(notification));
    }

    pub fn mail(
        &mut self,
        to: impl Into<String>,
        template: TemplateKey,
        tags: Vec<(&'static str, String)>,
    ) {
        self.tasks.push(SideEffect::Mail {
            to: to.into(),
            template,
            tags,
        });
    }

    pub fn tasks(&self) -> &[SideEffect] {
        &self.tasks
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run every queued effect. Stops at the first failure.
    pub async fn run(
        self,
        persistence: &Persistence,
        mailer: &dyn Mailer,
        templates: &MailTemplates,
    ) -> Result<(), WorkflowError> {
        for task in self.tasks {
            match task {
                SideEffect::Notify(notification) => {
                    persistence.notifications.create(notification).await?;
                }
                SideEffect::Mail { to, template, tags } => {
                    let mail = templates.render(template, to, &tags)?;
                    tracing::debug!(template = template.as_str(), to = %mail.to, "sending mail");
                    mailer.send(mail).await?;
                }
            }
        }
        Ok(())
    }
}
