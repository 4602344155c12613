//! Infrastructure layer: persistence, mail, configuration and the workflow
//! services that tie the domain crates to them.

pub mod config;
pub mod effects;
pub mod locks;
pub mod mail;
pub mod seed;
pub mod store;
pub mod users;
pub mod workflow;

pub use config::Settings;
pub use effects::{PostCommit, SideEffect};
pub use locks::CartLocks;
pub use mail::{InMemoryMailer, LogMailer, MailError, MailTemplates, Mailer, OutgoingMail};
pub use seed::Seed;
pub use store::{Document, InMemoryRepository, Persistence, Repository, StoreError};
pub use users::UserRecord;
pub use workflow::{Workflow, WorkflowError, WorkflowResult};
