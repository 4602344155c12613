use std::sync::Arc;

use anyhow::Context;

use campusdesk_infra::{LogMailer, Persistence, Settings, Workflow};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    campusdesk_observability::init();

    let settings = Settings::from_env()?;
    let persistence = Persistence::in_memory();
    if let Some(seed) = settings.load_seed()? {
        seed.load_into(&persistence).await?;
    }

    let workflow = Workflow::new(
        persistence,
        settings.load_policy()?,
        Arc::new(LogMailer::new(settings.mail_from.clone())),
        settings.load_mail_templates()?,
    )
    .with_news_window(settings.news_expiry_days);
    let app = campusdesk_api::app::build_app(
        workflow,
        settings.jwt_secret.as_bytes(),
        settings.jwt_issuer.clone(),
    );

    let listener = tokio::net::TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
