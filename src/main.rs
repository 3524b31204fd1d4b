// Courtbook - court booking background daemon
// Entry point and runtime wiring

use courtbook::config;
use courtbook::database::{create_pool, Repository};
use courtbook::mail::{LogMailer, Mailer, SmtpConfig, SmtpMailer};
use courtbook::services::{JobRunner, NotificationService, NotificationWorker, ReminderScheduler};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courtbook=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Courtbook daemon");

    let db_path =
        std::env::var("COURTBOOK_DB").unwrap_or_else(|_| config::DEFAULT_DB_PATH.to_string());
    tracing::info!("Database: {}", db_path);

    let pool = create_pool(Path::new(&db_path)).await?;
    let repo = Repository::new(pool);

    let mailer: Arc<dyn Mailer> = match SmtpConfig::from_env() {
        Some(smtp) => {
            tracing::info!("Email delivery via SMTP relay {}:{}", smtp.host, smtp.port);
            Arc::new(SmtpMailer::new(smtp))
        }
        None => {
            tracing::warn!("COURTBOOK_SMTP_HOST not set, emails will only be logged");
            Arc::new(LogMailer::new())
        }
    };

    let notifications = NotificationService::new(repo.clone(), mailer);

    let runner = JobRunner::new().await?;
    runner.start().await?;

    let reminders = ReminderScheduler::new(repo.clone(), notifications.clone(), runner.clone());
    let restored = reminders.schedule_existing().await?;
    tracing::info!("Restored {} reminder jobs for upcoming reservations", restored);
    reminders.schedule_daily_cleanup().await?;

    // Retention sweep for delivered and dead notifications
    let prune_target = notifications.clone();
    runner
        .schedule_cron(
            "daily_notification_prune",
            config::DAILY_MAINTENANCE_CRON,
            move || {
                let notifications = prune_target.clone();
                async move {
                    match notifications
                        .prune_old(config::NOTIFICATION_RETENTION_DAYS)
                        .await
                    {
                        Ok(pruned) if pruned > 0 => {
                            tracing::info!("Pruned {} old notifications", pruned)
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!("Notification prune failed: {}", e),
                    }
                }
            },
        )
        .await?;

    let worker = NotificationWorker::new(notifications).start();

    tracing::info!("Courtbook daemon running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down");
    worker.stop().await;
    runner.shutdown().await?;

    Ok(())
}
