use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use super::NotificationService;

/// Start the cron job that purges old sent/failed notifications.
pub async fn start_maintenance_service(
    service: NotificationService,
    schedule: &str,
) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(schedule, move |_uuid, _l| {
        let service = service.clone();

        Box::pin(async move {
            if let Err(e) = service.purge(None).await {
                error!("Error purging notifications: {:?}", e);
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;

    info!("Notification maintenance scheduled ({})", schedule);
    Ok(scheduler)
}
