use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tasklane_app::MaintenanceTrigger;
use tasklane_core::Clock;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::App;
use crate::view;

/// Run the maintenance scheduler in the foreground until Ctrl-C.
///
/// A `SIGCONT` (the shell resuming a suspended job) counts as the user coming
/// back and triggers a run. Every change of the task list prints a summary.
pub async fn run<C>(app: &App<C>) -> Result<()>
where
    C: Clock + Clone + 'static,
{
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl-C");
        }
    };
    run_until(app, ctrl_c).await
}

async fn run_until<C, F>(app: &App<C>, stop: F) -> Result<()>
where
    C: Clock + Clone + 'static,
    F: Future<Output = ()> + Send,
{
    let (triggers, trigger_rx) = mpsc::channel(8);
    let (shutdown, shutdown_rx) = watch::channel(false);
    let mut changes = app.list().subscribe();
    let mut foreground = Foreground::listen()?;
    let mut handle = Arc::clone(&app.scheduler).spawn(trigger_rx, shutdown_rx);
    info!(
        interval_secs = app.scheduler.config().interval.as_secs(),
        "watching tasks, press Ctrl-C to stop"
    );

    tokio::pin!(stop);
    let stopped_early = loop {
        tokio::select! {
            () = &mut stop => break None,
            joined = &mut handle => break Some(joined),
            () = foreground.resumed() => {
                if triggers.send(MaintenanceTrigger::Foreground).await.is_err() {
                    break None;
                }
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break None;
                }
                let snapshot = app.list().snapshot();
                let now = app.clock().now();
                println!("{}", view::render_summary(&snapshot.tasks, now, app.clock()));
            }
        }
    };

    if shutdown.send(true).is_err() {
        debug!("maintenance scheduler already gone");
    }
    drop(triggers);
    match stopped_early {
        Some(joined) => {
            joined.context("maintenance scheduler failed")?;
            bail!("maintenance scheduler stopped unexpectedly");
        }
        None => handle.await.context("maintenance scheduler stopped abnormally")?,
    }
    info!("stopped watching");
    Ok(())
}

#[cfg(any(target_os = "linux", target_os = "android"))]
const SIGCONT: i32 = 18;
#[cfg(all(unix, not(any(target_os = "linux", target_os = "android"))))]
const SIGCONT: i32 = 19;

#[cfg(unix)]
struct Foreground(tokio::signal::unix::Signal);

#[cfg(unix)]
impl Foreground {
    fn listen() -> Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        signal(SignalKind::from_raw(SIGCONT))
            .map(Self)
            .context("failed to listen for SIGCONT")
    }

    async fn resumed(&mut self) {
        if self.0.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
struct Foreground;

#[cfg(not(unix))]
impl Foreground {
    #[allow(clippy::unnecessary_wraps)]
    const fn listen() -> Result<Self> {
        Ok(Self)
    }

    async fn resumed(&mut self) {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used)]

    use super::*;
    use tasklane_app::AppConfig;
    use tasklane_core::{FixedClock, UserId, Zone};
    use tempfile::tempdir;
    use time::macros::{datetime, offset};
    use time::{OffsetDateTime, UtcOffset};

    fn signed_in_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.session.user = Some(UserId::new());
        config
    }

    #[tokio::test]
    async fn stop_shuts_the_scheduler_down() -> Result<()> {
        let dir = tempdir()?;
        let clock = Arc::new(FixedClock::new(datetime!(2024-05-01 8:00 UTC), offset!(UTC)));
        let app = App::open(dir.path(), &signed_in_config(), clock)?;
        run_until(&app, async {}).await
    }

    #[derive(Clone)]
    struct BrokenClock;

    impl Zone for BrokenClock {
        fn offset_at(&self, _instant: OffsetDateTime) -> UtcOffset {
            UtcOffset::UTC
        }
    }

    impl Clock for BrokenClock {
        fn now(&self) -> OffsetDateTime {
            panic!("clock unavailable")
        }
    }

    #[tokio::test]
    async fn scheduler_dying_ends_the_watch_with_an_error() -> Result<()> {
        let dir = tempdir()?;
        let app = App::open(dir.path(), &signed_in_config(), BrokenClock)?;
        let err = run_until(&app, std::future::pending()).await.unwrap_err();
        assert!(format!("{err:#}").contains("maintenance scheduler failed"));
        Ok(())
    }
}
