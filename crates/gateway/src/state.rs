//! Shared gateway state handed to every method handler.

use std::sync::Arc;

use openclaw_config::OpenclawConfig;
use openclaw_cron::{
    crontab_io::SystemCrontab, history::SystemLogSource, isolated::subprocess_turn_runner,
    service::CronScheduler,
};

use crate::{
    cron::LiveCronService,
    scheduler::SystemSchedulerService,
    services::{CronService, SchedulerService},
};

pub struct Services {
    pub cron: Arc<dyn CronService>,
    pub scheduler: Arc<dyn SchedulerService>,
}

pub struct GatewayState {
    pub services: Services,
}

impl GatewayState {
    pub fn new(services: Services) -> Arc<Self> {
        Arc::new(Self { services })
    }

    /// Production wiring: the real crontab, the system log, and the
    /// subprocess turn runner.
    pub fn live(cfg: OpenclawConfig) -> openclaw_cron::Result<Arc<Self>> {
        let isolated = subprocess_turn_runner(&cfg);
        let scheduler = Arc::new(CronScheduler::new(
            cfg,
            Arc::new(SystemCrontab),
            Arc::new(SystemLogSource),
            isolated,
        )?);
        Ok(Self::new(Services {
            cron: Arc::new(LiveCronService::new(scheduler)),
            scheduler: Arc::new(SystemSchedulerService),
        }))
    }
}
