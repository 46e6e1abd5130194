use super::RunOutcome;
use crate::aggregate::{aggregate, Verdict};
use crate::camera::{BlueIrisClient, CameraProber, DirectProber, ManagedApiProber};
use crate::config::{ProbeStrategy, WatchdogConfig};
use crate::credentials::CredentialResolver;
use crate::error::{ProbeSessionError, Result, WatchdogError};
use crate::heartbeat::{plan_failure, plan_signals, HeartbeatNotifier, PlannedSignal, Signal};
use tracing::{error, info, warn};

/// Drives one pass of the pipeline: credentials, probing, aggregation, heartbeat
pub struct Watchdog {
    config: WatchdogConfig,
    credentials: CredentialResolver,
    notifier: HeartbeatNotifier,
}

impl Watchdog {
    pub fn new(config: WatchdogConfig, credentials: CredentialResolver) -> Result<Self> {
        let notifier = HeartbeatNotifier::new(&config.notify)?;

        Ok(Self {
            config,
            credentials,
            notifier,
        })
    }

    /// Run the configured probing strategy and report the result
    pub async fn run(&self) -> RunOutcome {
        info!("Checking cameras ({} strategy) ...", self.config.strategy_name());

        let mut prober = match self.build_prober() {
            Ok(prober) => prober,
            Err(e) => {
                error!("Cannot start probing: {}", e);
                let planned = plan_failure(&self.config.heartbeat, &e.to_string());
                return self.deliver(&[planned]).await;
            }
        };

        self.run_with(prober.as_mut()).await
    }

    /// Run with an explicit prober
    pub async fn run_with(&self, prober: &mut dyn CameraProber) -> RunOutcome {
        let outcome = prober.probe().await;
        let result = aggregate(&outcome);

        match result.verdict() {
            Verdict::Healthy => info!("All {} camera(s) are UP.", result.total),
            Verdict::CamerasDown { message } => warn!("{}", message),
            Verdict::ServiceDown { message } => error!("{}", message),
        }

        let plan = plan_signals(&self.config.heartbeat, &result);
        self.deliver(&plan).await
    }

    fn build_prober(&self) -> Result<Box<dyn CameraProber>> {
        match &self.config.strategy {
            ProbeStrategy::ManagedApi(managed) => {
                let password = self.credentials.require(&managed.credential)?;
                let client = BlueIrisClient::new(managed, password).map_err(|e| {
                    WatchdogError::Session(ProbeSessionError::Unreachable {
                        reason: e.to_string(),
                    })
                })?;
                Ok(Box::new(ManagedApiProber::new(client)))
            }
            ProbeStrategy::DirectProbe(direct) => Ok(Box::new(DirectProber::new(direct))),
        }
    }

    async fn deliver(&self, plan: &[PlannedSignal]) -> RunOutcome {
        if let Err(e) = self.notifier.deliver(plan).await {
            return RunOutcome::NotifyFailed(e);
        }

        let failure = plan.iter().find_map(|planned| match &planned.signal {
            Signal::Failure { message } => Some(message.clone()),
            Signal::Success => None,
        });

        match failure {
            Some(message) => RunOutcome::Unhealthy { message },
            None => RunOutcome::Healthy,
        }
    }
}
