use std::time::Duration;

use backon::{BlockingRetryable, ExponentialBuilder};
use chrono::Local;
use log::{error, info, warn};
use snafu::{ResultExt, Snafu};

use crate::{
    config::{models::Watch, schedule::ScheduleError},
    mqtt_client::{
        models::PrinterEndpoint,
        session::{SessionError, SessionOutcome, StatusSession},
        transport::Connector,
    },
    status::models::ClassifiedStatus,
};

/// Polls forever on the configured schedule, handing each result to `show`.
///
/// Unresolved polls are retried with backoff before they are shown as
/// `Unknown`. Only contract violations and schedule errors end the loop.
pub fn watch<C: Connector>(
    session: &StatusSession<C>,
    endpoint: &PrinterEndpoint,
    timeout: Duration,
    settings: &Watch,
    mut show: impl FnMut(ClassifiedStatus),
) -> Result<(), WatchError> {
    loop {
        show(poll_with_retry(session, endpoint, timeout, settings.retries)?);

        let wait = settings.schedule.get_duration_till_next_occurrence().context(ScheduleSnafu)?;
        info!("Next poll at {}", (Local::now() + wait).format("%H:%M:%S"));
        std::thread::sleep(wait);
    }
}

pub fn poll_with_retry<C: Connector>(
    session: &StatusSession<C>,
    endpoint: &PrinterEndpoint,
    timeout: Duration,
    retries: usize,
) -> Result<ClassifiedStatus, WatchError> {
    let result = (|| poll_once(session, endpoint, timeout))
        .retry(ExponentialBuilder::default().with_factor(4.0).with_max_times(retries))
        .when(WatchError::is_unresolved)
        .notify(|err, delay| warn!("{err}, retrying in {delay:?}"))
        .call();

    match result {
        Ok(status) => Ok(status),
        Err(WatchError::Unresolved { outcome }) => {
            error!("Giving up on this poll: {outcome:?}");
            Ok(ClassifiedStatus::Unknown)
        }
        Err(e) => Err(e),
    }
}

fn poll_once<C: Connector>(session: &StatusSession<C>, endpoint: &PrinterEndpoint, timeout: Duration) -> Result<ClassifiedStatus, WatchError> {
    match session.fetch_outcome(endpoint, timeout).context(SessionSnafu)? {
        SessionOutcome::Classified { status, .. } => Ok(status),
        outcome => UnresolvedSnafu { outcome }.fail(),
    }
}

// ////// //
// Errors //
// ////// //

#[derive(Debug, Snafu)]
pub enum WatchError {
    #[snafu(display("Poll did not produce a report"))]
    Unresolved { outcome: SessionOutcome },

    #[snafu(display("Status session rejected the request"))]
    Session { source: SessionError },

    #[snafu(display("Could not schedule the next poll"))]
    Schedule { source: ScheduleError },
}

impl WatchError {
    fn is_unresolved(&self) -> bool {
        matches!(self, WatchError::Unresolved { .. })
    }
}
