//! Serial and concurrent execution of per-unit chain fetches.
//!
//! Every fetch phase (block logs, block headers, token metadata) is a set of
//! independent units. A [`UnitFetch`] says how to fetch one unit with a given
//! reader. The two strategies below run a whole set:
//!
//! * [`fetch_serial`] uses one connection, sleeps the throttle delay before
//!   each call and processes units in the given order.
//! * [`fetch_concurrent`] submits one task per unit to a [`WorkPool`]. Each
//!   task opens its own connection and sends its result, success or failure,
//!   to a completion channel sized to the unit count. The caller drains
//!   exactly that many results; a unit whose task died without reporting is
//!   recorded as failed.
//!
//! Both strategies are best effort: a unit that fails is logged, recorded in
//! the [`FetchReport`] and contributes nothing. There are no retries.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use tokengraph_core::{
    ChainConnector, ChainError, ChainReader, FetchOutcome, FetchReport, PipelineError, Task,
    WorkPool,
};

/// How to fetch one unit of a phase.
#[async_trait]
pub trait UnitFetch: Send + Sync + 'static {
    type Unit: Clone + Debug + Send + Sync + 'static;
    type Output: Send + 'static;

    /// Phase name for logs and reports.
    fn phase(&self) -> &'static str;

    async fn fetch(&self, reader: &dyn ChainReader, unit: &Self::Unit) -> Result<Self::Output, ChainError>;
}

/// Position of the unit in the submitted list, and its result.
type Completion<F> = (usize, Result<<F as UnitFetch>::Output, ChainError>);

struct FetchTask<F: UnitFetch> {
    fetcher: Arc<F>,
    connector: Arc<dyn ChainConnector>,
    index: usize,
    unit: F::Unit,
    done: mpsc::Sender<Completion<F>>,
}

#[async_trait]
impl<F: UnitFetch> Task for FetchTask<F> {
    async fn run(self) {
        let result = match self.connector.connect() {
            Ok(reader) => self.fetcher.fetch(reader.as_ref(), &self.unit).await,
            Err(e) => Err(e),
        };
        // Capacity equals the unit count, so this never waits.
        if self.done.send((self.index, result)).await.is_err() {
            tracing::debug!(phase = self.fetcher.phase(), "completion channel closed");
        }
    }
}

fn record<F: UnitFetch>(
    fetcher: &F,
    report: &mut FetchReport<F::Unit>,
    values: &mut Vec<(F::Unit, F::Output)>,
    unit: F::Unit,
    result: Result<F::Output, ChainError>,
) {
    match result {
        Ok(output) => {
            report.record_success();
            values.push((unit, output));
        }
        Err(e) => {
            tracing::warn!(phase = fetcher.phase(), unit = ?unit, error = %e, "fetch failed, dropping unit");
            report.record_failure(unit, e);
        }
    }
}

/// Fetch `units` one after another over a single connection.
///
/// Fails only if the connection cannot be opened.
pub async fn fetch_serial<F: UnitFetch>(
    fetcher: &F,
    connector: &dyn ChainConnector,
    units: Vec<F::Unit>,
    throttle: Duration,
) -> Result<FetchOutcome<Vec<(F::Unit, F::Output)>, F::Unit>, PipelineError> {
    let reader = connector.connect()?;
    let mut report = FetchReport::new(fetcher.phase());
    let mut values = Vec::with_capacity(units.len());

    tracing::debug!(phase = fetcher.phase(), units = units.len(), throttle_ms = throttle.as_millis() as u64, "serial fetch");
    for unit in units {
        tokio::time::sleep(throttle).await;
        let result = fetcher.fetch(reader.as_ref(), &unit).await;
        record(fetcher, &mut report, &mut values, unit, result);
    }

    Ok(FetchOutcome { value: values, report })
}

/// Fetch `units` on a pool of at most `max_workers` workers, one connection
/// per unit.
pub async fn fetch_concurrent<F: UnitFetch>(
    fetcher: Arc<F>,
    connector: Arc<dyn ChainConnector>,
    units: Vec<F::Unit>,
    max_workers: usize,
) -> Result<FetchOutcome<Vec<(F::Unit, F::Output)>, F::Unit>, PipelineError> {
    let mut report = FetchReport::new(fetcher.phase());
    let expected = units.len();
    if expected == 0 {
        return Ok(FetchOutcome { value: Vec::new(), report });
    }

    let (done, mut completions) = mpsc::channel::<Completion<F>>(expected);
    let pool = WorkPool::for_tasks(max_workers, expected);
    tracing::debug!(phase = fetcher.phase(), units = expected, workers = pool.size(), "concurrent fetch");

    let mut pending: Vec<Option<F::Unit>> = Vec::with_capacity(expected);
    for (index, unit) in units.into_iter().enumerate() {
        pending.push(Some(unit.clone()));
        pool.submit(FetchTask {
            fetcher: Arc::clone(&fetcher),
            connector: Arc::clone(&connector),
            index,
            unit,
            done: done.clone(),
        })
        .await?;
    }
    drop(done);

    let mut values = Vec::with_capacity(expected);
    for _ in 0..expected {
        // `None` once every task has finished or died, reported or not.
        let Some((index, result)) = completions.recv().await else {
            break;
        };
        match pending.get_mut(index).and_then(Option::take) {
            Some(unit) => record(fetcher.as_ref(), &mut report, &mut values, unit, result),
            None => tracing::error!(phase = fetcher.phase(), index, "unexpected completion"),
        }
    }
    pool.shutdown().await;

    for unit in pending.into_iter().flatten() {
        tracing::error!(phase = fetcher.phase(), unit = ?unit, "task ended without reporting");
        report.record_failure(unit, "task ended without reporting");
    }

    Ok(FetchOutcome { value: values, report })
}
