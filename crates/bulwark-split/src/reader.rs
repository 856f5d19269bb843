//! Streaming reads over a split.
//!
//! A [`ResourceStreamReader`] walks the resources of one [`ResourceSplit`]
//! in order, reading each exactly once through its data client and
//! yielding the decoded records one at a time.
//!
//! ## State Machine
//!
//! ```text
//! Uninitialized ──initialize──► Streaming ──close / fatal read failure──► Closed
//!       │                                                                   ▲
//!       └──────────────────────────────close────────────────────────────────┘
//! ```
//!
//! `next_key_value` returns `Ok(false)` in every state except `Streaming`.

use std::collections::btree_map;
use std::fmt;

use tracing::{Instrument, Span, debug, warn};

use bulwark_core::observability::reader_span;
use bulwark_core::{
    ClientRegistry, ConnectionDetail, JobConfig, ReadRequest, ReaderFailureMode, Record,
    RecordIter, RecordSerializer, Resource, SerializerKind, SplitId,
};

use crate::error::{Error, Result};
use crate::metrics::SplitMetrics;
use crate::split::{InputSplit, ResourceSplit};

/// Everything a worker task provides to a reader.
#[derive(Debug, Clone)]
pub struct TaskContext {
    config: JobConfig,
    clients: ClientRegistry,
}

impl TaskContext {
    /// Creates a task context.
    #[must_use]
    pub const fn new(config: JobConfig, clients: ClientRegistry) -> Self {
        Self { config, clients }
    }

    /// The job configuration.
    #[must_use]
    pub const fn config(&self) -> &JobConfig {
        &self.config
    }

    /// The data clients available on this worker.
    #[must_use]
    pub const fn clients(&self) -> &ClientRegistry {
        &self.clients
    }
}

/// Lifecycle state of a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReaderState {
    /// Created, not yet bound to a split.
    #[default]
    Uninitialized,
    /// Bound to a split and yielding records.
    Streaming,
    /// Released. Terminal.
    Closed,
}

impl fmt::Display for ReaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Streaming => "streaming",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Counters for one reader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Records yielded.
    pub records_read: u64,
    /// Resources whose read succeeded.
    pub resources_opened: u64,
    /// Resources that failed to open or decode.
    pub resources_failed: u64,
}

struct Stream {
    split_id: SplitId,
    pending: btree_map::IntoIter<Resource, ConnectionDetail>,
    clients: ClientRegistry,
    serializer: SerializerKind,
    failure_mode: ReaderFailureMode,
    current: Option<(Resource, RecordIter)>,
    total: usize,
    finished: usize,
    span: Span,
}

async fn open(
    clients: &ClientRegistry,
    serializer: SerializerKind,
    split_id: SplitId,
    resource: &Resource,
    connection: &ConnectionDetail,
) -> bulwark_core::Result<RecordIter> {
    let client = connection.build_client(clients)?;
    let response = client
        .read(ReadRequest {
            resource: resource.clone(),
            split_id,
        })
        .await?;
    serializer.decode_records(response.data)
}

/// Reads the records of one split, resource by resource.
///
/// Records are observed in split resource order, and within a resource in
/// stream order. Empty resources are skipped transparently.
#[derive(Default)]
pub struct ResourceStreamReader {
    stream: Option<Stream>,
    state: ReaderState,
    value: Option<Record>,
    key: Option<Resource>,
    stats: ReaderStats,
    progress: f32,
    metrics: SplitMetrics,
}

impl fmt::Debug for ResourceStreamReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceStreamReader")
            .field("state", &self.state)
            .field("split_id", &self.stream.as_ref().map(|s| s.split_id))
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl ResourceStreamReader {
    /// Creates an uninitialized reader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the reader to a split.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidStateTransition`] unless the reader is uninitialized
    /// - [`Error::SplitType`] if `split` is not a [`ResourceSplit`]
    /// - [`Error::SplitEmpty`] if the split has no resources
    /// - a configuration error if the job's serializer or failure mode is
    ///   missing or invalid
    pub fn initialize(&mut self, split: &dyn InputSplit, ctx: &TaskContext) -> Result<()> {
        if self.state != ReaderState::Uninitialized {
            return Err(Error::InvalidStateTransition {
                from: self.state.to_string(),
                to: ReaderState::Streaming.to_string(),
            });
        }
        let split = split
            .as_any()
            .downcast_ref::<ResourceSplit>()
            .ok_or(Error::SplitType {
                expected: "ResourceSplit",
            })?;
        if split.resources().is_empty() {
            return Err(Error::SplitEmpty {
                split_id: split.id().to_string(),
            });
        }

        let serializer = ctx.config().serializer()?;
        let failure_mode = ctx.config().failure_mode()?;
        let total = split.resources().len();
        let span = reader_span(&split.id().to_string(), total);

        span.in_scope(|| {
            debug!(
                serializer = ?serializer,
                failure_mode = %failure_mode,
                "reader initialized"
            );
        });

        self.stream = Some(Stream {
            split_id: split.id(),
            pending: split.resources().clone().into_iter(),
            clients: ctx.clients().clone(),
            serializer,
            failure_mode,
            current: None,
            total,
            finished: 0,
            span,
        });
        self.state = ReaderState::Streaming;
        Ok(())
    }

    /// Advances to the next record.
    ///
    /// Returns `Ok(true)` when a record is available through
    /// [`current_value`](Self::current_value), and `Ok(false)` once the split
    /// is exhausted, or if the reader is not streaming.
    ///
    /// # Errors
    ///
    /// Under [`ReaderFailureMode::FailOnReadFailure`], returns
    /// [`Error::Execution`] wrapping the first read failure; the reader is
    /// closed afterwards.
    pub async fn next_key_value(&mut self) -> Result<bool> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(false);
        };

        loop {
            if let Some((resource, records)) = stream.current.as_mut() {
                match records.next() {
                    Some(Ok(record)) => {
                        self.key = Some(resource.clone());
                        self.value = Some(record);
                        self.stats.records_read += 1;
                        self.metrics.record_records_read(1);
                        return Ok(true);
                    }
                    Some(Err(e)) => {
                        let Some((resource, _)) = stream.current.take() else {
                            continue;
                        };
                        if let Err(e) = Self::on_read_failure(
                            stream,
                            &mut self.stats,
                            self.metrics,
                            &resource,
                            e,
                        ) {
                            self.shut_down(ReaderState::Closed);
                            return Err(e);
                        }
                    }
                    None => {
                        stream.current = None;
                        stream.finished += 1;
                    }
                }
                continue;
            }

            let Some((resource, connection)) = stream.pending.next() else {
                self.key = None;
                self.value = None;
                return Ok(false);
            };

            let opened = open(
                &stream.clients,
                stream.serializer,
                stream.split_id,
                &resource,
                &connection,
            )
            .instrument(stream.span.clone())
            .await;
            match opened {
                Ok(records) => {
                    debug!(split_id = %stream.split_id, resource = %resource, "resource opened");
                    self.stats.resources_opened += 1;
                    stream.current = Some((resource, records));
                }
                Err(e) => {
                    if let Err(e) =
                        Self::on_read_failure(stream, &mut self.stats, self.metrics, &resource, e)
                    {
                        self.shut_down(ReaderState::Closed);
                        return Err(e);
                    }
                }
            }
        }
    }

    fn on_read_failure(
        stream: &mut Stream,
        stats: &mut ReaderStats,
        metrics: SplitMetrics,
        resource: &Resource,
        cause: bulwark_core::Error,
    ) -> Result<()> {
        stats.resources_failed += 1;
        metrics.record_failed_resource(stream.failure_mode.as_str());
        match stream.failure_mode {
            ReaderFailureMode::ContinueOnReadFailure => {
                warn!(
                    split_id = %stream.split_id,
                    resource = %resource,
                    error = %cause,
                    "failed to read resource, skipping it"
                );
                stream.finished += 1;
                Ok(())
            }
            ReaderFailureMode::FailOnReadFailure => Err(Error::execution(
                format!(
                    "failed to read resource {resource} of split {}",
                    stream.split_id
                ),
                cause,
            )),
        }
    }

    /// The record produced by the last successful
    /// [`next_key_value`](Self::next_key_value).
    #[must_use]
    pub const fn current_value(&self) -> Option<&Record> {
        self.value.as_ref()
    }

    /// The resource the current record came from.
    #[must_use]
    pub const fn current_key(&self) -> Option<&Resource> {
        self.key.as_ref()
    }

    /// Fraction of the split's resources finished, in `[0.0, 1.0]`.
    ///
    /// A resource counts as finished once exhausted or skipped.
    #[must_use]
    pub fn progress(&self) -> f32 {
        match &self.stream {
            Some(stream) => ratio(stream.finished, stream.total),
            None => self.progress,
        }
    }

    /// Releases the split and all open streams. Idempotent.
    pub fn close(&mut self) {
        if self.state != ReaderState::Closed {
            debug!(stats = ?self.stats, "reader closed");
        }
        self.shut_down(ReaderState::Closed);
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ReaderState {
        self.state
    }

    /// Counters accumulated so far.
    #[must_use]
    pub const fn stats(&self) -> ReaderStats {
        self.stats
    }

    fn shut_down(&mut self, state: ReaderState) {
        if let Some(stream) = self.stream.take() {
            self.progress = ratio(stream.finished, stream.total);
        }
        self.key = None;
        self.value = None;
        self.state = state;
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(finished: usize, total: usize) -> f32 {
    if total == 0 {
        0.0
    } else {
        finished as f32 / total as f32
    }
}
