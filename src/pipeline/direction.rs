//! The seam between the generic session loop and a relay direction.

use crate::error::Result;
use crate::relay::connection::RelaySink;

/// One translation direction of the relay.
///
/// A session drives its direction through three stages: `ingest` buffers
/// inbound bytes and reports the jobs that became ready, `infer` runs the
/// collaborators for one job, and `emit` writes the result downstream.
/// Each session owns a fresh instance, so implementations keep all
/// per-session state (buffers, windows, gates) in `self`.
#[async_trait::async_trait]
pub trait Direction: Send {
    /// Work unit handed from buffering to inference.
    type Job: Send;
    /// What inference produced for the relay.
    type Output: Send;

    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Buffers inbound bytes and returns every job that is now ready.
    fn ingest(&mut self, data: &[u8]) -> Vec<Self::Job>;

    /// Whether bytes are buffered towards a job that is not ready yet.
    fn has_pending(&self) -> bool;

    /// Runs inference for one job. `None` means nothing to send.
    ///
    /// Collaborators block, so implementations run them on the blocking
    /// pool and the runtime keeps serving timers and shutdown meanwhile.
    async fn infer(&mut self, job: Self::Job) -> Result<Option<Self::Output>>;

    /// Writes one output to the relay.
    async fn emit(&mut self, output: Self::Output, relay: &mut dyn RelaySink) -> Result<()>;
}
