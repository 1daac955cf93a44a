//! Asynchronous encoder pool.
//!
//! A fixed set of worker threads, each owning an [`EncoderSession`], pulls
//! jobs from a bounded FIFO queue and pushes finished [`SampleBuffer`]s onto a
//! completion queue. Completion order follows whichever worker finishes first;
//! use [`SampleBuffer::frame_number`] to restore input order.
//!
//! Lifecycle: `Created → Prepared → Started → Stopped → Released`. A stopped
//! pool can be started again. Jobs still queued when [`EncoderPool::stop`] is
//! called are discarded; jobs already running finish and remain collectable.

use crate::encoder::{EncodeParams, EncoderConfig, EncoderSession};
use crate::sample::{BufferPool, SampleBuffer};
use crate::transform::Transform;
use bytes::Bytes;
use cfhd_core::{
    AllocatorRef, EncodedFormat, EncodingFlags, Error, PixelFormat, Quality, Result,
    ThumbnailFlags,
};
use cfhd_metadata::{
    GlobalMetadata, MetadataEntry, MetadataStore, MetadataUpdate, SharedMetadataStore,
};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

/// Upper bound on worker threads per pool.
pub const MAX_WORKERS: usize = 64;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// What [`EncoderPool::submit`] does when the job queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SubmitPolicy {
    /// Wait for a worker to take a job.
    #[default]
    Block,
    /// Return [`Error::PoolFull`] immediately.
    Fail,
}

/// Encoder pool configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncoderPoolConfig {
    /// Worker threads, fixed for the pool's life.
    pub worker_count: usize,
    /// Jobs that may wait in the queue.
    pub queue_capacity: usize,
    pub submit_policy: SubmitPolicy,
    /// Attach a thumbnail of this kind to every sample.
    pub thumbnails: Option<ThumbnailFlags>,
    /// Released sample buffers kept for reuse.
    pub max_recycled_buffers: usize,
    /// Stack size for worker threads; `None` uses the platform default.
    pub worker_stack_size: Option<usize>,
}

impl Default for EncoderPoolConfig {
    fn default() -> Self {
        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(8);
        Self::with_workers(workers)
    }
}

impl EncoderPoolConfig {
    /// Config with `worker_count` workers and a queue twice that size.
    pub fn with_workers(worker_count: usize) -> Self {
        EncoderPoolConfig {
            worker_count,
            queue_capacity: worker_count.max(1) * 2,
            submit_policy: SubmitPolicy::Block,
            thumbnails: None,
            max_recycled_buffers: 16,
            worker_stack_size: None,
        }
    }
}

/// Lifecycle state of an [`EncoderPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolState {
    Created,
    Prepared,
    Started,
    Stopped,
    Released,
}

impl PoolState {
    pub fn name(&self) -> &'static str {
        match self {
            PoolState::Created => "created",
            PoolState::Prepared => "prepared",
            PoolState::Started => "started",
            PoolState::Stopped => "stopped",
            PoolState::Released => "released",
        }
    }
}

/// Snapshot of pool activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Jobs waiting for a worker.
    pub queued: usize,
    /// Jobs being encoded.
    pub in_flight: usize,
    /// Results waiting to be collected.
    pub completed: usize,
    /// Released buffers ready for reuse.
    pub recycled_buffers: usize,
    /// Sample buffers allocated so far.
    pub allocated_buffers: usize,
}

struct Job {
    frame_number: u64,
    frame: Bytes,
    pitch: isize,
    global: Arc<GlobalMetadata>,
    local: Vec<MetadataEntry>,
}

struct Completion {
    frame_number: u64,
    result: Result<SampleBuffer>,
}

impl Completion {
    fn into_result(self) -> Result<SampleBuffer> {
        let frame_number = self.frame_number;
        self.result.map_err(|source| Error::Encode {
            frame_number,
            source: Box::new(source),
        })
    }
}

#[derive(Default)]
struct Queues {
    jobs: VecDeque<Job>,
    completed: VecDeque<Completion>,
    in_flight: usize,
    stopping: bool,
}

struct Shared {
    queues: Mutex<Queues>,
    /// A job was queued or the pool is stopping.
    job_ready: Condvar,
    /// A queue slot was freed.
    job_space: Condvar,
    /// A result was pushed or the pool is stopping.
    sample_ready: Condvar,
    buffers: Mutex<BufferPool>,
    capacity: usize,
    thumbnails: Option<ThumbnailFlags>,
    pool_id: u64,
}

struct PoolMetadata {
    global: Arc<GlobalMetadata>,
    pending_local: Vec<MetadataEntry>,
}

/// Parallel encoder fed by a bounded job queue.
pub struct EncoderPool {
    config: EncoderPoolConfig,
    state: PoolState,
    shared: Arc<Shared>,
    idle: Mutex<Vec<EncoderSession>>,
    workers: Vec<JoinHandle<Option<EncoderSession>>>,
    params: Option<EncodeParams>,
    metadata: Mutex<PoolMetadata>,
}

impl EncoderPool {
    /// Pool of `worker_count` workers using the system allocator.
    pub fn create<F>(worker_count: usize, queue_capacity: usize, factory: F) -> Result<Self>
    where
        F: FnMut() -> Box<dyn Transform>,
    {
        let config = EncoderPoolConfig {
            queue_capacity,
            ..EncoderPoolConfig::with_workers(worker_count)
        };
        Self::with_config(config, AllocatorRef::default(), factory)
    }

    /// Pool with a full configuration. `factory` builds one transform per worker.
    pub fn with_config<F>(config: EncoderPoolConfig, allocator: AllocatorRef, mut factory: F) -> Result<Self>
    where
        F: FnMut() -> Box<dyn Transform>,
    {
        if config.worker_count == 0 || config.worker_count > MAX_WORKERS {
            return Err(Error::invalid_arg(format!(
                "worker count {} outside 1..={}",
                config.worker_count, MAX_WORKERS
            )));
        }
        if config.queue_capacity == 0 {
            return Err(Error::invalid_arg("queue capacity must be non-zero"));
        }

        let sessions = (0..config.worker_count)
            .map(|_| EncoderSession::with_config(factory(), EncoderConfig::default(), allocator.clone()))
            .collect();
        let shared = Arc::new(Shared {
            queues: Mutex::new(Queues::default()),
            job_ready: Condvar::new(),
            job_space: Condvar::new(),
            sample_ready: Condvar::new(),
            buffers: Mutex::new(BufferPool::new(allocator, config.max_recycled_buffers)),
            capacity: config.queue_capacity,
            thumbnails: config.thumbnails,
            pool_id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
        });
        debug!(
            "Encoder pool created with {} workers and {} queue slots",
            config.worker_count, config.queue_capacity
        );

        Ok(EncoderPool {
            config,
            state: PoolState::Created,
            shared,
            idle: Mutex::new(sessions),
            workers: Vec::new(),
            params: None,
            metadata: Mutex::new(PoolMetadata {
                global: Arc::new(GlobalMetadata::default()),
                pending_local: Vec::new(),
            }),
        })
    }

    fn check_state(&self, allowed: &[PoolState], operation: &'static str) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(Error::InvalidState {
                operation,
                state: self.state.name(),
            })
        }
    }

    /// Prepare every worker identically. If any worker fails, none stays prepared.
    pub fn prepare(
        &mut self,
        width: u32,
        height: u32,
        input_format: PixelFormat,
        encoded_format: EncodedFormat,
        flags: EncodingFlags,
        quality: Quality,
    ) -> Result<()> {
        self.check_state(
            &[PoolState::Created, PoolState::Prepared, PoolState::Stopped],
            "prepare",
        )?;

        let sessions = self.idle.get_mut();
        let outcome = sessions.iter_mut().try_for_each(|session| {
            session.prepare(width, height, input_format, encoded_format, flags, quality)
        });
        if let Err(e) = outcome {
            for session in sessions.iter_mut() {
                session.unprepare();
            }
            self.params = None;
            self.state = PoolState::Created;
            return Err(e);
        }

        self.params = sessions.first().and_then(|s| s.params().copied());
        self.state = PoolState::Prepared;
        debug!("Encoder pool prepared: {}x{} {}", width, height, input_format);
        Ok(())
    }

    /// Snapshot pending changes from `store` for the jobs submitted next.
    pub fn attach_metadata(&self, store: &mut MetadataStore) -> Result<()> {
        self.check_state(
            &[PoolState::Created, PoolState::Prepared, PoolState::Started, PoolState::Stopped],
            "attach metadata",
        )?;
        if let Some(update) = store.take_changes() {
            self.apply_update(update);
        }
        Ok(())
    }

    /// Snapshot pending changes from a store shared with other encoders.
    pub fn attach_shared_metadata(&self, store: &SharedMetadataStore) -> Result<()> {
        self.check_state(
            &[PoolState::Created, PoolState::Prepared, PoolState::Started, PoolState::Stopped],
            "attach metadata",
        )?;
        if let Some(update) = store.take_changes() {
            self.apply_update(update);
        }
        Ok(())
    }

    fn apply_update(&self, update: MetadataUpdate) {
        let mut metadata = self.metadata.lock();
        metadata.global = Arc::new(update.global);
        overlay(&mut metadata.pending_local, update.local);
    }

    /// Spawn the worker threads.
    pub fn start(&mut self) -> Result<()> {
        self.check_state(&[PoolState::Prepared, PoolState::Stopped], "start")?;
        self.shared.queues.lock().stopping = false;

        let sessions = std::mem::take(self.idle.get_mut());
        self.state = PoolState::Started;
        let mut sessions = sessions.into_iter().enumerate();
        while let Some((index, session)) = sessions.next() {
            // The slot hands the session back when the thread never starts.
            let slot = Arc::new(Mutex::new(Some(session)));
            let handoff = Arc::clone(&slot);
            let shared = Arc::clone(&self.shared);
            let mut builder = thread::Builder::new().name(format!("cfhd-encoder-{}", index));
            if let Some(size) = self.config.worker_stack_size {
                builder = builder.stack_size(size);
            }
            let spawned = builder.spawn(move || {
                let session = handoff.lock().take();
                session.map(|session| worker_loop(session, shared))
            });
            match spawned {
                Ok(handle) => self.workers.push(handle),
                Err(e) => {
                    warn!("Failed to spawn encoder worker {}: {}", index, e);
                    let idle = self.idle.get_mut();
                    idle.extend(slot.lock().take());
                    idle.extend(sessions.map(|(_, session)| session));
                    let _ = self.stop();
                    return Err(Error::internal(format!("failed to spawn encoder worker: {}", e)));
                }
            }
        }
        info!("Encoder pool started with {} workers", self.workers.len());
        Ok(())
    }

    /// Queue a frame.
    ///
    /// `metadata` overrides local records attached since the last submit.
    /// When the queue is full the configured [`SubmitPolicy`] applies.
    pub fn submit(
        &self,
        frame_number: u64,
        frame: Bytes,
        pitch: isize,
        metadata: Option<Vec<MetadataEntry>>,
    ) -> Result<()> {
        self.check_state(&[PoolState::Started], "submit")?;
        let params = self
            .params
            .ok_or_else(|| Error::Unexpected("pool has no encode parameters".into()))?;
        params.check_frame(frame.len(), pitch)?;

        let shared = &self.shared;
        let mut queues = shared.queues.lock();
        loop {
            if queues.stopping {
                return Err(Error::PoolStopped);
            }
            if queues.jobs.len() < shared.capacity {
                break;
            }
            match self.config.submit_policy {
                SubmitPolicy::Fail => {
                    return Err(Error::PoolFull {
                        capacity: shared.capacity,
                    })
                }
                SubmitPolicy::Block => shared.job_space.wait(&mut queues),
            }
        }

        let (global, local) = {
            let mut snapshot = self.metadata.lock();
            let mut local = std::mem::take(&mut snapshot.pending_local);
            if let Some(overrides) = metadata {
                overlay(&mut local, overrides);
            }
            (Arc::clone(&snapshot.global), local)
        };
        queues.jobs.push_back(Job {
            frame_number,
            frame,
            pitch,
            global,
            local,
        });
        trace!("Submitted frame {}, {} queued", frame_number, queues.jobs.len());
        drop(queues);
        shared.job_ready.notify_one();
        Ok(())
    }

    /// Block until a sample completes.
    ///
    /// Fails with [`Error::PoolStopped`] when nothing is queued or running.
    /// A job that failed to encode surfaces as [`Error::Encode`].
    pub fn wait_for_sample(&self) -> Result<SampleBuffer> {
        self.check_state(&[PoolState::Started, PoolState::Stopped], "wait for sample")?;
        let mut queues = self.shared.queues.lock();
        loop {
            if let Some(completion) = queues.completed.pop_front() {
                drop(queues);
                return completion.into_result();
            }
            if queues.in_flight == 0 && (queues.jobs.is_empty() || queues.stopping) {
                return Err(Error::PoolStopped);
            }
            self.shared.sample_ready.wait(&mut queues);
        }
    }

    /// A completed sample, if one is ready.
    pub fn test_for_sample(&self) -> Result<Option<SampleBuffer>> {
        self.check_state(&[PoolState::Started, PoolState::Stopped], "test for sample")?;
        let completion = self.shared.queues.lock().completed.pop_front();
        completion.map(Completion::into_result).transpose()
    }

    /// Return a sample's storage for reuse.
    pub fn release_sample_buffer(&self, buffer: SampleBuffer) -> Result<()> {
        if buffer.pool_id() != self.shared.pool_id {
            return Err(Error::invalid_arg("sample buffer belongs to another pool"));
        }
        self.shared.buffers.lock().release(buffer.into_data());
        Ok(())
    }

    /// Stop the workers and join them. Queued jobs that have not started are discarded.
    pub fn stop(&mut self) -> Result<()> {
        if self.state == PoolState::Stopped {
            return Ok(());
        }
        self.check_state(&[PoolState::Started], "stop")?;

        let discarded = {
            let mut queues = self.shared.queues.lock();
            queues.stopping = true;
            let discarded = queues.jobs.len();
            queues.jobs.clear();
            discarded
        };
        if discarded > 0 {
            warn!("Discarded {} queued jobs at stop", discarded);
        }
        self.shared.job_ready.notify_all();
        self.shared.job_space.notify_all();
        self.shared.sample_ready.notify_all();

        let mut panicked = 0;
        let idle = self.idle.get_mut();
        for handle in self.workers.drain(..) {
            match handle.join() {
                Ok(session) => idle.extend(session),
                Err(_) => panicked += 1,
            }
        }
        self.state = PoolState::Stopped;
        info!("Encoder pool stopped, {} workers joined", idle.len());

        if panicked > 0 {
            return Err(Error::internal(format!("{} encoder workers panicked", panicked)));
        }
        Ok(())
    }

    /// Close every worker session and drop pooled buffers. Only valid when not started.
    pub fn release(&mut self) -> Result<()> {
        self.check_state(
            &[PoolState::Created, PoolState::Prepared, PoolState::Stopped],
            "release",
        )?;
        let mut first_error = None;
        for mut session in self.idle.get_mut().drain(..) {
            if let Err(e) = session.close() {
                first_error.get_or_insert(e);
            }
        }
        self.shared.queues.lock().completed.clear();
        self.shared.buffers.lock().clear();
        self.state = PoolState::Released;
        info!("Encoder pool released");
        first_error.map_or(Ok(()), Err)
    }

    pub fn state(&self) -> PoolState {
        self.state
    }

    pub fn config(&self) -> &EncoderPoolConfig {
        &self.config
    }

    pub fn worker_count(&self) -> usize {
        self.config.worker_count
    }

    pub fn params(&self) -> Option<&EncodeParams> {
        self.params.as_ref()
    }

    /// Jobs queued or running.
    pub fn pending(&self) -> usize {
        let queues = self.shared.queues.lock();
        queues.jobs.len() + queues.in_flight
    }

    pub fn stats(&self) -> PoolStats {
        let (queued, in_flight, completed) = {
            let queues = self.shared.queues.lock();
            (queues.jobs.len(), queues.in_flight, queues.completed.len())
        };
        let buffers = self.shared.buffers.lock();
        PoolStats {
            queued,
            in_flight,
            completed,
            recycled_buffers: buffers.available(),
            allocated_buffers: buffers.total_allocated(),
        }
    }
}

impl Drop for EncoderPool {
    fn drop(&mut self) {
        if self.state == PoolState::Started {
            if let Err(e) = self.stop() {
                warn!("Encoder pool stop failed during drop: {}", e);
            }
        }
        if self.state != PoolState::Released {
            if let Err(e) = self.release() {
                warn!("Encoder pool release failed during drop: {}", e);
            }
        }
    }
}

fn overlay(records: &mut Vec<MetadataEntry>, overrides: Vec<MetadataEntry>) {
    for entry in overrides {
        match records.iter_mut().find(|e| e.tag == entry.tag) {
            Some(existing) => *existing = entry,
            None => records.push(entry),
        }
    }
}

fn worker_loop(mut session: EncoderSession, shared: Arc<Shared>) -> EncoderSession {
    let mut applied: Option<Arc<GlobalMetadata>> = None;
    while let Some(job) = next_job(&shared) {
        let frame_number = job.frame_number;
        let result = run_job(&mut session, &shared, &mut applied, job);
        if let Err(e) = &result {
            debug!("Frame {} failed: {}", frame_number, e);
        }
        {
            let mut queues = shared.queues.lock();
            queues.in_flight -= 1;
            queues.completed.push_back(Completion {
                frame_number,
                result,
            });
        }
        shared.sample_ready.notify_all();
    }
    session
}

fn next_job(shared: &Shared) -> Option<Job> {
    let mut queues = shared.queues.lock();
    loop {
        if queues.stopping {
            return None;
        }
        if let Some(job) = queues.jobs.pop_front() {
            queues.in_flight += 1;
            shared.job_space.notify_one();
            return Some(job);
        }
        shared.job_ready.wait(&mut queues);
    }
}

fn run_job(
    session: &mut EncoderSession,
    shared: &Shared,
    applied: &mut Option<Arc<GlobalMetadata>>,
    job: Job,
) -> Result<SampleBuffer> {
    trace!("Encoding frame {}", job.frame_number);
    if !applied.as_ref().is_some_and(|g| Arc::ptr_eq(g, &job.global)) {
        session.set_global(Arc::clone(&job.global));
        *applied = Some(job.global);
    }
    session.add_local(job.local);
    session.encode_sample(&job.frame, job.pitch)?;

    let thumbnail = match shared.thumbnails {
        Some(flags) => Some(session.thumbnail(flags)?),
        None => None,
    };
    let sample = session.sample_data()?;
    let mut data = shared.buffers.lock().acquire(sample.len())?;
    data.extend_from_slice(sample);
    Ok(SampleBuffer::new(
        data,
        job.frame_number,
        thumbnail,
        shared.pool_id,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{DecodeRequest, EncodeRequest, PassthroughTransform, SampleHeader, Thumbnail};

    fn passthrough() -> Box<dyn Transform> {
        Box::new(PassthroughTransform)
    }

    fn prepared_pool(workers: usize, capacity: usize) -> EncoderPool {
        let mut pool = EncoderPool::create(workers, capacity, passthrough).unwrap();
        pool.prepare(
            4,
            2,
            PixelFormat::Bgra,
            EncodedFormat::Rgb444,
            EncodingFlags::empty(),
            Quality::High,
        )
        .unwrap();
        pool
    }

    #[test]
    fn test_config_validation() {
        assert!(matches!(
            EncoderPool::create(0, 4, passthrough),
            Err(Error::InvalidArgument(_))
        ));
        assert!(EncoderPool::create(MAX_WORKERS + 1, 4, passthrough).is_err());
        assert!(EncoderPool::create(2, 0, passthrough).is_err());
        let config = EncoderPoolConfig::default();
        assert!(config.worker_count >= 1);
        assert_eq!(config.submit_policy, SubmitPolicy::Block);
    }

    #[test]
    fn test_state_checks() {
        let mut pool = EncoderPool::create(1, 2, passthrough).unwrap();
        assert!(matches!(pool.start(), Err(Error::InvalidState { operation: "start", .. })));
        assert!(matches!(
            pool.submit(1, Bytes::from(vec![0u8; 32]), 16, None),
            Err(Error::InvalidState { .. })
        ));

        let mut pool = prepared_pool(1, 2);
        pool.start().unwrap();
        assert!(matches!(pool.release(), Err(Error::InvalidState { .. })));
        assert!(matches!(
            pool.prepare(4, 2, PixelFormat::Bgra, EncodedFormat::Rgb444, EncodingFlags::empty(), Quality::High),
            Err(Error::InvalidState { .. })
        ));
        pool.stop().unwrap();
        pool.stop().unwrap();
        pool.release().unwrap();
        assert_eq!(pool.state(), PoolState::Released);
        assert!(pool.start().is_err());
    }

    #[test]
    fn test_prepare_is_atomic() {
        let mut pool = prepared_pool(3, 2);
        let err = pool
            .prepare(4, 2, PixelFormat::Byr4, EncodedFormat::Rgb444, EncodingFlags::empty(), Quality::High)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
        assert_eq!(pool.state(), PoolState::Created);
        assert!(pool.params().is_none());
        assert!(pool.idle.lock().iter().all(|s| s.params().is_none()));
    }

    #[test]
    fn test_submit_validates_frame() {
        let mut pool = prepared_pool(1, 2);
        pool.start().unwrap();
        assert!(matches!(
            pool.submit(1, Bytes::from(vec![0u8; 8]), 16, None),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(pool.wait_for_sample(), Err(Error::PoolStopped)));
        pool.stop().unwrap();
    }

    #[test]
    fn test_encode_and_recycle() {
        let mut pool = prepared_pool(2, 4);
        pool.start().unwrap();
        pool.submit(5, Bytes::from(vec![3u8; 32]), 16, None).unwrap();

        let sample = pool.wait_for_sample().unwrap();
        assert_eq!(sample.frame_number(), 5);
        assert!(sample.data().ends_with(&[3u8; 32]));
        pool.release_sample_buffer(sample).unwrap();

        let stats = pool.stats();
        assert_eq!(stats.recycled_buffers, 1);
        assert_eq!(stats.allocated_buffers, 1);
        assert_eq!(pool.pending(), 0);
        assert!(pool.test_for_sample().unwrap().is_none());
        pool.stop().unwrap();
        pool.release().unwrap();
    }

    #[test]
    fn test_foreign_buffer_rejected() {
        let mut a = prepared_pool(1, 2);
        let b = prepared_pool(1, 2);
        a.start().unwrap();
        a.submit(1, Bytes::from(vec![0u8; 32]), 16, None).unwrap();
        let sample = a.wait_for_sample().unwrap();
        assert!(matches!(b.release_sample_buffer(sample), Err(Error::InvalidArgument(_))));
    }

    struct NoThumbnails;

    impl Transform for NoThumbnails {
        fn parse_header(&self, sample: &[u8]) -> Result<SampleHeader> {
            PassthroughTransform.parse_header(sample)
        }

        fn decode(&mut self, request: &DecodeRequest<'_>, output: &mut [u8]) -> Result<()> {
            PassthroughTransform.decode(request, output)
        }

        fn encode(&mut self, request: &EncodeRequest<'_>, output: &mut Vec<u8>) -> Result<()> {
            PassthroughTransform.encode(request, output)
        }

        fn extract_thumbnail(&self, _sample: &[u8], _flags: ThumbnailFlags) -> Result<Thumbnail> {
            Err(Error::bad_sample("no thumbnail"))
        }
    }

    #[test]
    fn test_thumbnail_failure_allocates_no_buffer() {
        let config = EncoderPoolConfig {
            thumbnails: Some(ThumbnailFlags::empty()),
            ..EncoderPoolConfig::with_workers(1)
        };
        let mut pool = EncoderPool::with_config(config, AllocatorRef::default(), || {
            Box::new(NoThumbnails) as Box<dyn Transform>
        })
        .unwrap();
        pool.prepare(4, 2, PixelFormat::Bgra, EncodedFormat::Rgb444, EncodingFlags::empty(), Quality::High)
            .unwrap();
        pool.start().unwrap();
        pool.submit(9, Bytes::from(vec![0u8; 32]), 16, None).unwrap();

        match pool.wait_for_sample() {
            Err(Error::Encode { frame_number, source }) => {
                assert_eq!(frame_number, 9);
                assert!(matches!(*source, Error::BadSample(_)));
            }
            other => panic!("unexpected result {:?}", other.map(|s| s.frame_number())),
        }
        assert_eq!(pool.stats().allocated_buffers, 0);
        pool.stop().unwrap();
    }

    #[test]
    fn test_failed_spawn_keeps_every_session() {
        let config = EncoderPoolConfig {
            // No address space can hold this stack, so every spawn fails.
            worker_stack_size: Some(1 << 62),
            ..EncoderPoolConfig::with_workers(3)
        };
        let mut pool = EncoderPool::with_config(config, AllocatorRef::default(), passthrough).unwrap();
        pool.prepare(4, 2, PixelFormat::Bgra, EncodedFormat::Rgb444, EncodingFlags::empty(), Quality::High)
            .unwrap();

        assert!(matches!(pool.start(), Err(Error::Internal(_))));
        assert_eq!(pool.state(), PoolState::Stopped);
        assert!(pool.workers.is_empty());
        assert_eq!(pool.idle.lock().len(), 3);
        assert!(pool.idle.lock().iter().all(|s| s.params().is_some()));

        pool.config.worker_stack_size = None;
        pool.start().unwrap();
        assert_eq!(pool.workers.len(), 3);
        pool.stop().unwrap();
        assert_eq!(pool.idle.lock().len(), 3);
        pool.release().unwrap();
    }

    #[test]
    fn test_drop_started_pool() {
        let mut pool = prepared_pool(2, 2);
        pool.start().unwrap();
        pool.submit(1, Bytes::from(vec![0u8; 32]), 16, None).unwrap();
        drop(pool);
    }
}
