//! Ingestion engine: every configured listener feeding one voxel buffer

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;
use voxmap_core::{DisplayConfig, RoutingTable, VoxelBuffer};

use crate::error::Result;
use crate::listener::{ListenerStats, ListenerWorker, WorkerState};

/// Running set of listener workers
pub struct IngestEngine {
    buffer: Arc<VoxelBuffer>,
    routing: RoutingTable,
    running: Arc<AtomicBool>,
    workers: Vec<ListenerWorker>,
}

impl IngestEngine {
    /// Validate `config`, allocate the voxel buffer and start one worker per listener.
    pub fn start(config: &DisplayConfig) -> Result<Self> {
        config.validate()?;
        let buffer = Arc::new(VoxelBuffer::new(config.total_voxels()));
        Self::start_with_buffer(config, buffer)
    }

    /// Like [`IngestEngine::start`] but writes into a caller-supplied buffer,
    /// e.g. one with a different color corrector.
    pub fn start_with_buffer(config: &DisplayConfig, buffer: Arc<VoxelBuffer>) -> Result<Self> {
        let routing = RoutingTable::build(config)?;
        if buffer.len() < routing.total_voxels() {
            tracing::warn!(
                "Voxel buffer holds {} voxels, configuration needs {}",
                buffer.len(),
                routing.total_voxels()
            );
        }

        let mut engine = Self {
            buffer,
            routing,
            running: Arc::new(AtomicBool::new(true)),
            workers: Vec::new(),
        };

        // A bind failure drops `engine`, which stops the workers started so far
        for routes in engine.routing.listeners() {
            let worker =
                ListenerWorker::spawn(routes.clone(), engine.buffer.clone(), engine.running.clone())?;
            engine.workers.push(worker);
        }

        info!(
            "Ingestion started: {} cubes, {} listeners, {} voxels",
            config.cubes.len(),
            engine.workers.len(),
            engine.buffer.len()
        );

        Ok(engine)
    }

    pub fn buffer(&self) -> &Arc<VoxelBuffer> {
        &self.buffer
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    pub fn workers(&self) -> &[ListenerWorker] {
        &self.workers
    }

    pub fn stats(&self) -> Vec<ListenerStats> {
        self.workers.iter().map(ListenerWorker::stats).collect()
    }

    pub fn states(&self) -> Vec<WorkerState> {
        self.workers.iter().map(ListenerWorker::state).collect()
    }

    /// Sum of all listeners' counters
    pub fn total_stats(&self) -> ListenerStats {
        self.stats()
            .into_iter()
            .fold(ListenerStats::default(), |mut total, s| {
                total.packets += s.packets;
                total.dmx_packets += s.dmx_packets;
                total.malformed += s.malformed;
                total.unroutable += s.unroutable;
                total.sync_packets += s.sync_packets;
                total.oversized += s.oversized;
                total.pixels_written += s.pixels_written;
                total
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// No listener is receiving any more
    pub fn all_stopped(&self) -> bool {
        self.workers.iter().all(|w| !w.state().is_running())
    }

    /// Ask every worker to exit and wait for all of them.
    pub fn stop(&mut self) {
        if self.running.swap(false, Ordering::Relaxed) {
            info!("Stopping {} Art-Net listeners", self.workers.len());
        }
        for worker in &mut self.workers {
            worker.join();
        }
    }
}

impl Drop for IngestEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
