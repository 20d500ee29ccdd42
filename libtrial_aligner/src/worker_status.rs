/// What a worker is busy with, shown as the bar color in the CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WorkerStage {
    #[default]
    Waiting,
    Aligning,
    Done,
    Failed,
}

#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub block_idx: usize,
    pub worker_id: usize,
    pub stage: WorkerStage,
}

impl WorkerStatus {
    pub fn new(progress: f32, block_idx: usize, worker_id: usize, stage: WorkerStage) -> Self {
        Self {
            progress,
            block_idx,
            worker_id,
            stage,
        }
    }
}
