use time::Date;

/// Progress report sent from a rendering worker to whoever drives it
#[derive(Debug, Clone)]
pub struct WorkerStatus {
    pub progress: f32,
    pub day: Date,
    pub worker_id: usize,
    pub outcome: DayOutcome,
}

/// What happened to the most recently finished day
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DayOutcome {
    #[default]
    InProgress,
    Rendered,
    NoData,
}

impl WorkerStatus {
    pub fn new(progress: f32, day: Date, worker_id: usize, outcome: DayOutcome) -> Self {
        Self {
            progress,
            day,
            worker_id,
            outcome,
        }
    }
}
