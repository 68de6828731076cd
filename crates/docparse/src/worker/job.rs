use crate::store::FileStatus;

/// A unit of work: run one file to a terminal state.
#[derive(Debug, Clone)]
pub struct Job {
    pub file_id: String,
    /// Whether this is an explicit retry of a failed file.
    pub retry: bool,
}

impl Job {
    pub fn process(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            retry: false,
        }
    }

    pub fn retry(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            retry: true,
        }
    }
}

/// Outcome of a job. `status` is the terminal file status when the run
/// happened; `error` carries rejections (unknown id, invalid state) that
/// never reached the state machine.
#[derive(Debug)]
pub struct JobResult {
    pub file_id: String,
    pub status: Option<FileStatus>,
    pub error: Option<String>,
}

impl JobResult {
    pub fn finished(job: &Job, status: FileStatus) -> Self {
        Self {
            file_id: job.file_id.clone(),
            status: Some(status),
            error: None,
        }
    }

    pub fn rejected(job: &Job, error: String) -> Self {
        Self {
            file_id: job.file_id.clone(),
            status: None,
            error: Some(error),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == Some(FileStatus::Completed)
    }
}
