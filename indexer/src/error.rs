/// Why a site's indexing job ended in FAILED.
#[derive(Debug, thiserror::Error)]
pub enum IndexingError {
    #[error("indexing stopped")]
    Stopped,
    #[error("no lemmas available")]
    NoLemmas,
    #[error("storage failure: {0}")]
    Store(#[from] anyhow::Error),
    #[error("indexing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_stable() {
        assert_eq!(IndexingError::Stopped.to_string(), "indexing stopped");
        assert_eq!(IndexingError::NoLemmas.to_string(), "no lemmas available");
        let err: IndexingError = anyhow::anyhow!("disk full").into();
        assert_eq!(err.to_string(), "storage failure: disk full");
    }
}
