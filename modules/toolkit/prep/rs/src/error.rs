use crate::split::Split;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures that callers may want to tell apart. They are raised inside [eyre::Report]s and can be
/// recovered with `report.downcast_ref::<PrepError>()`.
#[derive(Debug, thiserror::Error)]
pub enum PrepError {
    #[error("invalid region {region}: {reason}")]
    InvalidRegion { region: String, reason: String },

    #[error("insufficient contig: {0}")]
    InsufficientContig(String),

    #[error("split infeasible: {0}")]
    SplitInfeasible(String),

    #[error("failed to bin track {track}")]
    TrackRead {
        track: String,
        #[source]
        source: BoxedError,
    },

    #[error("failed to write the {split} shard with windows [{start}, {end})")]
    ShardWrite {
        split: Split,
        start: usize,
        end: usize,
        #[source]
        source: BoxedError,
    },
}
