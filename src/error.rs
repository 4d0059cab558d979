use thiserror::Error;

/// Error type returned by behaviors.
///
/// Behaviors talk to the outside world, so anything that implements
/// [`std::error::Error`] can flow out of them with `?`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by the harness itself.
///
/// Protocol level failures (unexpected status codes, missing headers) are not
/// represented here: those are recorded as failed checks and never interrupt
/// an iteration.
#[derive(Debug, Error)]
pub enum Error {
    /// A dispatch was attempted on a case set with no entries or with a
    /// non-positive total weight.
    #[error("case set is empty or its total weight is not positive")]
    EmptyOrInvalidCaseSet,

    /// An identity was requested before any identity was registered.
    #[error("identity pool is empty")]
    EmptyPool,

    #[error("case `{case}` has invalid weight {weight}, weights must be finite and positive")]
    InvalidWeight { case: &'static str, weight: f64 },

    #[error("no case named `{0}` is registered in this case set")]
    CaseNotRegistered(&'static str),

    /// The random draw fell outside `[0, total)`.
    #[error("draw {draw} is outside of [0, {total})")]
    DrawOutOfRange { draw: f64, total: f64 },

    /// An executor was configured in a way it cannot run.
    #[error("invalid executor configuration: {0}")]
    InvalidExecutor(&'static str),
}
