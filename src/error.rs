use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot enter workspace {}", .0)]
    Switch(String),

    #[error("net rejected: {}", .0)]
    Creation(String),

    #[error("run failed: {}", .0)]
    Execution(String),

    #[error("expected {} inputs but {} were given.", .expected, .given)]
    Arity { expected: usize, given: usize },

    #[error("no blob named {} in the current workspace", .0)]
    NotFound(String),

    #[error("no immediate session is active")]
    NotActive,

    #[error("io error")]
    Io(std::io::Error),
}
