use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    CollectionFailed,
    InvalidArgs,
    ScanFailed,
}

impl ExitCode {
    pub const fn as_i32(self) -> i32 {
        match self {
            ExitCode::Success => 0,
            ExitCode::CollectionFailed => 1,
            ExitCode::InvalidArgs => 2,
            ExitCode::ScanFailed => 10,
        }
    }
}

#[derive(Debug)]
pub struct ExitError {
    pub code: ExitCode,
    pub err: anyhow::Error,
}

impl ExitError {
    pub fn new(code: ExitCode, err: anyhow::Error) -> Self {
        Self { code, err }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.err.fmt(f)
    }
}

impl std::error::Error for ExitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.err.source()
    }
}

pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(exit) = err.downcast_ref::<ExitError>() {
        return exit.code.as_i32();
    }
    ExitCode::ScanFailed.as_i32()
}

pub fn invalid_args(message: impl Into<String>) -> anyhow::Error {
    ExitError::new(ExitCode::InvalidArgs, anyhow::anyhow!(message.into())).into()
}

pub fn invalid_args_err(err: anyhow::Error) -> anyhow::Error {
    ExitError::new(ExitCode::InvalidArgs, err).into()
}

pub fn collection_failed_err(err: anyhow::Error) -> anyhow::Error {
    ExitError::new(ExitCode::CollectionFailed, err).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_errors_keep_their_code() {
        let err = collection_failed_err(anyhow::anyhow!("no cluster"));
        assert_eq!(exit_code(&err), 1);
        assert_eq!(exit_code(&invalid_args("bad flag")), 2);
        assert_eq!(exit_code(&anyhow::anyhow!("other")), 10);
    }

    #[test]
    fn context_on_top_does_not_hide_the_code() {
        let err = collection_failed_err(anyhow::anyhow!("no cluster")).context("k8s scan");
        assert_eq!(exit_code(&err), 1);
    }
}
