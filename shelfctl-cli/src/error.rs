use std::fmt;
use std::process::ExitCode;

use shelfctl_core::TableError;

/// Failure surfaced to the shell, carrying the exit status it maps to
#[derive(Debug)]
pub enum CliError {
    /// Rejected by the table facade; printed verbatim
    Table(TableError),
    /// Config, connection or migration trouble before any table is touched
    Setup(anyhow::Error),
}

impl CliError {
    /// 1 for bad input, 2 for integrity refusals, 3 for storage or setup
    pub fn status(&self) -> u8 {
        match self {
            Self::Table(err) => {
                let kind = err.kind();
                if kind.is_input() {
                    1
                } else if kind.is_integrity() {
                    2
                } else {
                    3
                }
            }
            Self::Setup(_) => 3,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.status())
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table(err) => write!(f, "{err}"),
            Self::Setup(err) => write!(f, "{err:#}"),
        }
    }
}

impl From<TableError> for CliError {
    fn from(err: TableError) -> Self {
        Self::Table(err)
    }
}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        Self::Setup(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_family() {
        let input = CliError::from(TableError::unknown_table("Shelf"));
        assert_eq!(input.status(), 1);

        let integrity = CliError::from(TableError::DependentRecordExists {
            table: "Book".into(),
        });
        assert_eq!(integrity.status(), 2);

        let storage = CliError::from(TableError::storage("commit", "connection reset"));
        assert_eq!(storage.status(), 3);

        let setup = CliError::from(anyhow::anyhow!("bad config"));
        assert_eq!(setup.status(), 3);
    }

    #[test]
    fn table_errors_print_unchanged() {
        let err = CliError::from(TableError::empty_table("User"));
        assert_eq!(err.to_string(), "No entries found in 'User'.");
    }
}
