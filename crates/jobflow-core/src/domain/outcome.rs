//! Outcome of a single attempt.
//!
//! Architecture-agnostic: produced by the worker (or the reaper, for an
//! expired lease) and applied to the record by `app::Lifecycle`.

use serde::{Deserialize, Serialize};

use super::errors::ExecutionError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Success,
    Failure { message: String },
}

impl Outcome {
    pub fn success() -> Self {
        Outcome::Success
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Outcome::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

impl From<Result<(), ExecutionError>> for Outcome {
    fn from(result: Result<(), ExecutionError>) -> Self {
        match result {
            Ok(()) => Outcome::Success,
            Err(e) => Outcome::Failure { message: e.message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_executor_results() {
        assert_eq!(Outcome::from(Ok(())), Outcome::success());
        assert_eq!(
            Outcome::from(Err(ExecutionError::new("smtp down"))),
            Outcome::failure("smtp down")
        );
    }

    #[test]
    fn is_tagged_by_kind() {
        let v = serde_json::to_value(Outcome::failure("oops")).unwrap();
        assert_eq!(v["kind"], "FAILURE");
        assert_eq!(v["message"], "oops");
    }
}
