use thiserror::Error;

/// Recoverable failures of the placement and selection core.
///
/// None of these are fatal: callers report the message and skip the
/// operation instead of aborting a larger workflow.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("{operation} needs at least {expected} points, got {actual}")]
    InsufficientData {
        operation: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("degenerate geometry in {operation}: {reason}")]
    DegenerateGeometry {
        operation: &'static str,
        reason: String,
    },

    #[error("invalid value for {name}: {value}")]
    InvalidParameter { name: &'static str, value: String },

    #[error("label id {id} appears more than once in the batch")]
    DuplicateLabel { id: String },
}

pub type LayoutResult<T> = Result<T, LayoutError>;

impl LayoutError {
    pub(crate) fn insufficient(operation: &'static str, expected: usize, actual: usize) -> Self {
        Self::InsufficientData {
            operation,
            expected,
            actual,
        }
    }

    pub(crate) fn degenerate(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::DegenerateGeometry {
            operation,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(name: &'static str, value: impl ToString) -> Self {
        Self::InvalidParameter {
            name,
            value: value.to_string(),
        }
    }
}

/// Fails with `InsufficientData` when `actual < expected`.
pub(crate) fn require_points(
    operation: &'static str,
    expected: usize,
    actual: usize,
) -> LayoutResult<()> {
    if actual < expected {
        return Err(LayoutError::insufficient(operation, expected, actual));
    }
    Ok(())
}

/// Fails with `InvalidParameter` unless `value` is finite and strictly positive.
pub(crate) fn require_positive(name: &'static str, value: f64) -> LayoutResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(LayoutError::invalid(name, value));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_message_names_operation() {
        let err = require_points("kmeans", 1, 0).unwrap_err();
        assert_eq!(err.to_string(), "kmeans needs at least 1 points, got 0");
    }

    #[test]
    fn positive_check_rejects_nan_and_zero() {
        assert!(require_positive("spacing", 0.0).is_err());
        assert!(require_positive("spacing", f64::NAN).is_err());
        assert!(require_positive("spacing", 0.5).is_ok());
    }
}
