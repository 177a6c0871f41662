//! Result type alias for the batcher

use super::errors::BatcherError;

/// Result type alias for batcher operations
///
/// # Examples
///
/// ```
/// use batcher::domain::result::Result;
/// use batcher::domain::errors::BatcherError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(BatcherError::Configuration("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, BatcherError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_with_question_mark() -> Result<()> {
        fn inner() -> Result<i32> {
            Ok(42)
        }

        let value = inner()?;
        assert_eq!(value, 42);
        Ok(())
    }

    #[test]
    fn test_result_err() {
        let result: Result<i32> = Err(BatcherError::Cancelled("test".to_string()));
        assert!(result.is_err());
    }
}
