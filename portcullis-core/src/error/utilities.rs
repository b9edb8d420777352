use crate::{
    Error,
    error::{StorageError, ValidationError},
};

/// Extension trait for mapping backend errors (redis, database drivers) into
/// the storage taxonomy, so no driver error type crosses the public API.
///
/// # Example
///
/// ```rust,ignore
/// use portcullis_core::error::utilities::StorageResultExt;
///
/// redis::cmd("EXISTS").arg(&key).query_async(&mut conn).await.map_connection_err()?;
/// ```
pub trait StorageResultExt<T> {
    /// Convert a backend error to a storage database error
    fn map_storage_err(self) -> Result<T, Error>;

    /// Convert a backend error to a storage database error with additional context
    fn map_storage_err_with_context(self, context: &str) -> Result<T, Error>;

    /// Convert a backend error to a storage connection error
    fn map_connection_err(self) -> Result<T, Error>;
}

impl<T, E: std::fmt::Display> StorageResultExt<T> for Result<T, E> {
    fn map_storage_err(self) -> Result<T, Error> {
        self.map_err(|e| Error::Storage(StorageError::Database(e.to_string())))
    }

    fn map_storage_err_with_context(self, context: &str) -> Result<T, Error> {
        self.map_err(|e| Error::Storage(StorageError::Database(format!("{context}: {e}"))))
    }

    fn map_connection_err(self) -> Result<T, Error> {
        self.map_err(|e| Error::Storage(StorageError::Connection(e.to_string())))
    }
}

/// Extension trait for Option types to simplify required field validation in builders.
pub trait RequiredFieldExt<T> {
    /// Convert None to a ValidationError::MissingField
    fn require_field(self, field_name: &str) -> Result<T, ValidationError>;
}

impl<T> RequiredFieldExt<T> for Option<T> {
    fn require_field(self, field_name: &str) -> Result<T, ValidationError> {
        self.ok_or_else(|| ValidationError::MissingField(format!("{field_name} is required")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_result_ext() {
        let error_result: Result<i32, &str> = Err("connection refused");
        match error_result.map_storage_err().unwrap_err() {
            Error::Storage(StorageError::Database(msg)) => {
                assert_eq!(msg, "connection refused");
            }
            _ => panic!("Expected storage database error"),
        }
    }

    #[test]
    fn test_storage_result_ext_with_context() {
        let error_result: Result<i32, &str> = Err("timeout");
        match error_result
            .map_storage_err_with_context("Failed to revoke token")
            .unwrap_err()
        {
            Error::Storage(StorageError::Database(msg)) => {
                assert_eq!(msg, "Failed to revoke token: timeout");
            }
            _ => panic!("Expected storage database error"),
        }
    }

    #[test]
    fn test_connection_err() {
        let error_result: Result<(), &str> = Err("broken pipe");
        assert!(matches!(
            error_result.map_connection_err(),
            Err(Error::Storage(StorageError::Connection(_)))
        ));
    }

    #[test]
    fn test_required_field_ext() {
        assert_eq!(
            Some("a@x.com".to_string()).require_field("Email").unwrap(),
            "a@x.com"
        );

        let none_value: Option<String> = None;
        match none_value.require_field("Email").unwrap_err() {
            ValidationError::MissingField(msg) => assert_eq!(msg, "Email is required"),
            _ => panic!("Expected missing field validation error"),
        }
    }
}
