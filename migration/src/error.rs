use std::{any::Any, error, result};

/// The global any `Result` alias of the library.
///
/// Provider operations return this result: the concrete error type
/// of a provider is not known by the engine at compilation time, so
/// it travels boxed as a [`AnyBoxedError`].
pub type AnyResult<T> = result::Result<T, AnyBoxedError>;

/// The global, downcastable any `Error` trait of the library.
///
/// This trait is used instead of [`std::error::Error`] when an error
/// cannot be placed in a generic due to object-safe trait
/// constraint. The main use case is for provider traits.
pub trait AnyError: error::Error + Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// The global any boxed `Error` alias of the library.
pub type AnyBoxedError = Box<dyn AnyError + Send + 'static>;

impl error::Error for AnyBoxedError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.as_ref().source()
    }
}

/// Implements [`AnyError`] and the conversion into
/// [`AnyBoxedError`] for a module error type.
macro_rules! impl_any_error {
    ($err:ty) => {
        impl $crate::error::AnyError for $err {
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
        }

        impl From<$err> for $crate::error::AnyBoxedError {
            fn from(err: $err) -> Self {
                Box::new(err)
            }
        }
    };
}

pub(crate) use impl_any_error;
