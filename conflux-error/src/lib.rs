#![feature(error_generic_member_access)]
#![deny(missing_docs)]

//! This crate defines error & result types for Conflux.
//! It also contains a variety of useful macros for error handling.

mod ext;

use std::backtrace::{Backtrace, BacktraceStatus};
use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::sync::Arc;

pub use ext::*;

/// A string that can be used as an error message.
#[derive(Debug)]
pub struct ErrString(Cow<'static, str>);

#[allow(clippy::fallible_impl_from)]
impl<T> From<T> for ErrString
where
    T: Into<Cow<'static, str>>,
{
    fn from(msg: T) -> Self {
        Self(msg.into())
    }
}

impl AsRef<str> for ErrString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for ErrString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for ErrString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// The top-level error type for Conflux.
#[derive(thiserror::Error)]
#[non_exhaustive]
pub enum ConfluxError {
    /// Listing fragments or producing rows from the external source failed.
    #[error("{0}")]
    Computation(ErrString, Backtrace),
    /// A row's shape or field types disagree with the declared schema.
    #[error("{0}")]
    SchemaMismatch(ErrString, Backtrace),
    /// A row could not be decoded from the external source.
    #[error("{0}")]
    InvalidData(ErrString, Backtrace),
    /// A resource was released without being acquired, or released too often.
    #[error("{0}")]
    ResourceState(ErrString, Backtrace),
    /// Tearing down a resource failed.
    #[error("{0}")]
    Teardown(ErrString, Backtrace),
    /// An invalid argument was provided.
    #[error("{0}")]
    InvalidArgument(ErrString, Backtrace),
    /// The requested path does not exist in the external source.
    #[error("{0}")]
    PathNotFound(ErrString, Backtrace),
    /// The requested operation is not supported.
    #[error("{0}")]
    NotImplemented(ErrString, Backtrace),
    /// An error annotated with some additional context.
    #[error("{0}: {1}")]
    Context(ErrString, Box<ConfluxError>),
    /// A single error delivered to several independent callers.
    #[error(transparent)]
    Shared(Arc<ConfluxError>),
    /// A wrapper for IO errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A wrapper for errors from the jiff date/time library.
    #[error(transparent)]
    Jiff(#[from] jiff::Error),
    /// A wrapper for serde_json errors.
    #[cfg(feature = "serde")]
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ConfluxError {
    /// Adds additional context to an error.
    pub fn with_context<T: Into<ErrString>>(self, msg: T) -> Self {
        ConfluxError::Context(msg.into(), Box::new(self))
    }

    /// Recovers an owned error from a shared one, keeping it shared if other holders remain.
    pub fn from_shared(error: Arc<ConfluxError>) -> Self {
        match Arc::try_unwrap(error) {
            Ok(error) => error,
            Err(error) => ConfluxError::Shared(error),
        }
    }

    /// Returns the innermost error, looking through shared and contextual wrappers.
    pub fn root(&self) -> &ConfluxError {
        match self {
            ConfluxError::Shared(inner) => inner.root(),
            ConfluxError::Context(_, inner) => inner.root(),
            _ => self,
        }
    }

    /// Returns the message of the innermost error, without any wrapping context.
    pub fn message(&self) -> Cow<'_, str> {
        match self.root() {
            ConfluxError::Computation(msg, _)
            | ConfluxError::SchemaMismatch(msg, _)
            | ConfluxError::InvalidData(msg, _)
            | ConfluxError::ResourceState(msg, _)
            | ConfluxError::Teardown(msg, _)
            | ConfluxError::InvalidArgument(msg, _)
            | ConfluxError::PathNotFound(msg, _)
            | ConfluxError::NotImplemented(msg, _) => Cow::Borrowed(msg.as_ref()),
            other => Cow::Owned(other.to_string()),
        }
    }

    /// Whether the error signals a missing path in the external source.
    pub fn is_path_not_found(&self) -> bool {
        matches!(self.root(), ConfluxError::PathNotFound(..))
    }

    /// Whether the error only affects a single row and leaves the rest of the stream usable.
    pub fn is_row_error(&self) -> bool {
        matches!(
            self.root(),
            ConfluxError::SchemaMismatch(..) | ConfluxError::InvalidData(..)
        )
    }

    /// Whether the error is a violation of the acquire/release contract.
    pub fn is_resource_state(&self) -> bool {
        matches!(self.root(), ConfluxError::ResourceState(..))
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            ConfluxError::Computation(_, bt)
            | ConfluxError::SchemaMismatch(_, bt)
            | ConfluxError::InvalidData(_, bt)
            | ConfluxError::ResourceState(_, bt)
            | ConfluxError::Teardown(_, bt)
            | ConfluxError::InvalidArgument(_, bt)
            | ConfluxError::PathNotFound(_, bt)
            | ConfluxError::NotImplemented(_, bt) => Some(bt),
            _ => None,
        }
    }
}

impl Debug for ConfluxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)?;
        if let Some(bt) = self.backtrace() {
            if bt.status() == BacktraceStatus::Captured {
                write!(f, "\nBacktrace:\n{bt}")?;
            }
        }
        Ok(())
    }
}

/// A type alias for Results that return ConfluxErrors as their error type.
pub type ConfluxResult<T> = Result<T, ConfluxError>;

/// A type alias for Results whose error is shared between several consumers.
pub type SharedConfluxResult<T> = Result<T, Arc<ConfluxError>>;

/// A trait for unwrapping a ConfluxResult.
pub trait ConfluxUnwrap {
    /// The type of the value being unwrapped.
    type Output;

    /// Returns the value of the result if it is Ok, otherwise panics with the error.
    /// Should be called only in contexts where the error condition represents a bug (programmer error).
    fn conflux_unwrap(self) -> Self::Output;
}

impl<T, E> ConfluxUnwrap for Result<T, E>
where
    E: Into<ConfluxError>,
{
    type Output = T;

    #[inline(always)]
    fn conflux_unwrap(self) -> Self::Output {
        self.map_err(|err| err.into())
            .unwrap_or_else(|err| crate::conflux_panic!(err))
    }
}

/// A trait for expect-ing a ConfluxResult or an Option.
pub trait ConfluxExpect {
    /// The type of the value being expected.
    type Output;

    /// Returns the value of the result if it is Ok, otherwise panics with the error.
    /// Should be called only in contexts where the error condition represents a bug (programmer error).
    fn conflux_expect(self, msg: &str) -> Self::Output;
}

impl<T, E> ConfluxExpect for Result<T, E>
where
    E: Into<ConfluxError>,
{
    type Output = T;

    #[inline(always)]
    fn conflux_expect(self, msg: &str) -> Self::Output {
        self.map_err(|err| err.into())
            .unwrap_or_else(|e| crate::conflux_panic!(e.with_context(msg.to_string())))
    }
}

impl<T> ConfluxExpect for Option<T> {
    type Output = T;

    #[inline(always)]
    fn conflux_expect(self, msg: &str) -> Self::Output {
        self.unwrap_or_else(|| {
            let err = ConfluxError::InvalidArgument(
                msg.to_string().into(),
                Backtrace::capture(),
            );
            crate::conflux_panic!(err)
        })
    }
}

/// A convenient macro for creating a ConfluxError.
#[macro_export]
macro_rules! conflux_err {
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {{
        use std::backtrace::Backtrace;
        $crate::__private::must_use(
            $crate::ConfluxError::$variant(format!($fmt, $($arg),*).into(), Backtrace::capture())
        )
    }};
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::conflux_err!(InvalidArgument: $fmt, $($arg),*)
    };
}

/// A convenience macro for returning a ConfluxError.
#[macro_export]
macro_rules! conflux_bail {
    ($($tt:tt)+) => {
        return Err($crate::conflux_err!($($tt)+))
    };
}

/// A convenience macro for panicking with a ConfluxError.
#[macro_export]
macro_rules! conflux_panic {
    ($variant:ident: $fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::conflux_panic!($crate::conflux_err!($variant: $fmt, $($arg),*))
    };
    ($err:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        let err: $crate::ConfluxError = $err;
        $crate::conflux_panic!(err.with_context(format!($fmt, $($arg),*)))
    }};
    ($fmt:literal $(, $arg:expr)* $(,)?) => {
        $crate::conflux_panic!($crate::conflux_err!($fmt, $($arg),*))
    };
    ($err:expr) => {{
        #[allow(clippy::panic)]
        {
            let err: $crate::ConfluxError = $err;
            panic!("{}", err)
        }
    }};
}

#[doc(hidden)]
pub mod __private {
    #[doc(hidden)]
    #[inline]
    #[cold]
    #[must_use]
    pub const fn must_use(error: crate::ConfluxError) -> crate::ConfluxError {
        error
    }
}
