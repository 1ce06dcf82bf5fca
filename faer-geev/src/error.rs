/// errors that can occur while planning or running an eigensolver call
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
	/// element type outside of `{f32, f64, c32, c64}`
	UnsupportedType(String),
	/// zero or out-of-range dimension, or a buffer whose length does not match its shape
	InvalidDimension {
		/// number of rows requested
		nrows: usize,
		/// number of columns requested
		ncols: usize,
		/// length of the provided storage, when it was the mismatching part
		len: Option<usize>,
	},
	/// input matrix is not square
	ShapeError {
		/// number of rows of the input
		nrows: usize,
		/// number of columns of the input
		ncols: usize,
	},
	/// backend used before `init`, or its initialization failed
	BackendNotReady,
	/// backend routine returned a non-zero status, preserved as-is
	SolverFailed(i32),
	/// an optional backend library could not be loaded
	BackendUnavailable(String),
}

impl Error {
	#[inline]
	pub(crate) fn invalid_dimension(nrows: usize, ncols: usize) -> Self {
		Error::InvalidDimension { nrows, ncols, len: None }
	}

	/// short stable name of the error kind, used in benchmark logs and artifacts
	pub fn kind(&self) -> &'static str {
		match self {
			Error::UnsupportedType(_) => "UnsupportedType",
			Error::InvalidDimension { .. } => "InvalidDimension",
			Error::ShapeError { .. } => "ShapeError",
			Error::BackendNotReady => "BackendNotReady",
			Error::SolverFailed(_) => "SolverFailed",
			Error::BackendUnavailable(_) => "BackendUnavailable",
		}
	}

	/// whether reinitializing the backend and retrying once may succeed
	#[inline]
	pub fn is_recoverable(&self) -> bool {
		matches!(self, Error::BackendNotReady)
	}
}

impl core::fmt::Display for Error {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self {
			Error::UnsupportedType(ty) => write!(f, "unsupported element type `{ty}`, expected one of f32, f64, c32, c64"),
			Error::InvalidDimension { nrows, ncols, len: None } => {
				write!(f, "invalid dimension {nrows}x{ncols}")
			}
			Error::InvalidDimension {
				nrows,
				ncols,
				len: Some(len),
			} => write!(f, "invalid dimension {nrows}x{ncols} for a buffer of length {len}"),
			Error::ShapeError { nrows, ncols } => {
				write!(f, "matrix must be rank-2 square for eig, found {nrows}x{ncols}")
			}
			Error::BackendNotReady => f.write_str("backend is not initialized"),
			Error::SolverFailed(status) => write!(f, "solver failed with status {status}"),
			Error::BackendUnavailable(reason) => write!(f, "backend unavailable: {reason}"),
		}
	}
}

impl core::error::Error for Error {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_display() {
		let err = Error::ShapeError { nrows: 3, ncols: 4 };
		assert!(err.to_string().contains("must be rank-2 square for eig"));
		assert!(err.to_string().contains("3x4"));

		assert_eq!(Error::SolverFailed(-7).to_string(), "solver failed with status -7");
		assert_eq!(Error::SolverFailed(-7).kind(), "SolverFailed");
	}

	#[test]
	fn test_recoverable() {
		assert!(Error::BackendNotReady.is_recoverable());
		assert!(!Error::SolverFailed(1).is_recoverable());
		assert!(!Error::invalid_dimension(0, 0).is_recoverable());
	}
}
