//! `faer-geev` computes the eigenvalues and right eigenvectors of dense non-symmetric matrices,
//! dispatching to one of the four precision variants of `geev` (real/complex, single/double)
//! exposed by a pluggable backend.
//!
//! two backends are provided:
//! - [`FaerBackend`], running faer's eigendecomposition on the cpu,
//! - [`MagmaBackend`], running MAGMA's blocked eigensolver on the gpu. the library is loaded at
//!   runtime, so it is only needed on machines that use it.
//!
//! # example
//! ```
//! use faer_geev::{FaerBackend, Matrix, Session};
//!
//! let mut backend = FaerBackend::default();
//! let mut session = Session::open(&mut backend)?;
//!
//! let a = Matrix::from_row_major(2, 2, &[2.0, 0.0, 0.0, 3.0f64])?;
//! let mut eig = session.eig(&a)?.into_complex();
//! eig.sort_canonical();
//!
//! assert!((eig.eigenvalues[0].re - 2.0).abs() < 1e-12);
//! assert!((eig.eigenvalues[1].re - 3.0).abs() < 1e-12);
//! # Ok::<(), faer_geev::Error>(())
//! ```
//!
//! a [`Session`] serializes access to the backend's process-wide state: it initializes the
//! backend when opened and finalizes it when dropped.

#![warn(missing_debug_implementations)]

mod seal;

pub mod backend;
pub mod dtype;
pub mod eig;
pub mod error;
pub mod matrix;
pub mod workspace;

pub use backend::{FaerBackend, GeevBackend, GeevBuffers, Job, MagmaBackend, Session};
pub use dtype::{DType, Element, Routine, TypeDescriptor};
pub use eig::{geev, geev_dyn, ComplexEigen, DynEigen, Eigen};
pub use error::Error;
pub use matrix::{DynMatrix, Matrix};
pub use workspace::{plan, Workspace};
