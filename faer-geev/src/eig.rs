//! eigensolver invocation.
//!
//! every call runs through the same steps: the input is checked (square, non-empty), the
//! backend readiness is checked, a [`Workspace`](crate::Workspace) is planned, the buffers are
//! allocated and handed to the `geev` entry point selected by the element type, and the
//! eigenvalues are assembled into one complex vector.

use crate::backend::{GeevBackend, GeevBuffers, Job, Session};
use crate::workspace::{self, MAX_DIM};
use crate::{DType, DynMatrix, Element, Error, Matrix};
use num_complex::{Complex, Complex32, Complex64};
use num_traits::{Float, Zero};

/// right eigenpairs of a square matrix, as returned by the backend.
///
/// for real inputs, the eigenvectors of a complex conjugate pair `(λ, conj(λ))` stored at
/// indices `j` and `j + 1` are packed: column `j` holds the real part and column `j + 1`
/// holds the imaginary part of the eigenvector of `λ`. see [`Eigen::into_complex`].
#[derive(Clone, Debug, PartialEq)]
pub struct Eigen<T: Element> {
	/// eigenvalues in backend order
	pub eigenvalues: Vec<Complex<T::Real>>,
	/// right eigenvectors, column `i` belongs to `eigenvalues[i]`
	pub eigenvectors: Matrix<T>,
}

/// right eigenpairs with complex eigenvectors
#[derive(Clone, Debug, PartialEq)]
pub struct ComplexEigen<R> {
	pub eigenvalues: Vec<Complex<R>>,
	pub eigenvectors: Matrix<Complex<R>>,
}

/// eigenpairs of a [`DynMatrix`]
#[derive(Clone, Debug, PartialEq)]
pub enum DynEigen {
	F32(Eigen<f32>),
	F64(Eigen<f64>),
	C32(Eigen<Complex32>),
	C64(Eigen<Complex64>),
}

impl<T: Element> Eigen<T> {
	/// dimension of the problem
	#[inline]
	pub fn n(&self) -> usize {
		self.eigenvalues.len()
	}

	/// unpacks the eigenvectors into complex columns
	pub fn into_complex(self) -> ComplexEigen<T::Real> {
		let n = self.n();
		let vectors = &self.eigenvectors;
		let mut out = Matrix::<Complex<T::Real>>::zeros(n, n);

		if !T::DESCRIPTOR.split_eigenvalues {
			for j in 0..n {
				for i in 0..n {
					out[(i, j)] = vectors[(i, j)].to_complex();
				}
			}
		} else {
			let mut j = 0;
			while j < n {
				if self.eigenvalues[j].im != T::Real::zero() && j + 1 < n {
					for i in 0..n {
						let re = vectors[(i, j)].to_complex().re;
						let im = vectors[(i, j + 1)].to_complex().re;
						out[(i, j)] = Complex::new(re, im);
						out[(i, j + 1)] = Complex::new(re, -im);
					}
					j += 2;
				} else {
					for i in 0..n {
						out[(i, j)] = vectors[(i, j)].to_complex();
					}
					j += 1;
				}
			}
		}

		ComplexEigen {
			eigenvalues: self.eigenvalues,
			eigenvectors: out,
		}
	}
}

impl<R: Float> ComplexEigen<R> {
	/// sorts the eigenpairs by real part, then imaginary part, permuting the eigenvectors along
	pub fn sort_canonical(&mut self) {
		let mut perm: Vec<usize> = (0..self.eigenvalues.len()).collect();
		let values = &self.eigenvalues;
		perm.sort_by(|&a, &b| {
			let (a, b) = (values[a], values[b]);
			a.re.partial_cmp(&b.re)
				.unwrap_or(core::cmp::Ordering::Equal)
				.then(a.im.partial_cmp(&b.im).unwrap_or(core::cmp::Ordering::Equal))
		});

		let sorted = perm.iter().map(|&i| values[i]).collect();
		self.eigenvalues = sorted;
		self.eigenvectors = self.eigenvectors.permute_cols(&perm);
	}

	/// largest entry of `|A v - λ v|` over all eigenpairs, for checking a solution
	pub fn max_residual<T: Element<Real = R>>(&self, a: &Matrix<T>) -> R {
		let n = self.eigenvalues.len();
		let mut max = R::zero();
		for (k, &lambda) in self.eigenvalues.iter().enumerate() {
			let v = self.eigenvectors.col(k);
			for i in 0..n {
				let mut acc = Complex::<R>::zero();
				for j in 0..n {
					acc = acc + a[(i, j)].to_complex() * v[j];
				}
				max = max.max((acc - lambda * v[i]).norm());
			}
		}
		max
	}
}

impl DynEigen {
	#[inline]
	pub fn dtype(&self) -> DType {
		match self {
			DynEigen::F32(_) => DType::F32,
			DynEigen::F64(_) => DType::F64,
			DynEigen::C32(_) => DType::C32,
			DynEigen::C64(_) => DType::C64,
		}
	}

	/// dimension of the problem
	#[inline]
	pub fn n(&self) -> usize {
		match self {
			DynEigen::F32(e) => e.n(),
			DynEigen::F64(e) => e.n(),
			DynEigen::C32(e) => e.n(),
			DynEigen::C64(e) => e.n(),
		}
	}
}

/// failed attempt. on [`Error::BackendNotReady`] the untouched input is handed back.
struct Failure<T> {
	error: Error,
	input: Option<Matrix<T>>,
}

impl<T> From<Error> for Failure<T> {
	#[inline]
	fn from(error: Error) -> Self {
		Self { error, input: None }
	}
}

fn check_shape<T: Copy>(a: &Matrix<T>) -> Result<usize, Error> {
	let (nrows, ncols) = a.shape();
	if nrows != ncols {
		return Err(Error::ShapeError { nrows, ncols });
	}
	if nrows == 0 || nrows > MAX_DIM {
		return Err(Error::invalid_dimension(nrows, ncols));
	}
	Ok(nrows)
}

fn attempt<T: Element, B: GeevBackend + ?Sized>(backend: &mut B, a: Matrix<T>) -> Result<Eigen<T>, Failure<T>> {
	let n = check_shape(&a)?;

	let not_ready = |a| Failure {
		error: Error::BackendNotReady,
		input: Some(a),
	};
	if !backend.is_initialized() {
		return Err(not_ready(a));
	}
	let ws = match workspace::plan(&*backend, T::DTYPE, n) {
		Ok(ws) => ws,
		Err(Error::BackendNotReady) => return Err(not_ready(a)),
		Err(err) => return Err(err.into()),
	};

	let mut buffers = GeevBuffers::new(a.into_vec(), &ws);
	match T::call_geev(backend, Job::NoVectors, Job::Vectors, &mut buffers) {
		Ok(0) => {}
		Ok(status) => {
			log::debug!(
				"{}: {} returned status {status} for n = {n}",
				backend.name(),
				T::DESCRIPTOR.routine.name()
			);
			return Err(Error::SolverFailed(status).into());
		}
		Err(Error::BackendNotReady) => {
			let a = Matrix::from_column_major(n, n, buffers.a)?;
			return Err(not_ready(a));
		}
		Err(err) => return Err(err.into()),
	}

	let GeevBuffers { w, wi, vr, .. } = buffers;
	let eigenvalues = if T::DESCRIPTOR.split_eigenvalues {
		w.iter().zip(&wi).map(|(re, &im)| Complex::new(re.to_complex().re, im)).collect()
	} else {
		w.iter().map(|w| w.to_complex()).collect()
	};

	Ok(Eigen {
		eigenvalues,
		eigenvectors: Matrix::from_column_major(n, n, vr)?,
	})
}

/// computes the eigenvalues and right eigenvectors of the square matrix `a` on an initialized
/// backend, consuming `a` as scratch.
///
/// # errors
/// - [`Error::ShapeError`] if `a` is not square.
/// - [`Error::InvalidDimension`] if `a` is empty or too large for the backend.
/// - [`Error::BackendNotReady`] if the backend is not initialized.
/// - [`Error::SolverFailed`] if the backend reports a non-zero status.
pub fn geev<T: Element, B: GeevBackend + ?Sized>(backend: &mut B, a: Matrix<T>) -> Result<Eigen<T>, Error> {
	attempt(backend, a).map_err(|failure| failure.error)
}

/// calls `geev` on a matrix whose element type is only known at runtime
pub fn geev_dyn<B: GeevBackend + ?Sized>(backend: &mut B, a: DynMatrix) -> Result<DynEigen, Error> {
	Ok(match a {
		DynMatrix::F32(a) => DynEigen::F32(geev(backend, a)?),
		DynMatrix::F64(a) => DynEigen::F64(geev(backend, a)?),
		DynMatrix::C32(a) => DynEigen::C32(geev(backend, a)?),
		DynMatrix::C64(a) => DynEigen::C64(geev(backend, a)?),
	})
}

impl<B: GeevBackend + ?Sized> Session<'_, B> {
	/// computes the eigenpairs of `a`, leaving it untouched
	#[inline]
	pub fn eig<T: Element>(&mut self, a: &Matrix<T>) -> Result<Eigen<T>, Error> {
		self.eig_in_place(a.clone())
	}

	/// computes the eigenpairs of `a`, using its storage as scratch.
	///
	/// if the backend turns out not to be ready, it is reinitialized and the call is retried
	/// once.
	pub fn eig_in_place<T: Element>(&mut self, a: Matrix<T>) -> Result<Eigen<T>, Error> {
		match attempt(&mut *self.backend, a) {
			Ok(eig) => Ok(eig),
			Err(Failure {
				error: Error::BackendNotReady,
				input: Some(a),
			}) => {
				log::warn!("{}: backend not ready, retrying once", self.backend.name());
				self.reinit()?;
				geev(&mut *self.backend, a)
			}
			Err(failure) => Err(failure.error),
		}
	}

	/// calls [`Session::eig_in_place`] on a matrix whose element type is only known at runtime
	pub fn eig_dyn(&mut self, a: DynMatrix) -> Result<DynEigen, Error> {
		Ok(match a {
			DynMatrix::F32(a) => DynEigen::F32(self.eig_in_place(a)?),
			DynMatrix::F64(a) => DynEigen::F64(self.eig_in_place(a)?),
			DynMatrix::C32(a) => DynEigen::C32(self.eig_in_place(a)?),
			DynMatrix::C64(a) => DynEigen::C64(self.eig_in_place(a)?),
		})
	}
}
