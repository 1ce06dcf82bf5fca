use crate::backend::GeevBackend;
use crate::{DType, Error};

/// scratch sizes for one `geev` call
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Workspace {
	pub dtype: DType,
	/// matrix dimension
	pub n: usize,
	/// blocking factor reported by the backend
	pub nb: usize,
	/// length of the `work` buffer, in elements of the matrix type
	pub lwork: usize,
	/// length of the real `rwork` buffer, zero for real types
	pub lrwork: usize,
}

/// largest dimension accepted by the backends, which index with 32-bit integers
pub const MAX_DIM: usize = i32::MAX as usize;

/// computes the scratch sizes needed to solve an `n×n` problem of element type `dtype`.
///
/// the blocking factor is queried from `backend` on every call, nothing is cached.
///
/// # errors
/// - [`Error::InvalidDimension`] if `n` is zero, exceeds [`MAX_DIM`], or the sizes overflow.
///   the backend is not queried in that case.
/// - [`Error::BackendNotReady`] if the backend is not initialized.
pub fn plan<B: GeevBackend + ?Sized>(backend: &B, dtype: DType, n: usize) -> Result<Workspace, Error> {
	if n == 0 || n > MAX_DIM {
		return Err(Error::invalid_dimension(n, n));
	}
	if !backend.is_initialized() {
		return Err(Error::BackendNotReady);
	}

	let nb = backend.geqrf_nb(dtype, n, n)?;

	let lwork = nb
		.checked_mul(2)
		.and_then(|x| x.checked_add(1))
		.and_then(|x| x.checked_mul(n))
		.filter(|&x| x <= MAX_DIM)
		.ok_or(Error::invalid_dimension(n, n))?;
	let lrwork = if dtype.descriptor().needs_rwork { 2 * n } else { 0 };

	let ws = Workspace {
		dtype,
		n,
		nb,
		lwork,
		lrwork,
	};
	log::debug!("{}: planned workspace {ws:?}", backend.name());
	Ok(ws)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::backend::{GeevBuffers, Job};
	use core::cell::Cell;

	struct NbBackend {
		nb: usize,
		ready: bool,
		queries: Cell<usize>,
	}

	impl NbBackend {
		fn new(nb: usize) -> Self {
			Self {
				nb,
				ready: true,
				queries: Cell::new(0),
			}
		}
	}

	impl GeevBackend for NbBackend {
		fn name(&self) -> &str {
			"nb"
		}

		fn init(&mut self) -> Result<(), Error> {
			self.ready = true;
			Ok(())
		}

		fn finalize(&mut self) {
			self.ready = false;
		}

		fn is_initialized(&self) -> bool {
			self.ready
		}

		fn geqrf_nb(&self, _: DType, _: usize, _: usize) -> Result<usize, Error> {
			self.queries.set(self.queries.get() + 1);
			Ok(self.nb)
		}

		fn sgeev(&mut self, _: Job, _: Job, _: &mut GeevBuffers<f32>) -> Result<i32, Error> {
			unreachable!()
		}

		fn dgeev(&mut self, _: Job, _: Job, _: &mut GeevBuffers<f64>) -> Result<i32, Error> {
			unreachable!()
		}

		fn cgeev(&mut self, _: Job, _: Job, _: &mut GeevBuffers<num_complex::Complex32>) -> Result<i32, Error> {
			unreachable!()
		}

		fn zgeev(&mut self, _: Job, _: Job, _: &mut GeevBuffers<num_complex::Complex64>) -> Result<i32, Error> {
			unreachable!()
		}
	}

	#[test]
	fn test_lwork() {
		let backend = NbBackend::new(32);
		for dtype in DType::ALL {
			for n in [1, 2, 3, 10, 100, 4000] {
				let ws = plan(&backend, dtype, n).unwrap();
				assert_eq!(ws.nb, 32);
				assert_eq!(ws.lwork, n * (1 + 2 * 32));
				assert_eq!(ws.lrwork, if dtype.is_complex() { 2 * n } else { 0 });
			}
		}
		assert_eq!(backend.queries.get(), 4 * 6);
	}

	#[test]
	fn test_recomputed() {
		let backend = NbBackend::new(8);
		let a = plan(&backend, DType::F64, 100).unwrap();
		let b = plan(&backend, DType::F64, 100).unwrap();
		assert_eq!(a, b);
		assert_eq!(backend.queries.get(), 2);
	}

	#[test]
	fn test_invalid() {
		let mut backend = NbBackend::new(8);
		assert_eq!(plan(&backend, DType::F32, 0), Err(Error::invalid_dimension(0, 0)));
		assert!(matches!(
			plan(&backend, DType::C64, MAX_DIM + 1),
			Err(Error::InvalidDimension { .. })
		));
		assert!(matches!(
			plan(&backend, DType::F64, MAX_DIM),
			Err(Error::InvalidDimension { .. })
		));
		assert_eq!(backend.queries.get(), 1);

		backend.finalize();
		assert_eq!(plan(&backend, DType::F64, 10), Err(Error::BackendNotReady));
		assert_eq!(plan(&backend, DType::F64, 0), Err(Error::invalid_dimension(0, 0)));
	}
}
