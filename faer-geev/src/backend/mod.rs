//! solver backends.
//!
//! a backend exposes the four precision variants of `geev` through [`GeevBackend`], together
//! with the process-wide initialization state of the underlying library. [`Session`] scopes
//! that state.

use crate::workspace::Workspace;
use crate::{DType, Element, Error};
use num_complex::{Complex32, Complex64};
use num_traits::Zero;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod faer;
pub mod magma;

pub use self::faer::FaerBackend;
pub use self::magma::MagmaBackend;

/// whether the solver should compute a set of eigenvectors
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Job {
	NoVectors,
	Vectors,
}

/// buffers handed to a `geev` entry point.
///
/// all matrices are column-major. `a` and `vr` have leading dimension `n`, `vl` is a `1×1`
/// placeholder with leading dimension `1` since left eigenvectors are never requested.
#[derive(Clone, Debug)]
pub struct GeevBuffers<T: Element> {
	/// matrix dimension
	pub n: usize,
	/// input matrix, overwritten by the solver
	pub a: Vec<T>,
	/// eigenvalues for complex types, real parts of the eigenvalues for real types
	pub w: Vec<T>,
	/// imaginary parts of the eigenvalues for real types, empty for complex types
	pub wi: Vec<T::Real>,
	/// left eigenvector placeholder
	pub vl: Vec<T>,
	/// right eigenvectors
	pub vr: Vec<T>,
	/// scratch
	pub work: Vec<T>,
	/// real scratch for complex types, empty for real types
	pub rwork: Vec<T::Real>,
}

impl<T: Element> GeevBuffers<T> {
	/// allocates the output and scratch buffers described by `ws` around the input matrix `a`
	pub fn new(a: Vec<T>, ws: &Workspace) -> Self {
		let n = ws.n;
		equator::assert!(a.len() == n * n);

		let zero = T::Real::zero();
		let split = T::DESCRIPTOR.split_eigenvalues;
		Self {
			n,
			a,
			w: vec![T::zero(); n],
			wi: vec![zero; if split { n } else { 0 }],
			vl: vec![T::zero(); 1],
			vr: vec![T::zero(); n * n],
			work: vec![T::zero(); ws.lwork],
			rwork: vec![zero; ws.lrwork],
		}
	}

	#[inline]
	pub fn lda(&self) -> usize {
		self.n
	}

	#[inline]
	pub fn ldvl(&self) -> usize {
		1
	}

	#[inline]
	pub fn ldvr(&self) -> usize {
		self.n
	}

	/// checks that every buffer is long enough for an `n×n` solve.
	///
	/// the fields are public, so backends that hand raw pointers to a library must call this
	/// before doing so.
	pub fn check(&self) -> Result<(), Error> {
		let n = self.n;
		let nn = n.checked_mul(n).ok_or(Error::invalid_dimension(n, n))?;
		let desc = T::DESCRIPTOR;

		let short = |len: usize, min: usize| {
			if len < min {
				Err(Error::InvalidDimension {
					nrows: n,
					ncols: n,
					len: Some(len),
				})
			} else {
				Ok(())
			}
		};
		short(self.a.len(), nn)?;
		short(self.w.len(), n)?;
		short(self.wi.len(), if desc.split_eigenvalues { n } else { 0 })?;
		short(self.vl.len(), 1)?;
		short(self.vr.len(), nn)?;
		short(self.work.len(), n)?;
		short(self.rwork.len(), if desc.needs_rwork { 2 * n } else { 0 })?;
		Ok(())
	}
}

/// dense non-symmetric eigensolver library.
///
/// implementations must return [`Error::BackendNotReady`] from the `geev` entry points before
/// touching the buffers, so that the input can be handed back for a retry.
pub trait GeevBackend {
	/// short name used in logs and benchmark artifacts
	fn name(&self) -> &str;

	/// acquires the library's process-wide state
	fn init(&mut self) -> Result<(), Error>;

	/// releases the library's process-wide state. calling it on an uninitialized backend is a
	/// no-op.
	fn finalize(&mut self);

	fn is_initialized(&self) -> bool;

	/// blocking factor of the QR factorization of an `m×n` matrix of element type `dtype`
	fn geqrf_nb(&self, dtype: DType, m: usize, n: usize) -> Result<usize, Error>;

	/// real single precision, returns the solver status
	fn sgeev(&mut self, jobvl: Job, jobvr: Job, buffers: &mut GeevBuffers<f32>) -> Result<i32, Error>;
	/// real double precision, returns the solver status
	fn dgeev(&mut self, jobvl: Job, jobvr: Job, buffers: &mut GeevBuffers<f64>) -> Result<i32, Error>;
	/// complex single precision, returns the solver status
	fn cgeev(&mut self, jobvl: Job, jobvr: Job, buffers: &mut GeevBuffers<Complex32>) -> Result<i32, Error>;
	/// complex double precision, returns the solver status
	fn zgeev(&mut self, jobvl: Job, jobvr: Job, buffers: &mut GeevBuffers<Complex64>) -> Result<i32, Error>;
}

static SESSION_LOCK: Mutex<()> = Mutex::new(());

/// scoped acquisition of a backend's process-wide state.
///
/// opening a session takes a process-wide lock, then initializes the backend. dropping it
/// finalizes the backend, then releases the lock. only one session can be open in the process
/// at a time, opening a second one blocks until the first is dropped.
pub struct Session<'a, B: GeevBackend + ?Sized> {
	pub(crate) backend: &'a mut B,
	// dropped after `Drop::drop` has finalized the backend
	_guard: MutexGuard<'static, ()>,
}

impl<'a, B: GeevBackend + ?Sized> Session<'a, B> {
	/// opens a session on `backend`
	///
	/// # errors
	/// returns [`Error::BackendNotReady`] if the backend fails to initialize.
	pub fn open(backend: &'a mut B) -> Result<Self, Error> {
		let guard = SESSION_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
		if let Err(err) = backend.init() {
			log::warn!("{}: initialization failed: {err}", backend.name());
			backend.finalize();
			return Err(err);
		}
		log::debug!("{}: session opened", backend.name());
		Ok(Self { backend, _guard: guard })
	}

	#[inline]
	pub fn backend(&self) -> &B {
		&*self.backend
	}

	/// finalizes and initializes the backend again, without releasing the session lock
	pub fn reinit(&mut self) -> Result<(), Error> {
		log::debug!("{}: reinitializing", self.backend.name());
		self.backend.finalize();
		self.backend.init()
	}
}

impl<B: GeevBackend + ?Sized> core::fmt::Debug for Session<'_, B> {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("Session").field("backend", &self.backend.name()).finish()
	}
}

impl<B: GeevBackend + ?Sized> Drop for Session<'_, B> {
	fn drop(&mut self) {
		self.backend.finalize();
		log::debug!("{}: session closed", self.backend.name());
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use std::sync::atomic::{AtomicBool, Ordering};
	use std::sync::Arc;
	use std::time::Duration;

	/// backend that only tracks its lifecycle
	#[derive(Default)]
	pub struct Lifecycle {
		pub ready: bool,
		pub inits: usize,
		pub finalizes: usize,
		pub fail_init: bool,
	}

	impl GeevBackend for Lifecycle {
		fn name(&self) -> &str {
			"lifecycle"
		}

		fn init(&mut self) -> Result<(), Error> {
			self.inits += 1;
			if self.fail_init {
				return Err(Error::BackendNotReady);
			}
			self.ready = true;
			Ok(())
		}

		fn finalize(&mut self) {
			if self.ready {
				self.finalizes += 1;
			}
			self.ready = false;
		}

		fn is_initialized(&self) -> bool {
			self.ready
		}

		fn geqrf_nb(&self, _: DType, _: usize, _: usize) -> Result<usize, Error> {
			Ok(1)
		}

		fn sgeev(&mut self, _: Job, _: Job, _: &mut GeevBuffers<f32>) -> Result<i32, Error> {
			Ok(0)
		}

		fn dgeev(&mut self, _: Job, _: Job, _: &mut GeevBuffers<f64>) -> Result<i32, Error> {
			Ok(0)
		}

		fn cgeev(&mut self, _: Job, _: Job, _: &mut GeevBuffers<Complex32>) -> Result<i32, Error> {
			Ok(0)
		}

		fn zgeev(&mut self, _: Job, _: Job, _: &mut GeevBuffers<Complex64>) -> Result<i32, Error> {
			Ok(0)
		}
	}

	#[test]
	fn test_session_lifecycle() {
		let mut backend = Lifecycle::default();
		{
			let session = Session::open(&mut backend).unwrap();
			assert!(session.backend().is_initialized());
		}
		assert!(!backend.ready);
		assert_eq!(backend.inits, 1);
		assert_eq!(backend.finalizes, 1);
	}

	#[test]
	fn test_session_init_failure() {
		let mut backend = Lifecycle {
			fail_init: true,
			..Default::default()
		};
		assert!(matches!(Session::open(&mut backend), Err(Error::BackendNotReady)));
		assert!(!backend.ready);

		// the lock was released
		backend.fail_init = false;
		let session = Session::open(&mut backend).unwrap();
		drop(session);
		assert_eq!(backend.finalizes, 1);
	}

	#[test]
	fn test_session_serialized() {
		let mut first = Lifecycle::default();
		let session = Session::open(&mut first).unwrap();

		let opened = Arc::new(AtomicBool::new(false));
		let handle = std::thread::spawn({
			let opened = opened.clone();
			move || {
				let mut second = Lifecycle::default();
				let _session = Session::open(&mut second).unwrap();
				opened.store(true, Ordering::SeqCst);
			}
		});

		std::thread::sleep(Duration::from_millis(50));
		assert!(!opened.load(Ordering::SeqCst));
		drop(session);
		handle.join().unwrap();
		assert!(opened.load(Ordering::SeqCst));
	}

	#[test]
	fn test_buffers() {
		let ws = crate::workspace::plan(&Lifecycle { ready: true, ..Default::default() }, DType::C64, 3).unwrap();
		let buffers = GeevBuffers::<Complex64>::new(vec![Complex64::new(0.0, 0.0); 9], &ws);
		assert_eq!(buffers.w.len(), 3);
		assert_eq!(buffers.wi.len(), 0);
		assert_eq!(buffers.vl.len(), 1);
		assert_eq!(buffers.vr.len(), 9);
		assert_eq!(buffers.work.len(), 3 * 3);
		assert_eq!(buffers.rwork.len(), 6);
		assert_eq!(buffers.ldvl(), 1);
		assert_eq!(buffers.ldvr(), 3);

		let ws = crate::workspace::plan(&Lifecycle { ready: true, ..Default::default() }, DType::F32, 3).unwrap();
		let buffers = GeevBuffers::<f32>::new(vec![0.0; 9], &ws);
		assert_eq!(buffers.wi.len(), 3);
		assert_eq!(buffers.rwork.len(), 0);
	}

	#[test]
	fn test_buffers_check() {
		let backend = Lifecycle {
			ready: true,
			..Default::default()
		};

		let ws = crate::workspace::plan(&backend, DType::F64, 3).unwrap();
		let buffers = GeevBuffers::<f64>::new(vec![0.0; 9], &ws);
		assert_eq!(buffers.check(), Ok(()));

		let mut short = buffers.clone();
		short.vr.clear();
		assert_eq!(
			short.check(),
			Err(Error::InvalidDimension {
				nrows: 3,
				ncols: 3,
				len: Some(0)
			})
		);

		let mut short = buffers.clone();
		short.wi.truncate(2);
		assert!(short.check().is_err());

		let mut short = buffers.clone();
		short.a.pop();
		assert!(short.check().is_err());

		let mut short = buffers;
		short.vl.clear();
		assert!(short.check().is_err());

		let ws = crate::workspace::plan(&backend, DType::C32, 3).unwrap();
		let buffers = GeevBuffers::<Complex32>::new(vec![Complex32::new(0.0, 0.0); 9], &ws);
		assert_eq!(buffers.check(), Ok(()));

		let mut short = buffers.clone();
		short.rwork.truncate(5);
		assert!(short.check().is_err());

		let mut short = buffers;
		short.work.truncate(2);
		assert!(short.check().is_err());
	}
}
