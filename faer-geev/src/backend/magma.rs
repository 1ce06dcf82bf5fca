//! gpu backend, loaded from `libmagma` at runtime.

use super::{GeevBackend, GeevBuffers, Job};
use crate::{DType, Error};
use libloading::Library;
use num_complex::{Complex32, Complex64};
use std::ffi::c_int;
use std::path::Path;

/// `magma_int_t` of an LP64 build
type MagmaInt = c_int;

const MAGMA_SUCCESS: MagmaInt = 0;
const MAGMA_NO_VEC: c_int = 301;
const MAGMA_VEC: c_int = 302;

type StateFn = unsafe extern "C" fn() -> MagmaInt;
type NbFn = unsafe extern "C" fn(m: MagmaInt, n: MagmaInt) -> MagmaInt;

type RealGeevFn<T> = unsafe extern "C" fn(
	jobvl: c_int,
	jobvr: c_int,
	n: MagmaInt,
	a: *mut T,
	lda: MagmaInt,
	wr: *mut T,
	wi: *mut T,
	vl: *mut T,
	ldvl: MagmaInt,
	vr: *mut T,
	ldvr: MagmaInt,
	work: *mut T,
	lwork: MagmaInt,
	info: *mut MagmaInt,
) -> MagmaInt;

type CplxGeevFn<T, R> = unsafe extern "C" fn(
	jobvl: c_int,
	jobvr: c_int,
	n: MagmaInt,
	a: *mut T,
	lda: MagmaInt,
	w: *mut T,
	vl: *mut T,
	ldvl: MagmaInt,
	vr: *mut T,
	ldvr: MagmaInt,
	work: *mut T,
	lwork: MagmaInt,
	rwork: *mut R,
	info: *mut MagmaInt,
) -> MagmaInt;

#[derive(Copy, Clone)]
struct Api {
	init: StateFn,
	finalize: StateFn,
	sgeqrf_nb: NbFn,
	dgeqrf_nb: NbFn,
	cgeqrf_nb: NbFn,
	zgeqrf_nb: NbFn,
	sgeev: RealGeevFn<f32>,
	dgeev: RealGeevFn<f64>,
	cgeev: CplxGeevFn<Complex32, f32>,
	zgeev: CplxGeevFn<Complex64, f64>,
}

/// MAGMA's blocked `geev` routines.
///
/// `magmaFloatComplex` and `magmaDoubleComplex` have the same layout as [`Complex32`] and
/// [`Complex64`], so complex buffers are passed as-is.
pub struct MagmaBackend {
	api: Api,
	path: String,
	ready: bool,
	// keeps the function pointers in `api` valid
	_library: Library,
}

impl core::fmt::Debug for MagmaBackend {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("MagmaBackend")
			.field("path", &self.path)
			.field("ready", &self.ready)
			.finish_non_exhaustive()
	}
}

fn platform_lib_name(name: &str) -> String {
	if cfg!(target_os = "windows") {
		format!("{name}.dll")
	} else if cfg!(target_os = "macos") {
		format!("lib{name}.dylib")
	} else {
		format!("lib{name}.so")
	}
}

/// # safety
/// `F` must match the signature of the symbol `name`.
unsafe fn symbol<F: Copy>(library: &Library, path: &str, name: &str) -> Result<F, Error> {
	let mut c_name = Vec::with_capacity(name.len() + 1);
	c_name.extend_from_slice(name.as_bytes());
	c_name.push(0);

	library
		.get::<F>(&c_name)
		.map(|sym| *sym)
		.map_err(|e| Error::BackendUnavailable(format!("symbol `{name}` not found in `{path}`: {e}")))
}

#[inline]
fn vec_code(job: Job) -> c_int {
	match job {
		Job::NoVectors => MAGMA_NO_VEC,
		Job::Vectors => MAGMA_VEC,
	}
}

#[inline]
fn to_int(value: usize, n: usize) -> Result<MagmaInt, Error> {
	MagmaInt::try_from(value).map_err(|_| Error::invalid_dimension(n, n))
}

impl MagmaBackend {
	/// loads `libmagma`, either from `path` or by platform library name.
	///
	/// # errors
	/// returns [`Error::BackendUnavailable`] if the library or one of its symbols cannot be
	/// found.
	pub fn load(path: Option<&Path>) -> Result<Self, Error> {
		let path = match path {
			Some(path) => path.display().to_string(),
			None => platform_lib_name("magma"),
		};

		// SAFETY: loading MAGMA runs no initialization routine with preconditions
		let library = unsafe { Library::new(&path) }
			.map_err(|e| Error::BackendUnavailable(format!("failed to load `{path}`: {e}")))?;

		// SAFETY: the signatures match the MAGMA 2.x headers
		let api = unsafe {
			Api {
				init: symbol(&library, &path, "magma_init")?,
				finalize: symbol(&library, &path, "magma_finalize")?,
				sgeqrf_nb: symbol(&library, &path, "magma_get_sgeqrf_nb")?,
				dgeqrf_nb: symbol(&library, &path, "magma_get_dgeqrf_nb")?,
				cgeqrf_nb: symbol(&library, &path, "magma_get_cgeqrf_nb")?,
				zgeqrf_nb: symbol(&library, &path, "magma_get_zgeqrf_nb")?,
				sgeev: symbol(&library, &path, "magma_sgeev")?,
				dgeev: symbol(&library, &path, "magma_dgeev")?,
				cgeev: symbol(&library, &path, "magma_cgeev")?,
				zgeev: symbol(&library, &path, "magma_zgeev")?,
			}
		};

		log::debug!("magma: loaded `{path}`");
		Ok(Self {
			api,
			path,
			ready: false,
			_library: library,
		})
	}

	/// path the library was loaded from
	#[inline]
	pub fn path(&self) -> &str {
		&self.path
	}

	fn check_ready(&self) -> Result<(), Error> {
		if self.ready {
			Ok(())
		} else {
			Err(Error::BackendNotReady)
		}
	}
}

macro_rules! real_geev {
	($name: ident, $ty: ty) => {
		fn $name(&mut self, jobvl: Job, jobvr: Job, b: &mut GeevBuffers<$ty>) -> Result<i32, Error> {
			self.check_ready()?;
			b.check()?;
			let n = b.n;
			let n_ = to_int(n, n)?;
			let lda = to_int(b.lda(), n)?;
			let ldvl = to_int(b.ldvl(), n)?;
			let ldvr = to_int(b.ldvr(), n)?;
			let lwork = to_int(b.work.len(), n)?;
			let mut info: MagmaInt = 0;

			// SAFETY: `check` verified every buffer is long enough for an `n×n` solve
			unsafe {
				(self.api.$name)(
					vec_code(jobvl),
					vec_code(jobvr),
					n_,
					b.a.as_mut_ptr(),
					lda,
					b.w.as_mut_ptr(),
					b.wi.as_mut_ptr(),
					b.vl.as_mut_ptr(),
					ldvl,
					b.vr.as_mut_ptr(),
					ldvr,
					b.work.as_mut_ptr(),
					lwork,
					&mut info,
				);
			}
			Ok(info)
		}
	};
}

macro_rules! cplx_geev {
	($name: ident, $ty: ty) => {
		fn $name(&mut self, jobvl: Job, jobvr: Job, b: &mut GeevBuffers<$ty>) -> Result<i32, Error> {
			self.check_ready()?;
			b.check()?;
			let n = b.n;
			let n_ = to_int(n, n)?;
			let lda = to_int(b.lda(), n)?;
			let ldvl = to_int(b.ldvl(), n)?;
			let ldvr = to_int(b.ldvr(), n)?;
			let lwork = to_int(b.work.len(), n)?;
			let mut info: MagmaInt = 0;

			// SAFETY: `check` verified every buffer is long enough for an `n×n` solve
			unsafe {
				(self.api.$name)(
					vec_code(jobvl),
					vec_code(jobvr),
					n_,
					b.a.as_mut_ptr(),
					lda,
					b.w.as_mut_ptr(),
					b.vl.as_mut_ptr(),
					ldvl,
					b.vr.as_mut_ptr(),
					ldvr,
					b.work.as_mut_ptr(),
					lwork,
					b.rwork.as_mut_ptr(),
					&mut info,
				);
			}
			Ok(info)
		}
	};
}

impl GeevBackend for MagmaBackend {
	#[inline]
	fn name(&self) -> &str {
		"magma"
	}

	fn init(&mut self) -> Result<(), Error> {
		if self.ready {
			return Ok(());
		}
		// SAFETY: no preconditions
		let status = unsafe { (self.api.init)() };
		if status != MAGMA_SUCCESS {
			log::warn!("magma: magma_init returned {status}");
			return Err(Error::BackendNotReady);
		}
		self.ready = true;
		Ok(())
	}

	fn finalize(&mut self) {
		if !self.ready {
			return;
		}
		// SAFETY: paired with a successful `magma_init`
		let status = unsafe { (self.api.finalize)() };
		if status != MAGMA_SUCCESS {
			log::warn!("magma: magma_finalize returned {status}");
		}
		self.ready = false;
	}

	#[inline]
	fn is_initialized(&self) -> bool {
		self.ready
	}

	fn geqrf_nb(&self, dtype: DType, m: usize, n: usize) -> Result<usize, Error> {
		self.check_ready()?;
		let (m_, n_) = (to_int(m, n)?, to_int(n, n)?);
		let f = match dtype {
			DType::F32 => self.api.sgeqrf_nb,
			DType::F64 => self.api.dgeqrf_nb,
			DType::C32 => self.api.cgeqrf_nb,
			DType::C64 => self.api.zgeqrf_nb,
		};
		// SAFETY: pure query
		let nb = unsafe { f(m_, n_) };
		Ok(usize::try_from(nb).unwrap_or(0).max(1))
	}

	real_geev!(sgeev, f32);
	real_geev!(dgeev, f64);
	cplx_geev!(cgeev, Complex32);
	cplx_geev!(zgeev, Complex64);
}

impl Drop for MagmaBackend {
	fn drop(&mut self) {
		self.finalize();
	}
}
