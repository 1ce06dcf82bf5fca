//! Precision dispatch.
//!
//! Maps an element type, either known statically through [`Element`] or only at runtime
//! through [`DType`], to one of the four `geev` variants and the buffer-layout rules that
//! come with it.

use crate::backend::{GeevBackend, GeevBuffers, Job};
use crate::Error;
use core::fmt::Debug;
use num_complex::{Complex, Complex32, Complex64};
use num_traits::{Float, Zero};
use serde::{Deserialize, Serialize};

/// element type of a dense matrix
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
	/// 32-bit floating point
	F32,
	/// 64-bit floating point
	F64,
	/// 32-bit complex floating point
	C32,
	/// 64-bit complex floating point
	C64,
}

/// backend entry point selected for an element type
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Routine {
	/// real single precision
	Sgeev,
	/// real double precision
	Dgeev,
	/// complex single precision
	Cgeev,
	/// complex double precision
	Zgeev,
}

/// buffer-layout rules of one `geev` variant
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TypeDescriptor {
	/// entry point to call
	pub routine: Routine,
	/// eigenvalues come back as two parallel real arrays `wr`, `wi` instead of one complex
	/// array `w`
	pub split_eigenvalues: bool,
	/// an auxiliary real scratch array `rwork` of length `2n` is required
	pub needs_rwork: bool,
}

impl DType {
	/// all supported element types
	pub const ALL: [DType; 4] = [DType::F32, DType::F64, DType::C32, DType::C64];

	/// parses an element type tag.
	///
	/// accepts the LAPACK prefix characters (`s`, `d`, `c`, `z`) as well as the usual type
	/// names (`f32`, `float64`, `complex128`, ...), ignoring case.
	pub fn from_tag(tag: &str) -> Result<Self, Error> {
		let lower = tag.trim().to_ascii_lowercase();
		Ok(match &*lower {
			"s" | "f32" | "float32" | "single" => DType::F32,
			"d" | "f64" | "float64" | "double" => DType::F64,
			"c" | "c32" | "complex64" => DType::C32,
			"z" | "c64" | "complex128" => DType::C64,
			_ => return Err(Error::UnsupportedType(tag.to_owned())),
		})
	}

	/// resolves the element type of `T` at runtime
	pub fn of<T: 'static>() -> Result<Self, Error> {
		if coe::is_same::<T, f32>() {
			Ok(DType::F32)
		} else if coe::is_same::<T, f64>() {
			Ok(DType::F64)
		} else if coe::is_same::<T, Complex32>() {
			Ok(DType::C32)
		} else if coe::is_same::<T, Complex64>() {
			Ok(DType::C64)
		} else {
			Err(Error::UnsupportedType(core::any::type_name::<T>().to_owned()))
		}
	}

	/// LAPACK prefix character
	#[inline]
	pub const fn prefix(self) -> char {
		match self {
			DType::F32 => 's',
			DType::F64 => 'd',
			DType::C32 => 'c',
			DType::C64 => 'z',
		}
	}

	#[inline]
	pub const fn is_complex(self) -> bool {
		matches!(self, DType::C32 | DType::C64)
	}

	#[inline]
	pub const fn is_single(self) -> bool {
		matches!(self, DType::F32 | DType::C32)
	}

	/// buffer-layout rules and entry point for this element type
	#[inline]
	pub const fn descriptor(self) -> TypeDescriptor {
		let routine = match self {
			DType::F32 => Routine::Sgeev,
			DType::F64 => Routine::Dgeev,
			DType::C32 => Routine::Cgeev,
			DType::C64 => Routine::Zgeev,
		};
		TypeDescriptor {
			routine,
			split_eigenvalues: !self.is_complex(),
			needs_rwork: self.is_complex(),
		}
	}
}

impl core::str::FromStr for DType {
	type Err = Error;

	#[inline]
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::from_tag(s)
	}
}

impl core::fmt::Display for DType {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.write_str(match self {
			DType::F32 => "f32",
			DType::F64 => "f64",
			DType::C32 => "c32",
			DType::C64 => "c64",
		})
	}
}

impl Routine {
	/// symbol name of the routine, without any library prefix
	#[inline]
	pub const fn name(self) -> &'static str {
		match self {
			Routine::Sgeev => "sgeev",
			Routine::Dgeev => "dgeev",
			Routine::Cgeev => "cgeev",
			Routine::Zgeev => "zgeev",
		}
	}
}

/// element type supported by the eigensolver.
///
/// this trait is sealed, it is implemented for `f32`, `f64`, `Complex32` and `Complex64`.
pub trait Element: Copy + Debug + PartialEq + Zero + Send + Sync + 'static + crate::seal::Seal {
	/// real type of the same precision
	type Real: Float + Debug + Send + Sync + 'static;

	/// runtime tag of `Self`
	const DTYPE: DType;

	/// layout rules of `Self`, equal to `Self::DTYPE.descriptor()`
	const DESCRIPTOR: TypeDescriptor = Self::DTYPE.descriptor();

	/// widens `self` to a complex number of the same precision
	fn to_complex(self) -> Complex<Self::Real>;

	/// routes the call to the `geev` entry point matching `Self`
	fn call_geev<B: GeevBackend + ?Sized>(
		backend: &mut B,
		jobvl: Job,
		jobvr: Job,
		buffers: &mut GeevBuffers<Self>,
	) -> Result<i32, Error>;
}

macro_rules! impl_real {
	($ty: ty, $dtype: ident, $geev: ident) => {
		impl Element for $ty {
			type Real = $ty;

			const DTYPE: DType = DType::$dtype;

			#[inline]
			fn to_complex(self) -> Complex<$ty> {
				Complex::new(self, 0.0)
			}

			#[inline]
			fn call_geev<B: GeevBackend + ?Sized>(
				backend: &mut B,
				jobvl: Job,
				jobvr: Job,
				buffers: &mut GeevBuffers<Self>,
			) -> Result<i32, Error> {
				backend.$geev(jobvl, jobvr, buffers)
			}
		}
	};
}

macro_rules! impl_cplx {
	($ty: ty, $real: ty, $dtype: ident, $geev: ident) => {
		impl Element for $ty {
			type Real = $real;

			const DTYPE: DType = DType::$dtype;

			#[inline]
			fn to_complex(self) -> Complex<$real> {
				self
			}

			#[inline]
			fn call_geev<B: GeevBackend + ?Sized>(
				backend: &mut B,
				jobvl: Job,
				jobvr: Job,
				buffers: &mut GeevBuffers<Self>,
			) -> Result<i32, Error> {
				backend.$geev(jobvl, jobvr, buffers)
			}
		}
	};
}

impl_real!(f32, F32, sgeev);
impl_real!(f64, F64, dgeev);
impl_cplx!(Complex32, f32, C32, cgeev);
impl_cplx!(Complex64, f64, C64, zgeev);

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_from_tag() {
		assert_eq!(DType::from_tag("s"), Ok(DType::F32));
		assert_eq!(DType::from_tag("d"), Ok(DType::F64));
		assert_eq!(DType::from_tag("c"), Ok(DType::C32));
		assert_eq!(DType::from_tag("z"), Ok(DType::C64));
		assert_eq!(DType::from_tag("Float64"), Ok(DType::F64));
		assert_eq!(DType::from_tag(" complex128 "), Ok(DType::C64));
		assert_eq!("single".parse::<DType>(), Ok(DType::F32));

		for tag in ["h", "f16", "i32", "", "complex256"] {
			assert_eq!(DType::from_tag(tag), Err(Error::UnsupportedType(tag.to_owned())));
		}
	}

	#[test]
	fn test_of() {
		assert_eq!(DType::of::<f32>(), Ok(DType::F32));
		assert_eq!(DType::of::<f64>(), Ok(DType::F64));
		assert_eq!(DType::of::<Complex32>(), Ok(DType::C32));
		assert_eq!(DType::of::<Complex64>(), Ok(DType::C64));

		assert!(matches!(DType::of::<i32>(), Err(Error::UnsupportedType(_))));
		assert!(matches!(DType::of::<Complex<i64>>(), Err(Error::UnsupportedType(_))));
	}

	#[test]
	fn test_descriptor() {
		for dtype in DType::ALL {
			let desc = dtype.descriptor();
			assert_eq!(desc.split_eigenvalues, !dtype.is_complex());
			assert_eq!(desc.needs_rwork, dtype.is_complex());
			assert_eq!(desc.routine.name().chars().next(), Some(dtype.prefix()));
		}

		assert_eq!(<f64 as Element>::DESCRIPTOR.routine, Routine::Dgeev);
		assert_eq!(<Complex32 as Element>::DESCRIPTOR.routine, Routine::Cgeev);
		assert!(<Complex64 as Element>::DESCRIPTOR.needs_rwork);
		assert!(<f32 as Element>::DESCRIPTOR.split_eigenvalues);
	}
}
