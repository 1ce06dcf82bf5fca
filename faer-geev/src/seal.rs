use num_complex::{Complex32, Complex64};

pub trait Seal {}

impl Seal for f32 {}
impl Seal for f64 {}
impl Seal for Complex32 {}
impl Seal for Complex64 {}
