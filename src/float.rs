#[cfg(use_f64)]
pub type Float = f64;

#[cfg(not(use_f64))]
pub type Float = f32;

#[cfg(use_f64)]
pub type FloatAsBits = u64;
#[cfg(not(use_f64))]
pub type FloatAsBits = u32;

/// Bit pattern of `f`, with -0.0 folded onto +0.0 so that values which
/// compare equal also produce equal bits. Used when hashing matrices.
pub fn float_to_bits(f: Float) -> FloatAsBits {
    let f = if f == 0.0 { 0.0 } else { f };
    f.to_bits()
}

pub fn bits_to_float(ui: FloatAsBits) -> Float {
    Float::from_bits(ui)
}
