//! Raster element trait for generic cell values

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Trait for types that can be stored in a raster cell.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Sentinel used when a raster is created without an explicit one
    fn default_nodata() -> Self;

    /// Check if this value matches the no-data sentinel
    fn is_nodata(&self, nodata: Self) -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_raster_element_int {
    ($t:ty) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::MIN
            }

            fn is_nodata(&self, nodata: Self) -> bool {
                *self == nodata
            }
        }
    };
}

// NaN always counts as no-data for floats, whatever the sentinel is.
macro_rules! impl_raster_element_float {
    ($t:ty) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Self) -> bool {
                if self.is_nan() {
                    return true;
                }
                !nodata.is_nan() && (self - nodata).abs() <= <$t>::EPSILON * 100.0
            }
        }
    };
}

impl_raster_element_int!(i8);
impl_raster_element_int!(i16);
impl_raster_element_int!(i32);
impl_raster_element_int!(i64);
impl_raster_element_int!(u8);
impl_raster_element_int!(u16);
impl_raster_element_int!(u32);
impl_raster_element_int!(u64);
impl_raster_element_float!(f32);
impl_raster_element_float!(f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_nodata() {
        assert!(f64::NAN.is_nodata(-9999.0));
        assert!((-9999.0f64).is_nodata(-9999.0));
        assert!(!1.0f64.is_nodata(f64::NAN));
        assert!(f32::default_nodata().is_nan());
    }

    #[test]
    fn int_nodata() {
        assert!(0u8.is_nodata(0));
        assert!(!1u8.is_nodata(0));
        assert_eq!(i16::default_nodata(), i16::MIN);
        assert_eq!(7i32.to_f64(), Some(7.0));
    }
}
