pub mod f32;
pub mod io;
pub mod resize;
pub mod traits;
pub mod u8;
pub mod vec3;

pub use self::f32::ImageF32;
pub use self::resize::{resize_bilinear, sample_bilinear_clamped};
pub use self::traits::{ImageView, ImageViewMut, Rows};
pub use self::u8::ImageU8;
pub use self::vec3::ImageVec3;
