#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

#[doc(inline)]
pub use nbv_3d as k3d;

#[doc(inline)]
pub use nbv_render as render;

#[doc(inline)]
pub use nbv_planner as planner;
