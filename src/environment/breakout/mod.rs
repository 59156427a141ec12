pub mod algebra_2d;
pub mod mechanics;
pub mod observation;
