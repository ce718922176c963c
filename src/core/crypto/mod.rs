pub mod prf;

pub use prf::Prf;
