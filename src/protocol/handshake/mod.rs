pub mod keyschedule;
pub mod wire;
