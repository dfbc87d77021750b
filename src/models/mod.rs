pub mod appointment;
pub mod enums;
pub mod file;
pub mod patient;
pub mod practice;
pub mod staff;

pub use appointment::*;
pub use enums::*;
pub use file::*;
pub use patient::*;
pub use practice::*;
pub use staff::*;
