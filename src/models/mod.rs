pub mod account;
pub mod diagnosis;
pub mod enums;
pub mod patient;
pub mod visit;

pub use account::*;
pub use diagnosis::*;
pub use patient::*;
pub use visit::*;
