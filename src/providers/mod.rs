// Concrete airline adapters

pub mod jetblue;
pub mod southwest;
pub mod united;

pub use jetblue::JetBlue;
pub use southwest::Southwest;
pub use united::United;
