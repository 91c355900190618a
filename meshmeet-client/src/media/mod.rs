mod constraints;
mod devices;
mod manager;
mod recorder;
mod track;

pub use constraints::*;
pub use devices::*;
pub use manager::*;
pub use recorder::*;
pub use track::*;
