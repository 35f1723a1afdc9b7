pub mod frame;
pub mod job;
pub mod ocr_frame;
pub mod search;
pub mod video;

pub use frame::*;
pub use job::*;
pub use ocr_frame::*;
pub use search::*;
pub use video::*;
