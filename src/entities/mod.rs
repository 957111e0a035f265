pub mod report;
pub mod video;

pub use report::Entity as Report;
pub use video::Entity as Video;

pub mod prelude;
