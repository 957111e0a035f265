pub use super::report::{Entity as Report, ImageStatus};
pub use super::video::{Entity as Video, VideoStatus};
