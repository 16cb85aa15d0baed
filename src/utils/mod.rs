pub mod form;
pub mod images;

pub use form::{FormData, UploadedFile};
pub use images::ImageStore;
