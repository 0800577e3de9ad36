pub mod field_counter;
pub mod general;
pub mod productivity;
pub mod progress;
pub mod response;
pub mod types;

pub use field_counter::count_fields;
pub use general::general_info;
pub use productivity::{bucket_records, productivity, productivity_at, ProductivityWindow};
pub use progress::{progress_percent, projects_progress};
pub use response::{ApiResponse, ErrorResponse};
pub use types::*;
