mod request;
mod response;

pub use request::QlrQuery;
pub use response::{CollectionsResponse, HealthResponse};
