use async_trait::async_trait;

use crate::errors::UpstreamResult;
use crate::models::Province;

/// Fetches the full administrative-division tree
#[async_trait]
pub trait DivisionSource: Send + Sync {
    /// Retrieve every province with its nested districts (and wards, depending on depth)
    ///
    /// An empty list is a valid result. Implementations do not retry.
    async fn fetch(&self) -> UpstreamResult<Vec<Province>>;

    /// Endpoint description used in log lines
    fn describe(&self) -> String;
}
