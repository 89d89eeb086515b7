pub mod normalize;
pub mod source;
pub mod types;

pub use normalize::normalize_rows;
pub use source::{CampaignSource, FileCampaignSource, HttpJsonCampaignSource};
pub use types::{IngestReport, RawCampaignRow, RawField};
