pub mod metadata;
pub mod summary;

pub use metadata::{
    campaign_dir, read_metadata, schema_file_name, write_metadata, CampaignMetadata, CampaignResult, ImageRecord,
    JobFailure, METADATA_FILE_NAME, METADATA_SCHEMA_VERSION,
};
pub use summary::{now_utc_iso, write_summary, AssetStatus, CampaignSummary};
