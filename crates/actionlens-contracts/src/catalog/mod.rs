mod registry;
mod samples;

pub use registry::{humanize_action, ActionCatalog, ActionSpec, FALLBACK_GLYPH};
pub use samples::{find_sample, SampleImage, SAMPLE_IMAGES};
