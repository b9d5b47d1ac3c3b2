use std::path::Path;

use anyhow::{Context, Result};

use leadlens_core::models::EnrichedRecord;

const HEADERS: [&str; 9] = [
    "Username",
    "Full Name",
    "Follower Count",
    "Profile URL",
    "Email",
    "Average Engagement",
    "Language",
    "Profile Picture",
    "Biography",
];

/// Writes the ordered record set as a CSV spreadsheet.
pub struct CsvExporter;

impl CsvExporter {
    /// Columns follow [`HEADERS`]; record order is preserved as
    /// given (the pipeline already sorted by engagement).
    pub fn write(path: &Path, records: &[EnrichedRecord]) -> Result<usize> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;

        writer.write_record(HEADERS)?;
        for record in records {
            writer.write_record([
                record.handle.as_str(),
                record.display_name.as_str(),
                record.follower_count.as_str(),
                record.profile_url.as_str(),
                record.contact_email.as_deref().unwrap_or(""),
                record.average_engagement.as_str(),
                record.detected_language.as_deref().unwrap_or(""),
                record.profile_image_ref.as_deref().unwrap_or(""),
                record.biography.as_str(),
            ])?;
        }
        writer.flush().context("Failed to flush CSV output")?;
        Ok(records.len())
    }
}
