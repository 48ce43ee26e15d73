use docset_engine::{PipelineEvent, ProgressSink};
use engine_logging::{engine_info, engine_warn};

/// Reports pipeline progress through the logger.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: PipelineEvent) {
        match event {
            PipelineEvent::EntriesExtracted { pages, entries } => {
                engine_info!("{} entries from {} pages", entries, pages);
            }
            PipelineEvent::PageLocalized {
                path,
                successful,
                failed,
            } => {
                if failed > 0 {
                    engine_warn!("{}: {} images localized, {} failed", path, successful, failed);
                } else {
                    engine_info!("{}: {} images localized", path, successful);
                }
            }
            PipelineEvent::PageFailed { path, message } => {
                engine_warn!("{}: {}", path, message);
            }
            PipelineEvent::Finished {
                entries,
                images_total,
                images_failed,
            } => {
                engine_info!(
                    "Finished: {} entries, {} images ({} failed)",
                    entries,
                    images_total,
                    images_failed
                );
            }
        }
    }
}
