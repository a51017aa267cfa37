//! List command handler

use anyhow::{Context, Result};

use driftpad_core::{CacheStore, Config, SqliteCache};

use crate::output::Output;

/// List documents held in the local cache
pub fn list(config: &Config, output: &Output) -> Result<()> {
    let cache = SqliteCache::open(config).context("Failed to open local cache")?;

    let docs: Vec<_> = cache
        .list_ids()?
        .into_iter()
        .map(|id| {
            let doc = cache.read(&id);
            (id, doc)
        })
        .collect();

    output.print_documents(&docs);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use driftpad_core::{Document, DocumentId};
    use tempfile::TempDir;

    use crate::output::OutputFormat;

    #[test]
    fn test_list_reads_cache() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };

        {
            let cache = SqliteCache::open(&config).unwrap();
            let mut doc = Document::new(DocumentId::parse("listed").unwrap(), "hello");
            doc.touch(Utc::now());
            cache.write(&doc).unwrap();
        }

        let output = Output::new(OutputFormat::Quiet);
        list(&config, &output).unwrap();
    }
}
