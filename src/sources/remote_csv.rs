//! Sources that already publish CSV over HTTP

use crate::export::{SourceContext, Table};
use crate::sources::Source;
use anyhow::{anyhow, Result};

/// A CSV endpoint; the body is re-quoted and gets the classification column
pub struct RemoteCsv {
    name: &'static str,
    url: &'static str,
    file_name: &'static str,
}

impl RemoteCsv {
    pub fn new(name: &'static str, url: &'static str, file_name: &'static str) -> Self {
        RemoteCsv { name, url, file_name }
    }
}

impl Source for RemoteCsv {
    fn name(&self) -> &'static str {
        self.name
    }

    fn produce(&self, ctx: &SourceContext) -> Result<Vec<Table>> {
        let content = ctx
            .fetch(self.url)
            .ok_or_else(|| anyhow!("Failed to fetch {} data", self.name))?;
        Ok(vec![Table::csv(self.file_name, content)])
    }
}
