//! New-item detection with adaptive range extension

use crate::config::ExtensionConfig;
use crate::crawler::source::CatalogSource;
use crate::state::Coverage;
use crate::FetchResult;
use std::collections::HashSet;

/// Result of one listing scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// Ids not in the seen set, oldest first
    pub new_ids: Vec<String>,

    /// Listing pages fetched successfully
    pub pages_scanned: u32,

    /// Depth the scan was allowed to reach after extensions
    pub final_depth: u32,

    /// The scan stopped at a page past the end of the catalog
    pub reached_end: bool,
}

impl Detection {
    /// How much of the catalog this scan covered
    pub fn coverage(&self) -> Coverage {
        if self.reached_end {
            Coverage::EndOfCatalog
        } else {
            Coverage::Pages(self.pages_scanned)
        }
    }
}

/// Walks listing pages front to back and diffs them against the seen set
#[derive(Debug, Clone)]
pub struct Detector {
    extension: ExtensionConfig,
    max_pages: u32,
}

impl Detector {
    pub fn new(extension: ExtensionConfig, max_pages: u32) -> Self {
        Self {
            extension,
            max_pages,
        }
    }

    /// Depth after a new id was found on `page`, never beyond `max_pages`
    pub fn extended_depth(&self, depth: u32, page: u32) -> u32 {
        let reach = page
            .saturating_add(1)
            .saturating_add(self.extension.extension(page));
        depth.max(reach).min(self.max_pages)
    }

    /// Scans pages `0..depth`, extending `depth` whenever a new id appears
    ///
    /// A `NotFound` listing page ends the scan normally. Any other fetch
    /// error aborts it.
    pub async fn detect<S: CatalogSource + ?Sized>(
        &self,
        source: &S,
        seen: &HashSet<String>,
        depth: u32,
    ) -> FetchResult<Detection> {
        let mut depth = depth.min(self.max_pages);
        let mut page = 0;
        let mut reached_end = false;
        let mut sighted: HashSet<String> = HashSet::new();
        let mut discovered = Vec::new();

        while page < depth {
            let ids = match source.fetch_listing_page(page).await {
                Ok(ids) => ids,
                Err(e) if e.is_not_found() => {
                    tracing::debug!("Listing page {} is past the end of the catalog", page);
                    reached_end = true;
                    break;
                }
                Err(e) => return Err(e),
            };

            let mut fresh = 0;
            for id in ids {
                if seen.contains(&id) || !sighted.insert(id.clone()) {
                    continue;
                }
                discovered.push(id);
                fresh += 1;

                let extended = self.extended_depth(depth, page);
                if extended > depth {
                    tracing::debug!(
                        "New entry on page {}, extending scan from {} to {} pages",
                        page,
                        depth,
                        extended
                    );
                    depth = extended;
                }
            }

            tracing::debug!("Page {}/{}: {} new entries", page + 1, depth, fresh);
            page += 1;
        }

        discovered.reverse();

        Ok(Detection {
            new_ids: discovered,
            pages_scanned: page,
            final_depth: depth,
            reached_end,
        })
    }
}
