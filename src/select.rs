//! Download selection: narrows the catalog to a bounded work list.

use std::collections::HashSet;

use crate::catalog::BookRecord;

/// Which slice of the catalog to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadMode {
    /// Only the first catalog entry.
    First,
    /// Entries whose id is not yet in the ledger, up to the batch cap.
    NotYetDownloaded,
    /// The whole catalog, up to the batch cap.
    All,
}

/// Selects the books to download for a mode.
///
/// Catalog order is preserved. `First` ignores the ledger and the cap;
/// the other modes are truncated to `batch_cap`, the only throttling the
/// downloader has.
#[must_use]
pub fn select<'a>(
    catalog: &'a [BookRecord],
    ledger: &HashSet<String>,
    mode: DownloadMode,
    batch_cap: usize,
) -> Vec<&'a BookRecord> {
    match mode {
        DownloadMode::First => catalog.first().into_iter().collect(),
        DownloadMode::NotYetDownloaded => catalog
            .iter()
            .filter(|book| !ledger.contains(&book.id))
            .take(batch_cap)
            .collect(),
        DownloadMode::All => catalog.iter().take(batch_cap).collect(),
    }
}
