//! Upstream source adapters
//!
//! Each adapter knows where one dataset lives and how to turn it into
//! [`Table`]s. Writing is shared: the runner pushes every table through the
//! same serializer.

pub mod repository;
pub mod remote_csv;
pub mod html;

use crate::export::{write_table, SourceContext, Table};
use anyhow::Result;
use tracing::{error, info, warn};

pub use html::{LolAd, LotWebhooks, LotsProject};
pub use remote_csv::RemoteCsv;
pub use repository::{FrontMatterRepository, LolC2, LolCerts, LotTunnels, YamlRepository};

/// Name of the basic lots-project source
pub const LOTS_PROJECT: &str = "lots_project";

/// Name of the lots-project source that also fetches detail pages
pub const LOTS_PROJECT_ADDITIONAL: &str = "lots_project_additional";

/// Every registered source name, in run order
pub const SOURCE_NAMES: [&str; 18] = [
    "bootloaders",
    "gtfobins",
    "hijacklibs",
    "lolapps",
    "lolc2",
    "loflcab",
    "lolad",
    "lolbas",
    "loldrivers",
    "lolrmm",
    "lottunnels",
    "lolcerts",
    "lolesxi",
    LOTS_PROJECT,
    LOTS_PROJECT_ADDITIONAL,
    "loobins",
    "lotwebhooks",
    "wadcoms",
];

/// An upstream dataset that can be exported to CSV
pub trait Source {
    /// Registry name, as accepted on the command line
    fn name(&self) -> &'static str;

    /// Fetch the upstream data and build the output tables
    fn produce(&self, ctx: &SourceContext) -> Result<Vec<Table>>;
}

/// All known sources, in run order
pub fn registry() -> Vec<Box<dyn Source>> {
    vec![
        Box::new(RemoteCsv::new(
            "bootloaders",
            "https://www.bootloaders.io/api/bootloaders.csv",
            "bootloaders.csv",
        )),
        Box::new(
            FrontMatterRepository::new(
                "gtfobins",
                "https://github.com/GTFOBins/GTFOBins.github.io",
                "_gtfobins",
                "gtfobins.csv",
            )
            .with_name_from_file(),
        ),
        Box::new(YamlRepository::new(
            "hijacklibs",
            "https://github.com/wietze/HijackLibs",
            "yml",
            "hijacklibs.csv",
        )),
        Box::new(YamlRepository::new(
            "lolapps",
            "https://github.com/LOLAPPS-Project/LOLAPPS",
            "yml",
            "lolapps.csv",
        )),
        Box::new(LolC2::default()),
        Box::new(YamlRepository::new(
            "loflcab",
            "https://github.com/LOFL-Project/LOFLCAB",
            "yml",
            "loflcab.csv",
        )),
        Box::new(LolAd),
        Box::new(
            YamlRepository::new(
                "lolbas",
                "https://github.com/LOLBAS-Project/LOLBAS",
                "yml",
                "lolbas.csv",
            )
            .excluding(&["HonorableMentions"]),
        ),
        Box::new(RemoteCsv::new(
            "loldrivers",
            "https://www.loldrivers.io/api/drivers.csv",
            "loldrivers.csv",
        )),
        Box::new(RemoteCsv::new(
            "lolrmm",
            "https://lolrmm.io/api/rmm_tools.csv",
            "lolrmm.csv",
        )),
        Box::new(LotTunnels::default()),
        Box::new(LolCerts::default()),
        Box::new(
            FrontMatterRepository::new(
                "lolesxi",
                "https://github.com/LOLESXi-Project/LOLESXi",
                "_lolesxi/Binaries",
                "lolesxi.csv",
            )
            .with_name_from_file(),
        ),
        Box::new(LotsProject::basic()),
        Box::new(LotsProject::extended()),
        Box::new(YamlRepository::new(
            "loobins",
            "https://github.com/infosecB/LOOBins",
            "LOOBins",
            "loobins.csv",
        )),
        Box::new(LotWebhooks),
        Box::new(
            FrontMatterRepository::new(
                "wadcoms",
                "https://github.com/WADComs/WADComs.github.io",
                "_wadcoms",
                "wadcoms.csv",
            )
            .with_name_from_file(),
        ),
    ]
}

/// Look up a registered source by name
pub fn find_source(name: &str) -> Option<Box<dyn Source>> {
    registry().into_iter().find(|source| source.name() == name)
}

/// Work out which sources to run.
///
/// Explicitly requested sources win over `all`. The extended flag swaps the
/// basic lots-project source for the one that also fetches detail pages;
/// without it the extended source cannot be requested.
pub fn resolve_selection(requested: &[String], all: bool, extended: bool) -> Vec<String> {
    let mut selected: Vec<String> = Vec::new();

    if !requested.is_empty() {
        for name in requested {
            if !selected.contains(name) {
                selected.push(name.clone());
            }
        }

        if extended && selected.iter().any(|n| n == LOTS_PROJECT) {
            selected.retain(|n| n != LOTS_PROJECT);
            push_unique(&mut selected, LOTS_PROJECT_ADDITIONAL);
        } else if !extended && selected.iter().any(|n| n == LOTS_PROJECT_ADDITIONAL) {
            warn!(
                "You cannot fetch '{}': add --additional-lots-project to fetch it",
                LOTS_PROJECT_ADDITIONAL
            );
            selected.retain(|n| n != LOTS_PROJECT_ADDITIONAL);
            push_unique(&mut selected, LOTS_PROJECT);
        }
    } else if all {
        let skipped = if extended { LOTS_PROJECT } else { LOTS_PROJECT_ADDITIONAL };
        selected = SOURCE_NAMES
            .iter()
            .filter(|name| **name != skipped)
            .map(|name| name.to_string())
            .collect();
    }

    selected
}

fn push_unique(selected: &mut Vec<String>, name: &str) {
    if !selected.iter().any(|n| n == name) {
        selected.push(name.to_string());
    }
}

/// Produce and write one source. Returns true when every table was written.
pub fn run_source(source: &dyn Source, ctx: &SourceContext) -> bool {
    info!("Starting {}", source.name());

    let tables = match source.produce(ctx) {
        Ok(tables) => tables,
        Err(e) => {
            error!(source = source.name(), "{:#}", e);
            return false;
        }
    };

    let mut all_written = true;
    for table in &tables {
        if let Err(e) = write_table(&ctx.config.output_dir, table) {
            error!(source = source.name(), file = table.file_name(), "{:#}", e);
            all_written = false;
        }
    }
    all_written
}

/// Run sources one after another; a failure never stops the rest.
///
/// Returns each source name with its outcome.
pub fn run_selected(names: &[String], ctx: &SourceContext) -> Vec<(String, bool)> {
    let mut outcomes = Vec::with_capacity(names.len());

    for name in names {
        let ok = match find_source(name) {
            Some(source) => run_source(source.as_ref(), ctx),
            None => {
                error!("Unknown source: {}", name);
                false
            }
        };
        if ok {
            info!("DONE {}", name);
        } else {
            error!("FAILED {}", name);
        }
        outcomes.push((name.clone(), ok));
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_registry_matches_names() {
        let registered: Vec<&str> = registry().iter().map(|s| s.name()).collect();
        assert_eq!(registered, SOURCE_NAMES.to_vec());
    }

    #[test]
    fn test_all_without_extended_uses_basic_lots() {
        let selected = resolve_selection(&[], true, false);
        assert_eq!(selected.len(), SOURCE_NAMES.len() - 1);
        assert!(selected.contains(&LOTS_PROJECT.to_string()));
        assert!(!selected.contains(&LOTS_PROJECT_ADDITIONAL.to_string()));
    }

    #[test]
    fn test_all_with_extended_uses_additional_lots() {
        let selected = resolve_selection(&[], true, true);
        assert!(!selected.contains(&LOTS_PROJECT.to_string()));
        assert!(selected.contains(&LOTS_PROJECT_ADDITIONAL.to_string()));
    }

    #[test]
    fn test_specific_sources_take_precedence() {
        let selected = resolve_selection(&names(&["lolbas", "gtfobins", "lolbas"]), true, false);
        assert_eq!(selected, names(&["lolbas", "gtfobins"]));
    }

    #[test]
    fn test_extended_swaps_lots_project() {
        let selected = resolve_selection(&names(&["lots_project", "lolad"]), false, true);
        assert_eq!(selected, names(&["lolad", "lots_project_additional"]));
    }

    #[test]
    fn test_additional_requires_extended_flag() {
        let selected = resolve_selection(&names(&["lots_project_additional"]), false, false);
        assert_eq!(selected, names(&["lots_project"]));
    }

    #[test]
    fn test_nothing_requested() {
        assert!(resolve_selection(&[], false, true).is_empty());
    }
}
