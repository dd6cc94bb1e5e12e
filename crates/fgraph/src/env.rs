use std::env;
use std::sync::OnceLock;

static FGRAPH_OPTIMIZER_VERBOSE: OnceLock<bool> = OnceLock::new();
static FGRAPH_PROFILE: OnceLock<bool> = OnceLock::new();
static FGRAPH_MAX_IMPORT_DEPTH: OnceLock<usize> = OnceLock::new();

pub(crate) const DEFAULT_MAX_IMPORT_DEPTH: usize = 10_000;

fn parse_bool(value: &str) -> bool {
    let normalized = value.trim().to_ascii_lowercase();
    matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
}

fn read_flag(cell: &OnceLock<bool>, name: &str) -> bool {
    *cell.get_or_init(|| match env::var(name) {
        Ok(value) if !value.trim().is_empty() => parse_bool(&value),
        _ => false,
    })
}

pub(crate) fn optimizer_verbose() -> bool {
    read_flag(&FGRAPH_OPTIMIZER_VERBOSE, "FGRAPH_OPTIMIZER_VERBOSE")
}

pub(crate) fn profile_enabled() -> bool {
    read_flag(&FGRAPH_PROFILE, "FGRAPH_PROFILE")
}

pub(crate) fn max_import_depth() -> usize {
    *FGRAPH_MAX_IMPORT_DEPTH.get_or_init(|| {
        env::var("FGRAPH_MAX_IMPORT_DEPTH")
            .ok()
            .and_then(|value| value.trim().parse::<usize>().ok())
            .filter(|depth| *depth > 0)
            .unwrap_or(DEFAULT_MAX_IMPORT_DEPTH)
    })
}
