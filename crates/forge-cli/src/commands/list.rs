//! List command - show the libraries a manifest describes

use super::load_manifest;
use anyhow::Result;
use forge_config::{LibraryConfig, Manifest};
use std::path::PathBuf;

/// List command arguments
pub struct ListArgs {
    pub manifest: PathBuf,
    /// Only optional libraries, grouped
    pub optional: bool,
}

/// Run the list command
pub fn run(args: ListArgs) -> Result<()> {
    let manifest = load_manifest(&args.manifest)?;
    let text = if args.optional {
        render_optional(&manifest)
    } else {
        render_all(&manifest)
    };
    print!("{}", text);
    Ok(())
}

fn describe(library: &LibraryConfig) -> String {
    let mut line = format!("{} ({})", library.name, library.version);
    if !library.description.is_empty() {
        line.push_str(" - ");
        line.push_str(&library.description);
    }
    if !library.dependencies.is_empty() {
        line.push_str(&format!(" (depends on: {})", library.dependencies.join(", ")));
    }
    line
}

/// Every library, optional ones marked
pub fn render_all(manifest: &Manifest) -> String {
    let mut out = String::new();
    for library in manifest.libraries.values() {
        let mut line = describe(library);
        if library.optional {
            match &library.optional_group {
                Some(group) => line.push_str(&format!(" [optional: {}]", group)),
                None => line.push_str(" [optional]"),
            }
        }
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Optional libraries by group, then the ungrouped ones
pub fn render_optional(manifest: &Manifest) -> String {
    let optional = manifest.optional_libraries();
    if optional.is_empty() {
        return "No optional libraries\n".to_string();
    }

    let mut out = String::new();
    for (group, members) in manifest.optional_groups() {
        out.push_str(&format!("Group: {}\n", group));
        for name in members {
            if let Some(library) = manifest.libraries.get(&name) {
                out.push_str(&format!("  {}\n", describe(library)));
            }
        }
        out.push('\n');
    }

    let ungrouped: Vec<&LibraryConfig> = optional
        .values()
        .filter(|lib| lib.optional_group.is_none())
        .copied()
        .collect();
    if !ungrouped.is_empty() {
        out.push_str("Ungrouped:\n");
        for library in ungrouped {
            out.push_str(&format!("  {}\n", describe(library)));
        }
    }
    out
}
