// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The Plan Builder: turns selected (Catalog Entry, Candidate) pairs into a
list of write [`Action`]s, per spec.md §3's Action variants and §4.9's rules.

Destination collisions demote the later action to a no-op `Conflict`
diagnostic; `zip` targets sharing a destination are folded into one
`ZipInto`; `clean` mode turns unclaimed output-root paths into
`CleanDelete` actions. Catalog entries are processed in the canonical
(catalog-name, entry-name) order spec.md §9 requires for a byte-stable plan.
*/

use {
    crate::record::RawRecord,
    romkeep_catalog::RomRef,
    serde::Serialize,
    std::path::PathBuf,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    Hard,
    Symbolic,
    ReflinkIfSupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchKind {
    Ips,
    Bps,
    Ups,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Json,
    /// Only accepted for `dir2dat`/`fixdat` output (SPEC_FULL.md §10.10);
    /// the plan and report artifacts are JSON-only.
    Xml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    Dir2dat,
    Fixdat,
}

/// One member folded into a [`Action::ZipInto`].
#[derive(Debug, Clone, Serialize)]
pub struct ZipMember {
    pub source: String,
    pub inner_entry: Option<String>,
    pub name: String,
    pub catalog_entry: Option<String>,
}

/// A leaf of the plan, matching spec.md §3's Action variants. Serializes
/// directly to the `kind`-tagged JSON object shape the execution-plan
/// artifact requires (§6).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum Action {
    Copy {
        source: String,
        destination: String,
        digest: Option<String>,
        catalog_entry: Option<String>,
    },
    Move {
        source: String,
        destination: String,
        digest: Option<String>,
        catalog_entry: Option<String>,
    },
    Link {
        source: String,
        destination: String,
        mode: LinkMode,
        digest: Option<String>,
        catalog_entry: Option<String>,
    },
    Extract {
        source_archive: String,
        inner_entry: String,
        destination: String,
        digest: Option<String>,
        catalog_entry: Option<String>,
    },
    ZipInto {
        destination: String,
        members: Vec<ZipMember>,
    },
    Patch {
        source: String,
        patch_path: String,
        destination: String,
        patch_kind: PatchKind,
        catalog_entry: Option<String>,
    },
    TestOnly {
        destination: String,
    },
    EmitReport {
        path: String,
        format: ReportFormat,
    },
    EmitCatalog {
        path: String,
        kind: CatalogKind,
        format: ReportFormat,
    },
    EmitPlaylist {
        path: String,
        entries: Vec<String>,
    },
    CleanDelete {
        path: String,
    },
}

impl Action {
    /// The destination path this action claims, if any (`ZipInto`,
    /// `EmitReport`, etc. all claim a path too; only `TestOnly` and
    /// diagnostics-only actions are exempt from collision tracking, per
    /// spec.md's "every non-Test action" invariant).
    fn claimed_destination(&self) -> Option<&str> {
        match self {
            Action::Copy { destination, .. }
            | Action::Move { destination, .. }
            | Action::Link { destination, .. }
            | Action::Extract { destination, .. }
            | Action::Patch { destination, .. } => Some(destination),
            Action::ZipInto { destination, .. } => Some(destination),
            _ => None,
        }
    }
}

/// A destination-collision diagnostic: the second (and any further) action
/// targeting an already-claimed path is demoted to a no-op.
#[derive(Debug, Clone, Serialize)]
pub struct Conflict {
    pub destination: String,
    pub kept_source: String,
    pub demoted_source: String,
}

/// Which commands were requested for this run (spec.md §6's command set).
#[derive(Debug, Clone, Default)]
pub struct CommandSet {
    pub copy: bool,
    pub move_files: bool,
    pub link: Option<LinkMode>,
    pub extract: bool,
    pub zip: bool,
    pub playlist: bool,
    pub test: bool,
    pub clean: bool,
    pub report: Option<ReportFormat>,
}

/// One selected candidate ready for plan generation: a catalog entry
/// identity, the record that will realize it, and its rendered destination.
#[derive(Debug, Clone)]
pub struct PlanItem {
    pub catalog_name: String,
    pub entry_name: String,
    pub romref: RomRef,
    pub record: RawRecord,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub actions: Vec<Action>,
    pub conflicts: Vec<Conflict>,
}

fn catalog_entry_label(item: &PlanItem) -> Option<String> {
    Some(format!("{}/{}", item.catalog_name, item.entry_name))
}

fn canonical_order(items: &mut [PlanItem]) {
    items.sort_by(|a, b| {
        (&a.catalog_name, &a.entry_name, a.record.display_path(), &a.record.inner_entry).cmp(&(
            &b.catalog_name,
            &b.entry_name,
            b.record.display_path(),
            &b.record.inner_entry,
        ))
    });
}

/// Build the write-action plan for `items` under `commands`.
///
/// `existing_output_paths` lists every path presently under the output root
/// (supplied by the caller, which owns filesystem IO); when `clean` is
/// requested, any of those not claimed by a write action in this plan
/// becomes a `CleanDelete`, except those in `protected_paths`.
pub fn build(
    items: &[PlanItem],
    commands: &CommandSet,
    existing_output_paths: &[PathBuf],
    protected_paths: &[PathBuf],
) -> Plan {
    let mut items = items.to_vec();
    canonical_order(&mut items);

    let mut plan = Plan::default();
    let mut claimed: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut zip_groups: std::collections::BTreeMap<String, Vec<ZipMember>> = std::collections::BTreeMap::new();

    let mut push_claiming = |plan: &mut Plan, claimed: &mut std::collections::HashSet<String>, action: Action, source: String| {
        if let Some(destination) = action.claimed_destination() {
            if !claimed.insert(destination.to_string()) {
                plan.conflicts.push(Conflict {
                    destination: destination.to_string(),
                    kept_source: "(earlier action)".to_string(),
                    demoted_source: source,
                });
                return;
            }
        }
        plan.actions.push(action);
    };

    for item in &items {
        let destination = item.destination.display().to_string();
        let digest = item.record.digest.sha256_hex().or_else(|| item.record.digest.sha1_hex());
        let source = item.record.display_path();
        let catalog_entry = catalog_entry_label(item);

        if commands.copy {
            push_claiming(
                &mut plan,
                &mut claimed,
                Action::Copy {
                    source: source.clone(),
                    destination: destination.clone(),
                    digest: digest.clone(),
                    catalog_entry: catalog_entry.clone(),
                },
                source.clone(),
            );
        }

        if commands.move_files {
            push_claiming(
                &mut plan,
                &mut claimed,
                Action::Move {
                    source: source.clone(),
                    destination: destination.clone(),
                    digest: digest.clone(),
                    catalog_entry: catalog_entry.clone(),
                },
                source.clone(),
            );
        }

        if let Some(mode) = commands.link {
            push_claiming(
                &mut plan,
                &mut claimed,
                Action::Link {
                    source: source.clone(),
                    destination: destination.clone(),
                    mode,
                    digest: digest.clone(),
                    catalog_entry: catalog_entry.clone(),
                },
                source.clone(),
            );
        }

        if commands.extract {
            if let (Some(archive), Some(entry)) = (&item.record.enclosing_archive, &item.record.inner_entry) {
                push_claiming(
                    &mut plan,
                    &mut claimed,
                    Action::Extract {
                        source_archive: archive.display().to_string(),
                        inner_entry: entry.clone(),
                        destination: destination.clone(),
                        digest: digest.clone(),
                        catalog_entry: catalog_entry.clone(),
                    },
                    source.clone(),
                );
            }
        }

        if commands.zip && destination.ends_with(".zip") {
            zip_groups.entry(destination.clone()).or_default().push(ZipMember {
                source: source.clone(),
                inner_entry: item.record.inner_entry.clone(),
                name: item.record.match_name(),
                catalog_entry: catalog_entry.clone(),
            });
        }

        if commands.test {
            plan.actions.push(Action::TestOnly {
                destination: destination.clone(),
            });
        }
    }

    for (destination, members) in zip_groups {
        push_claiming(
            &mut plan,
            &mut claimed,
            Action::ZipInto { destination: destination.clone(), members },
            destination,
        );
    }

    if commands.playlist {
        let entries: Vec<String> = items.iter().map(|i| i.destination.display().to_string()).collect();
        if !entries.is_empty() {
            plan.actions.push(Action::EmitPlaylist {
                path: "playlist.m3u".to_string(),
                entries,
            });
        }
    }

    if let Some(format) = commands.report {
        plan.actions.push(Action::EmitReport {
            path: "report.json".to_string(),
            format,
        });
    }

    if commands.clean {
        for path in existing_output_paths {
            let as_string = path.display().to_string();
            if claimed.contains(&as_string) {
                continue;
            }
            if protected_paths.iter().any(|p| p == path) {
                continue;
            }
            plan.actions.push(Action::CleanDelete { path: as_string });
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use romkeep_digest::Digest;

    fn item(catalog: &str, entry: &str, dest: &str) -> PlanItem {
        PlanItem {
            catalog_name: catalog.to_string(),
            entry_name: entry.to_string(),
            romref: (0, 0),
            record: RawRecord {
                source_path: PathBuf::from(format!("/in/{entry}")),
                enclosing_archive: None,
                inner_entry: None,
                size: 10,
                digest: Digest::default(),
                header: None,
                modified_unix: 0,
            },
            destination: PathBuf::from(dest),
        }
    }

    #[test]
    fn copy_command_emits_one_action_per_item() {
        let items = vec![item("Sample", "A", "/out/A.bin")];
        let commands = CommandSet {
            copy: true,
            ..CommandSet::default()
        };
        let plan = build(&items, &commands, &[], &[]);
        assert_eq!(plan.actions.len(), 1);
        assert!(matches!(plan.actions[0], Action::Copy { .. }));
    }

    #[test]
    fn colliding_destination_is_demoted_to_conflict() {
        let items = vec![item("Sample", "A", "/out/same.bin"), item("Sample", "B", "/out/same.bin")];
        let commands = CommandSet {
            copy: true,
            ..CommandSet::default()
        };
        let plan = build(&items, &commands, &[], &[]);
        assert_eq!(plan.actions.len(), 1);
        assert_eq!(plan.conflicts.len(), 1);
    }

    #[test]
    fn zip_destinations_are_grouped_into_one_action() {
        let items = vec![item("Sample", "A", "/out/collection.zip"), item("Sample", "B", "/out/collection.zip")];
        let commands = CommandSet {
            zip: true,
            ..CommandSet::default()
        };
        let plan = build(&items, &commands, &[], &[]);
        assert_eq!(plan.actions.len(), 1);
        match &plan.actions[0] {
            Action::ZipInto { members, .. } => assert_eq!(members.len(), 2),
            other => panic!("expected ZipInto, got {other:?}"),
        }
    }

    #[test]
    fn clean_mode_deletes_unclaimed_paths_except_protected() {
        let items = vec![item("Sample", "A", "/out/A.bin")];
        let commands = CommandSet {
            copy: true,
            clean: true,
            ..CommandSet::default()
        };
        let existing = vec![PathBuf::from("/out/A.bin"), PathBuf::from("/out/stale.bin"), PathBuf::from("/out/keep.txt")];
        let protected = vec![PathBuf::from("/out/keep.txt")];
        let plan = build(&items, &commands, &existing, &protected);

        let deletes: Vec<_> = plan
            .actions
            .iter()
            .filter_map(|a| match a {
                Action::CleanDelete { path } => Some(path.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(deletes, vec!["/out/stale.bin".to_string()]);
    }

    #[test]
    fn canonical_order_is_deterministic_regardless_of_input_order() {
        let forward = vec![item("Sample", "B", "/out/B.bin"), item("Sample", "A", "/out/A.bin")];
        let reversed = vec![item("Sample", "A", "/out/A.bin"), item("Sample", "B", "/out/B.bin")];
        let commands = CommandSet {
            copy: true,
            ..CommandSet::default()
        };

        let plan_a = build(&forward, &commands, &[], &[]);
        let plan_b = build(&reversed, &commands, &[], &[]);

        let destinations_a: Vec<_> = plan_a
            .actions
            .iter()
            .map(|a| match a {
                Action::Copy { destination, .. } => destination.clone(),
                _ => unreachable!(),
            })
            .collect();
        let destinations_b: Vec<_> = plan_b
            .actions
            .iter()
            .map(|a| match a {
                Action::Copy { destination, .. } => destination.clone(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(destinations_a, destinations_b);
    }
}
