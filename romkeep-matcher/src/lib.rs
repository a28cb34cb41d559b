// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Scan/hash pipeline, catalog matching, candidate selection, token
resolution, and plan generation: the matching-and-planning engine described
by spec.md §§4.3, 4.6–4.9.

Each concern lives in its own module and the pieces compose by value (no
shared mutable state beyond the optional cache mutex the Scanner takes), so
callers can run just the Scanner for a dry-run digest report, or the full
scan → match → select → resolve → plan pipeline for a real run.
*/

pub mod error;
pub mod matcher;
pub mod plan;
pub mod record;
pub mod scanner;
pub mod selector;
pub mod token;

pub use crate::{
    error::{MatcherError, Result},
    matcher::{match_all, MatchBasis, MatchOutcome, MatchedRecord},
    plan::{build as build_plan, Action, CatalogKind, CommandSet, Conflict, LinkMode, Plan, PlanItem, PatchKind, ReportFormat, ZipMember},
    record::RawRecord,
    scanner::{ScanOutcome, Scanner, ScannerConfig},
    selector::{select, FilterSet, SelectedCandidate},
    token::{resolve as resolve_token_template, ResolvedPaths, TokenContext},
};
