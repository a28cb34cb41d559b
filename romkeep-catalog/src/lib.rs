// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Catalog ("DAT") parsing, name normalization, and the digest/name lookup
index used to match scanned files against a known-good release catalog.

A catalog document ([`schema::DatFile`]) lists a set of releases ("games"),
each with one or more ROM members identified by size and by CRC32/MD5/SHA-1
digest. [`index::CatalogIndex`] merges one or more parsed documents into a
single arena with digest and (name, size) lookup maps. [`preference`]
implements the ranking used to pick one preferred release out of a group of
otherwise-equivalent candidates.
*/

pub mod error;
pub mod index;
pub mod normalize;
pub mod preference;
pub mod schema;

pub use crate::{
    error::{CatalogError, Result},
    index::{CatalogEntry, CatalogIndex, RomRef},
    normalize::{normalize_name, NameTokens},
    preference::{PreferenceVector, RevisionOrder},
    schema::{CatalogFormat, DatFile, DatHeader, Game, Rom},
};
