// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The Digest Kernel: a streaming, multi-algorithm hasher with optional
header-aware skipping.

See spec.md §4.1 for the operation contract. [`DigestKernel::digest`] reads
a stream exactly once, updating CRC32/MD5/SHA-1/SHA-256 in lock-step
according to a [`Want`] mask, optionally discarding a leading header region
described by a [`header::HeaderDescriptor`] probed from the data-driven
[`header::HeaderTable`].
*/

pub mod error;
pub mod header;
pub mod kernel;

pub use crate::error::{DigestError, Result};
pub use crate::header::{HeaderDescriptor, HeaderRow, HeaderTable};
pub use crate::kernel::{Digest, DigestKernel, Want, DEFAULT_BUFFER_SIZE};
