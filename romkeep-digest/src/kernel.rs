// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The streaming multi-algorithm hasher at the heart of a scan.

Instances are single-threaded and cheap to construct; parallelism is
obtained by giving each worker thread its own [`DigestKernel`], matching
spec.md's "instances are single-threaded" thread-safety note.
*/

use {
    crate::{error::Result, header::HeaderDescriptor},
    md5::Digest as _,
    sha1::Digest as _,
    sha2::Digest as _,
    std::io::Read,
};

/// Default read buffer size: 1 MiB, per spec.md §4.1.
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Which algorithms a caller wants computed for a given read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Want {
    pub crc32: bool,
    pub md5: bool,
    pub sha1: bool,
    pub sha256: bool,
}

impl Want {
    pub const fn all() -> Self {
        Self {
            crc32: true,
            md5: true,
            sha1: true,
            sha256: true,
        }
    }

    pub fn any(&self) -> bool {
        self.crc32 || self.md5 || self.sha1 || self.sha256
    }
}

/// A computed digest. Any subset of fields may be populated, per the data
/// model's "any subset of algorithms" note. SHA-256 is always requested by
/// the Cache, per spec.md §3.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Digest {
    pub crc32: Option<u32>,
    pub md5: Option<[u8; 16]>,
    pub sha1: Option<[u8; 20]>,
    pub sha256: Option<[u8; 32]>,
}

impl Digest {
    pub fn crc32_hex(&self) -> Option<String> {
        self.crc32.map(|v| format!("{:08x}", v))
    }

    pub fn md5_hex(&self) -> Option<String> {
        self.md5.map(hex::encode)
    }

    pub fn sha1_hex(&self) -> Option<String> {
        self.sha1.map(hex::encode)
    }

    pub fn sha256_hex(&self) -> Option<String> {
        self.sha256.map(hex::encode)
    }

    /// Whether `other`'s populated fields are a subset of and agree with
    /// this digest's fields. Used to verify a catalog entry's recorded
    /// digest subset against a scanned record's digest (spec.md §8).
    pub fn agrees_with(&self, other: &Digest) -> bool {
        if let Some(v) = other.crc32 {
            if self.crc32 != Some(v) {
                return false;
            }
        }
        if let Some(v) = other.md5 {
            if self.md5 != Some(v) {
                return false;
            }
        }
        if let Some(v) = other.sha1 {
            if self.sha1 != Some(v) {
                return false;
            }
        }
        if let Some(v) = other.sha256 {
            if self.sha256 != Some(v) {
                return false;
            }
        }
        true
    }
}

/// A single-threaded streaming hasher instance.
pub struct DigestKernel {
    buffer_size: usize,
}

impl Default for DigestKernel {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl DigestKernel {
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self { buffer_size }
    }

    /// Digest a stream exactly once, updating each requested algorithm in
    /// lock-step. When `header` is present, the first `header.length` bytes
    /// are discarded before hashing (but still read from the stream).
    ///
    /// Short reads are not an error: the stream may simply end. IO failures
    /// surface as [`crate::error::DigestError::DigestFailed`].
    pub fn digest(
        &self,
        mut stream: impl Read,
        want: Want,
        header: Option<HeaderDescriptor>,
    ) -> Result<Digest> {
        let mut crc = want.crc32.then(crc32fast::Hasher::new);
        let mut md5 = want.md5.then(md5::Md5::new);
        let mut sha1 = want.sha1.then(sha1::Sha1::new);
        let mut sha256 = want.sha256.then(sha2::Sha256::new);

        let mut buffer = vec![0u8; self.buffer_size];
        let mut to_skip = header.map(|h| h.length).unwrap_or(0);

        loop {
            let count = stream.read(&mut buffer)?;
            if count == 0 {
                break;
            }

            let mut chunk = &buffer[..count];

            if to_skip > 0 {
                let skip_here = to_skip.min(chunk.len() as u64) as usize;
                chunk = &chunk[skip_here..];
                to_skip -= skip_here as u64;
            }

            if chunk.is_empty() {
                continue;
            }

            if let Some(h) = crc.as_mut() {
                h.update(chunk);
            }
            if let Some(h) = md5.as_mut() {
                h.update(chunk);
            }
            if let Some(h) = sha1.as_mut() {
                h.update(chunk);
            }
            if let Some(h) = sha256.as_mut() {
                h.update(chunk);
            }
        }

        Ok(Digest {
            crc32: crc.map(|h| h.finalize()),
            md5: md5.map(|h| h.finalize().into()),
            sha1: sha1.map(|h| h.finalize().into()),
            sha256: sha256.map(|h| h.finalize().into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn digests_known_vector() {
        let kernel = DigestKernel::default();
        let digest = kernel
            .digest(Cursor::new(b"hello world"), Want::all(), None)
            .unwrap();

        assert_eq!(digest.crc32_hex().unwrap(), "0d4a1185");
        assert_eq!(digest.sha256_hex().unwrap().len(), 64);
        assert!(digest.md5.is_some());
        assert!(digest.sha1.is_some());
    }

    #[test]
    fn repeated_digest_is_stable() {
        let kernel = DigestKernel::default();
        let a = kernel.digest(Cursor::new(b"romkeep"), Want::all(), None).unwrap();
        let b = kernel.digest(Cursor::new(b"romkeep"), Want::all(), None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn header_skip_changes_digest() {
        let kernel = DigestKernel::default();
        let mut data = vec![0xAAu8; 16];
        data.extend_from_slice(b"payload");

        let with_header = kernel
            .digest(
                Cursor::new(&data),
                Want::all(),
                Some(HeaderDescriptor { offset: 0, length: 16 }),
            )
            .unwrap();
        let without = kernel
            .digest(Cursor::new(b"payload"), Want::all(), None)
            .unwrap();

        assert_eq!(with_header, without);
    }

    #[test]
    fn header_longer_than_small_buffer_still_skips_correctly() {
        // Exercise the skip-spanning-multiple-reads path with a tiny buffer.
        let kernel = DigestKernel::with_buffer_size(4);
        let mut data = vec![0xAAu8; 16];
        data.extend_from_slice(b"payload");

        let with_header = kernel
            .digest(
                Cursor::new(&data),
                Want::all(),
                Some(HeaderDescriptor { offset: 0, length: 16 }),
            )
            .unwrap();
        let without = kernel
            .digest(Cursor::new(b"payload"), Want::all(), None)
            .unwrap();

        assert_eq!(with_header, without);
    }

    #[test]
    fn empty_want_returns_no_digests() {
        let kernel = DigestKernel::default();
        let digest = kernel
            .digest(Cursor::new(b"data"), Want::default(), None)
            .unwrap();
        assert_eq!(digest, Digest::default());
    }

    #[test]
    fn digest_agrees_with_subset() {
        let kernel = DigestKernel::default();
        let full = kernel.digest(Cursor::new(b"data"), Want::all(), None).unwrap();
        let partial = Digest {
            crc32: full.crc32,
            ..Default::default()
        };
        assert!(full.agrees_with(&partial));

        let wrong = Digest {
            crc32: Some(0),
            ..Default::default()
        };
        assert!(!full.agrees_with(&wrong));
    }
}
