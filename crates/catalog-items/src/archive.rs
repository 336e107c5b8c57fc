//! Forward-only lookup of a single named entry inside a tar stream.
//!
//! Archives bundling disk images can be many gigabytes, so nothing here
//! buffers more than one header block (plus the small metadata payloads of
//! long-name and PAX records). The reader is taken by value: once an entry
//! has been located the stream is positioned inside it and cannot be used
//! for a second lookup. Callers that need several entries reopen the source
//! for each one.

use tokio::io::{AsyncRead, AsyncReadExt, Take};

use crate::error::CatalogError;

const BLOCK_SIZE: u64 = 512;

/// Upper bound for long-name and PAX payloads we are willing to hold in memory.
const MAX_METADATA_SIZE: u64 = 1024 * 1024;

/// An entry found by [`locate`], with its payload ready to be read.
#[derive(Debug)]
pub struct ArchiveEntry<R> {
    name: String,
    size: u64,
    payload: Take<R>,
}

impl<R> ArchiveEntry<R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Payload size from the entry header.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The payload: yields exactly [`size`](Self::size) bytes, then EOF.
    pub fn into_payload(self) -> Take<R> {
        self.payload
    }
}

/// Scan `reader` for the regular file named `entry_name` (case-sensitive).
pub async fn locate<R>(reader: R, entry_name: &str) -> Result<ArchiveEntry<R>, CatalogError>
where
    R: AsyncRead + Unpin,
{
    tracing::debug!(entry = entry_name, "scanning archive");
    locate_by(reader, |name| name == entry_name)
        .await?
        .ok_or_else(|| CatalogError::DiskNotFoundInArchive {
            name: entry_name.to_owned(),
        })
}

/// Scan `reader` for the first regular file whose name satisfies `matches`.
///
/// Returns `Ok(None)` when the archive ends without a match.
pub async fn locate_by<R, F>(
    mut reader: R,
    mut matches: F,
) -> Result<Option<ArchiveEntry<R>>, CatalogError>
where
    R: AsyncRead + Unpin,
    F: FnMut(&str) -> bool,
{
    let mut block = [0u8; BLOCK_SIZE as usize];
    let mut pending_name: Option<String> = None;

    loop {
        if !read_block(&mut reader, &mut block).await? {
            return Ok(None);
        }
        // A zero block marks the end-of-archive trailer.
        if block.iter().all(|b| *b == 0) {
            return Ok(None);
        }
        verify_checksum(&block)?;

        let header = tar::Header::from_byte_slice(&block);
        let size = header
            .entry_size()
            .map_err(|e| CatalogError::InvalidArchive(format!("bad entry size: {e}")))?;
        let entry_type = header.entry_type();

        if entry_type.is_gnu_longname() {
            let data = read_metadata(&mut reader, size).await?;
            pending_name = Some(trim_nul(&data));
            continue;
        }
        if entry_type.is_pax_local_extensions() {
            let data = read_metadata(&mut reader, size).await?;
            if let Some(path) = pax_path(&data)? {
                pending_name = Some(path);
            }
            continue;
        }

        let name = match pending_name.take() {
            Some(name) => name,
            None => String::from_utf8_lossy(&header.path_bytes()).into_owned(),
        };

        let is_file = matches!(
            entry_type,
            tar::EntryType::Regular | tar::EntryType::Continuous
        );
        if is_file && matches(&name) {
            tracing::debug!(entry = %name, size, "archive entry found");
            return Ok(Some(ArchiveEntry {
                name,
                size,
                payload: reader.take(size),
            }));
        }

        skip(&mut reader, padded(size)).await?;
    }
}

fn padded(size: u64) -> u64 {
    size.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

/// Fill `block`. Returns `false` on a clean end of stream before any byte.
async fn read_block<R>(reader: &mut R, block: &mut [u8]) -> Result<bool, CatalogError>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < block.len() {
        let n = reader
            .read(&mut block[filled..])
            .await
            .map_err(|e| CatalogError::Transfer(format!("failed to read archive: {e}")))?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(CatalogError::InvalidArchive(format!(
                "truncated header ({filled} of {BLOCK_SIZE} bytes)"
            )));
        }
        filled += n;
    }
    Ok(true)
}

async fn skip<R>(reader: &mut R, len: u64) -> Result<(), CatalogError>
where
    R: AsyncRead + Unpin,
{
    let copied = tokio::io::copy(&mut reader.take(len), &mut tokio::io::sink())
        .await
        .map_err(|e| CatalogError::Transfer(format!("failed to read archive: {e}")))?;
    if copied < len {
        return Err(CatalogError::InvalidArchive(format!(
            "truncated entry ({copied} of {len} bytes)"
        )));
    }
    Ok(())
}

async fn read_metadata<R>(reader: &mut R, size: u64) -> Result<Vec<u8>, CatalogError>
where
    R: AsyncRead + Unpin,
{
    if size > MAX_METADATA_SIZE {
        return Err(CatalogError::InvalidArchive(format!(
            "metadata record of {size} bytes is too large"
        )));
    }
    let mut data = vec![0u8; padded(size) as usize];
    reader.read_exact(&mut data).await.map_err(|e| {
        CatalogError::InvalidArchive(format!("truncated metadata record: {e}"))
    })?;
    data.truncate(size as usize);
    Ok(data)
}

fn verify_checksum(block: &[u8]) -> Result<(), CatalogError> {
    let header = tar::Header::from_byte_slice(block);
    let stored = header
        .cksum()
        .map_err(|e| CatalogError::InvalidArchive(format!("bad header checksum field: {e}")))?;

    let (unsigned, signed) = block
        .iter()
        .enumerate()
        .map(|(i, b)| if (148..156).contains(&i) { b' ' } else { *b })
        .fold((0u32, 0i64), |(u, s), b| {
            (u + u32::from(b), s + i64::from(b as i8))
        });

    if stored == unsigned || i64::from(stored) == signed {
        Ok(())
    } else {
        Err(CatalogError::InvalidArchive(format!(
            "header checksum mismatch (stored {stored}, computed {unsigned})"
        )))
    }
}

fn trim_nul(data: &[u8]) -> String {
    let end = data.iter().position(|b| *b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).into_owned()
}

/// The `path` record of a PAX extended header, if it carries one.
fn pax_path(data: &[u8]) -> Result<Option<String>, CatalogError> {
    let mut path = None;
    for extension in tar::PaxExtensions::new(data) {
        let extension = extension
            .map_err(|e| CatalogError::InvalidArchive(format!("malformed PAX record: {e}")))?;
        if extension.key() == Ok("path") {
            path = Some(String::from_utf8_lossy(extension.value_bytes()).into_owned());
        }
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn payload(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
    }

    fn build_archive(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_entry_type(tar::EntryType::Regular);
            builder.append_data(&mut header, path, data.as_slice()).unwrap();
        }
        builder.into_inner().unwrap()
    }

    async fn read_all<R: AsyncRead + Unpin>(entry: ArchiveEntry<R>) -> Vec<u8> {
        let mut out = Vec::new();
        entry.into_payload().read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn locates_second_entry_with_exact_payload() {
        let a = payload(100, 1);
        let b = payload(200, 7);
        let archive = build_archive(&[("a.vmdk", a.clone()), ("b.vmdk", b.clone())]);

        let entry = locate(Cursor::new(archive), "b.vmdk").await.unwrap();
        assert_eq!(entry.name(), "b.vmdk");
        assert_eq!(entry.size(), 200);
        assert_eq!(read_all(entry).await, b);
    }

    #[tokio::test]
    async fn payload_stops_at_entry_boundary() {
        let a = payload(100, 1);
        let b = payload(200, 7);
        let archive = build_archive(&[("a.vmdk", a.clone()), ("b.vmdk", b.clone())]);

        let entry = locate(Cursor::new(archive), "a.vmdk").await.unwrap();
        assert_eq!(read_all(entry).await, a);
    }

    #[tokio::test]
    async fn missing_entry_is_reported_by_name() {
        let archive = build_archive(&[("a.vmdk", payload(100, 1)), ("b.vmdk", payload(200, 2))]);

        let err = locate(Cursor::new(archive), "c.vmdk").await.unwrap_err();
        match err {
            CatalogError::DiskNotFoundInArchive { name } => assert_eq!(name, "c.vmdk"),
            other => panic!("expected DiskNotFoundInArchive, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn match_is_case_sensitive() {
        let archive = build_archive(&[("Disk.vmdk", b"data".to_vec())]);
        let result = locate(Cursor::new(archive), "disk.vmdk").await;
        assert!(matches!(result, Err(CatalogError::DiskNotFoundInArchive { .. })));
    }

    #[tokio::test]
    async fn empty_stream_has_no_entries() {
        let result = locate(Cursor::new(Vec::new()), "a.vmdk").await;
        assert!(matches!(result, Err(CatalogError::DiskNotFoundInArchive { .. })));
    }

    #[tokio::test]
    async fn archive_without_trailer_ends_cleanly() {
        let mut archive = build_archive(&[("a.vmdk", b"abc".to_vec())]);
        archive.truncate(1024);
        let result = locate(Cursor::new(archive), "b.vmdk").await;
        assert!(matches!(result, Err(CatalogError::DiskNotFoundInArchive { .. })));
    }

    #[tokio::test]
    async fn long_names_are_matched() {
        let long = format!("{}/disk-0.vmdk", "nested".repeat(30));
        let archive = build_archive(&[(long.as_str(), b"long-named payload".to_vec())]);

        let entry = locate(Cursor::new(archive), &long).await.unwrap();
        assert_eq!(read_all(entry).await, b"long-named payload");
    }

    #[tokio::test]
    async fn directories_never_match() {
        let mut builder = tar::Builder::new(Vec::new());
        let mut dir = tar::Header::new_ustar();
        dir.set_entry_type(tar::EntryType::Directory);
        dir.set_size(0);
        dir.set_mode(0o755);
        builder.append_data(&mut dir, "disks", std::io::empty()).unwrap();
        let archive = builder.into_inner().unwrap();

        let result = locate(Cursor::new(archive), "disks").await;
        assert!(matches!(result, Err(CatalogError::DiskNotFoundInArchive { .. })));
    }

    #[tokio::test]
    async fn corrupt_header_is_rejected() {
        let mut archive = build_archive(&[("a.vmdk", b"abc".to_vec())]);
        archive[10] ^= 0xff;
        let result = locate(Cursor::new(archive), "a.vmdk").await;
        assert!(matches!(result, Err(CatalogError::InvalidArchive(_))));
    }

    #[tokio::test]
    async fn truncated_entry_is_rejected() {
        let archive = build_archive(&[("a.vmdk", payload(2000, 3)), ("b.vmdk", b"x".to_vec())]);
        let truncated = archive[..1024].to_vec();
        let result = locate(Cursor::new(truncated), "b.vmdk").await;
        assert!(matches!(result, Err(CatalogError::InvalidArchive(_))));
    }

    #[tokio::test]
    async fn locate_by_takes_first_match() {
        let archive = build_archive(&[
            ("photon.mf", b"manifest".to_vec()),
            ("photon.ovf", b"<Envelope/>".to_vec()),
            ("other.ovf", b"<Envelope></Envelope>".to_vec()),
        ]);
        let entry = locate_by(Cursor::new(archive), |name| name.ends_with(".ovf"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.name(), "photon.ovf");
    }

    #[tokio::test]
    async fn pax_path_replaces_header_name() {
        let record = b"34 path=exports/photon-disk1.vmdk\n";
        let mut builder = tar::Builder::new(Vec::new());

        let mut pax = tar::Header::new_ustar();
        pax.set_entry_type(tar::EntryType::XHeader);
        pax.set_path("PaxHeaders/disk1").unwrap();
        pax.set_size(record.len() as u64);
        pax.set_mode(0o644);
        pax.set_cksum();
        builder.append(&pax, &record[..]).unwrap();

        let mut file = tar::Header::new_ustar();
        file.set_entry_type(tar::EntryType::Regular);
        file.set_size(4);
        file.set_mode(0o644);
        builder.append_data(&mut file, "disk1", &b"vmdk"[..]).unwrap();
        let archive = builder.into_inner().unwrap();

        let entry = locate(Cursor::new(archive), "exports/photon-disk1.vmdk")
            .await
            .unwrap();
        assert_eq!(read_all(entry).await, b"vmdk");
    }

    #[test]
    fn pax_path_record_is_extracted() {
        let data = b"30 mtime=1700000000.123456789\n24 path=dir/disk-0.vmdk\n";
        assert_eq!(pax_path(data).unwrap().as_deref(), Some("dir/disk-0.vmdk"));
    }

    #[test]
    fn malformed_pax_is_rejected() {
        assert!(pax_path(b"999 path=x\n").is_err());
    }
}
