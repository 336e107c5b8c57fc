use std::fmt;
use std::path::{Path, PathBuf};

use catalog_items::CatalogError;
use catalog_items::descriptor::DESCRIPTOR_EXTENSION;
use reqwest::Url;

/// File extension of an archive bundling a descriptor with its disks.
pub const ARCHIVE_EXTENSION: &str = "ova";

/// Where the source bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(PathBuf),
    Remote(Url),
}

/// Whether the source is a bare descriptor or an archive around one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Packaging {
    Single,
    Archive,
}

/// A classified item source. Decided once, then passed around as data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub location: Location,
    pub packaging: Packaging,
}

impl SourceSpec {
    /// Classify a user-supplied path or URL.
    ///
    /// `http://` and `https://` sources are remote; anything else is a local
    /// path. A `.ova` extension (any case) marks an archive.
    pub fn classify(source: &str) -> Result<Self, CatalogError> {
        let lower = source.to_ascii_lowercase();
        let location = if lower.starts_with("http://") || lower.starts_with("https://") {
            let url = Url::parse(source).map_err(|e| {
                CatalogError::NotFound(format!("invalid source URL {source}: {e}"))
            })?;
            Location::Remote(url)
        } else {
            Location::Local(PathBuf::from(source))
        };

        let spec = Self {
            packaging: Packaging::Single,
            location,
        };
        let packaging = match extension(&spec.file_name()) {
            Some(ext) if ext.eq_ignore_ascii_case(ARCHIVE_EXTENSION) => Packaging::Archive,
            _ => Packaging::Single,
        };
        if spec.file_name().is_empty() {
            return Err(CatalogError::NotFound(format!(
                "source {source} does not name a file"
            )));
        }

        Ok(Self { packaging, ..spec })
    }

    pub fn local(path: impl Into<PathBuf>, packaging: Packaging) -> Self {
        Self {
            location: Location::Local(path.into()),
            packaging,
        }
    }

    pub fn remote(url: Url, packaging: Packaging) -> Self {
        Self {
            location: Location::Remote(url),
            packaging,
        }
    }

    /// Last path component of the source.
    pub fn file_name(&self) -> String {
        match &self.location {
            Location::Local(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            Location::Remote(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .unwrap_or_default()
                .to_owned(),
        }
    }

    /// Name the descriptor is stored under in the item.
    ///
    /// A bare descriptor keeps its own name; an archive's descriptor takes the
    /// archive's base name with the descriptor extension.
    pub fn descriptor_name(&self) -> String {
        let file_name = self.file_name();
        match self.packaging {
            Packaging::Single => file_name,
            Packaging::Archive => {
                let stem = match extension(&file_name) {
                    Some(ext) => &file_name[..file_name.len() - ext.len() - 1],
                    None => file_name.as_str(),
                };
                format!("{stem}.{DESCRIPTOR_EXTENSION}")
            }
        }
    }

    /// Directory disk references of a local descriptor are resolved against.
    pub fn local_dir(&self) -> Option<&Path> {
        match &self.location {
            Location::Local(path) => Some(path.parent().unwrap_or_else(|| Path::new(""))),
            Location::Remote(_) => None,
        }
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Location::Local(path) => write!(f, "{}", path.display()),
            Location::Remote(url) => write!(f, "{url}"),
        }
    }
}

fn extension(file_name: &str) -> Option<&str> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    (!stem.is_empty()).then_some(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_descriptor() {
        let spec = SourceSpec::classify("/images/photon/photon.ovf").unwrap();
        assert_eq!(spec.packaging, Packaging::Single);
        assert!(matches!(spec.location, Location::Local(_)));
        assert_eq!(spec.descriptor_name(), "photon.ovf");
        assert_eq!(spec.local_dir(), Some(Path::new("/images/photon")));
    }

    #[test]
    fn local_archive() {
        let spec = SourceSpec::classify("builds/photon-5.0.ova").unwrap();
        assert_eq!(spec.packaging, Packaging::Archive);
        assert_eq!(spec.descriptor_name(), "photon-5.0.ovf");
    }

    #[test]
    fn remote_archive_with_upper_case_extension() {
        let spec = SourceSpec::classify("https://images.example/releases/Photon.OVA").unwrap();
        assert!(matches!(spec.location, Location::Remote(_)));
        assert_eq!(spec.packaging, Packaging::Archive);
        assert_eq!(spec.file_name(), "Photon.OVA");
        assert_eq!(spec.descriptor_name(), "Photon.ovf");
    }

    #[test]
    fn remote_descriptor() {
        let spec = SourceSpec::classify("http://images.example/photon.ovf").unwrap();
        assert!(matches!(spec.location, Location::Remote(_)));
        assert_eq!(spec.packaging, Packaging::Single);
        assert_eq!(spec.local_dir(), None);
    }

    #[test]
    fn http_prefix_alone_is_not_remote() {
        let spec = SourceSpec::classify("httpd-images/web.ovf").unwrap();
        assert!(matches!(spec.location, Location::Local(_)));
    }

    #[test]
    fn url_without_file_is_rejected() {
        assert!(SourceSpec::classify("https://images.example/").is_err());
    }

    #[test]
    fn hidden_file_has_no_extension() {
        let spec = SourceSpec::classify("/tmp/.ova").unwrap();
        assert_eq!(spec.packaging, Packaging::Single);
    }
}
